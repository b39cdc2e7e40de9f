//! Provisioning orchestration.
//!
//! Maps each dispatcher verb to an execution plan over the shared stage
//! pipeline:
//!
//! ```text
//! up:       preflight → network_reservation → image_cache → install_config
//!              → vm_up → ssh_wait → converge
//! ansible:  preflight → converge
//! destroy:  (no pipeline) force-stop + undefine + storage removal
//! ```
//!
//! Stages communicate through [`ProvisionCtx`]; outputs of earlier stages
//! (cached image path, generated preseed path) are stored there for later
//! ones. Two concurrent runs against the same VM name are unsupported: the
//! create-if-absent decision races on hypervisor state.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ansible;
use crate::cache::{self, CacheStatus};
use crate::config::ForgeConfig;
use crate::errors::{ForgeError, ForgeResult};
use crate::installcfg::{self, PreseedInputs};
use crate::net::{self, ReservationOutcome};
use crate::pipeline::{ExecutionPlan, PipelineMetrics, StageTask, run_plan};
use crate::preflight;
use crate::secrets::{ROOT_PASSWORD_KEY, USER_PASSWORD_KEY, Vault, hash_password};
use crate::ssh;
use crate::util::CommandRunner;
use crate::vm::{self, EnsureOutcome};

/// Outputs accumulated as stages run.
#[derive(Debug, Default)]
pub struct ProvisionState {
    pub reservation: Option<ReservationOutcome>,
    pub cache: Option<CacheStatus>,
    pub iso: Option<PathBuf>,
    pub preseed: Option<PathBuf>,
    pub vm: Option<EnsureOutcome>,
}

/// Shared stage context, cheap to clone.
#[derive(Clone)]
pub struct ProvisionCtx {
    pub config: Arc<ForgeConfig>,
    pub runner: Arc<dyn CommandRunner>,
    pub extra_args: Arc<Vec<String>>,
    pub state: Arc<Mutex<ProvisionState>>,
}

impl ProvisionCtx {
    pub fn new(config: ForgeConfig, runner: Arc<dyn CommandRunner>, extra_args: Vec<String>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
            extra_args: Arc::new(extra_args),
            state: Arc::new(Mutex::new(ProvisionState::default())),
        }
    }
}

struct PreflightStage;

#[async_trait]
impl StageTask<ProvisionCtx> for PreflightStage {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> ForgeResult<()> {
        preflight::check(&ctx.config)
    }

    fn name(&self) -> &str {
        "preflight"
    }
}

struct ReservationStage;

#[async_trait]
impl StageTask<ProvisionCtx> for ReservationStage {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> ForgeResult<()> {
        let outcome =
            net::ensure_reservation(ctx.runner.as_ref(), &ctx.config.network, &ctx.config.vm.mac)
                .await?;
        ctx.state.lock().await.reservation = Some(outcome);
        Ok(())
    }

    fn name(&self) -> &str {
        "network_reservation"
    }
}

struct ImageCacheStage;

#[async_trait]
impl StageTask<ProvisionCtx> for ImageCacheStage {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> ForgeResult<()> {
        let dest = ctx.config.iso_path();
        let status = cache::ensure_image(&ctx.config.image.url, &dest).await?;
        let mut state = ctx.state.lock().await;
        state.cache = Some(status);
        state.iso = Some(dest);
        Ok(())
    }

    fn name(&self) -> &str {
        "image_cache"
    }
}

struct InstallConfigStage;

#[async_trait]
impl StageTask<ProvisionCtx> for InstallConfigStage {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> ForgeResult<()> {
        let cfg = &ctx.config;
        let vault = Vault::new(
            ctx.runner.as_ref(),
            &cfg.credentials.vault_file,
            &cfg.credentials.vault_password_file,
        );
        // Plaintext stays in memory; only the hashes reach the template.
        let root_plain = vault.read(ROOT_PASSWORD_KEY).await?;
        let user_plain = vault.read(USER_PASSWORD_KEY).await?;

        let public_key = tokio::fs::read_to_string(&cfg.credentials.ssh_public_key)
            .await?
            .trim()
            .to_string();
        let inputs = PreseedInputs {
            root_password_hash: hash_password(&root_plain)?,
            user_password_hash: hash_password(&user_plain)?,
            ssh_public_key: public_key,
        };

        let dest = cfg.preseed_path();
        installcfg::render(&cfg.template.0, &dest, &inputs).await?;
        ctx.state.lock().await.preseed = Some(dest);
        Ok(())
    }

    fn name(&self) -> &str {
        "install_config"
    }
}

struct VmUpStage;

#[async_trait]
impl StageTask<ProvisionCtx> for VmUpStage {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> ForgeResult<()> {
        let (iso, preseed) = {
            let state = ctx.state.lock().await;
            let iso = state
                .iso
                .clone()
                .ok_or_else(|| ForgeError::Internal("image cache stage must run first".into()))?;
            let preseed = state.preseed.clone().ok_or_else(|| {
                ForgeError::Internal("install config stage must run first".into())
            })?;
            (iso, preseed)
        };

        let outcome = vm::ensure_running(ctx.runner.as_ref(), &ctx.config, &iso, &preseed).await?;
        ctx.state.lock().await.vm = Some(outcome);
        Ok(())
    }

    fn name(&self) -> &str {
        "vm_up"
    }
}

struct SshWaitStage;

#[async_trait]
impl StageTask<ProvisionCtx> for SshWaitStage {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> ForgeResult<()> {
        ssh::wait_for_ssh(ctx.runner.as_ref(), &ctx.config.ssh, &ctx.config.network.ip).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "ssh_wait"
    }
}

struct ConvergeStage;

#[async_trait]
impl StageTask<ProvisionCtx> for ConvergeStage {
    async fn run(self: Box<Self>, ctx: ProvisionCtx) -> ForgeResult<()> {
        ansible::converge(ctx.runner.as_ref(), &ctx.config, &ctx.extra_args).await?;
        ansible::print_summary(&ctx.config);
        Ok(())
    }

    fn name(&self) -> &str {
        "converge"
    }
}

fn full_plan() -> ExecutionPlan<ProvisionCtx> {
    ExecutionPlan::new(vec![
        Box::new(PreflightStage),
        Box::new(ReservationStage),
        Box::new(ImageCacheStage),
        Box::new(InstallConfigStage),
        Box::new(VmUpStage),
        Box::new(SshWaitStage),
        Box::new(ConvergeStage),
    ])
}

fn ansible_plan() -> ExecutionPlan<ProvisionCtx> {
    ExecutionPlan::new(vec![Box::new(PreflightStage), Box::new(ConvergeStage)])
}

/// Full bootstrap: all seven stages in order.
pub async fn run_full(
    config: ForgeConfig,
    runner: Arc<dyn CommandRunner>,
) -> ForgeResult<PipelineMetrics> {
    let ctx = ProvisionCtx::new(config, runner, Vec::new());
    let metrics = run_plan(full_plan(), ctx).await?;
    tracing::info!(
        total_ms = metrics.total_duration_ms,
        stages = metrics.stages.len(),
        "bootstrap complete"
    );
    Ok(metrics)
}

/// Re-run configuration management only, forwarding extra engine arguments.
pub async fn run_ansible(
    config: ForgeConfig,
    runner: Arc<dyn CommandRunner>,
    extra_args: Vec<String>,
) -> ForgeResult<PipelineMetrics> {
    let ctx = ProvisionCtx::new(config, runner, extra_args);
    run_plan(ansible_plan(), ctx).await
}

/// Tear the VM down and delete its storage, then drop the generated install
/// configuration. The cached installer image is kept; it is name-stable and
/// expensive to re-download.
pub async fn run_destroy(config: ForgeConfig, runner: Arc<dyn CommandRunner>) -> ForgeResult<()> {
    vm::destroy(runner.as_ref(), &config.vm.name).await?;

    match tokio::fs::remove_file(config.preseed_path()).await {
        Ok(()) => tracing::debug!("generated install configuration removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(error = %e, "could not remove generated install configuration"),
    }
    Ok(())
}
