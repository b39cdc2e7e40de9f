//! VM lifecycle control through the libvirt CLI.
//!
//! Converges the domain's actual state to "running with the OS installed".
//! Every decision re-queries the hypervisor; nothing is cached locally.
//!
//! State machine:
//! - absent      → create (blocking unattended install) then explicit start
//! - shut off    → start only; recreation is never implicit
//! - running     → no-op with a warning (no install occurred)
//!
//! A failed creation is fatal and never retried. Recovery is the explicit
//! `destroy` verb followed by a fresh run.

use std::path::Path;

use crate::config::ForgeConfig;
use crate::errors::{ForgeError, ForgeResult};
use crate::util::CommandRunner;

/// Boot parameters that select fully automatic installation.
const UNATTENDED_BOOT_ARGS: &str =
    "auto=true priority=critical preseed/file=/preseed.cfg console=ttyS0,115200n8";

/// Observed domain state, re-read from `virsh` on every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Absent,
    Stopped,
    Running,
}

/// What [`ensure_running`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Domain created, installer ran to completion, domain started.
    Created,
    /// Domain existed but was shut off; started without reinstalling.
    Started,
    /// Domain was already running; nothing done.
    AlreadyRunning,
}

/// Query the domain's current state.
pub async fn query_state(runner: &dyn CommandRunner, name: &str) -> ForgeResult<VmState> {
    let out = runner.run("virsh", &["domstate", name]).await?;
    if !out.success() {
        // virsh reports a missing domain as an error; anything it cannot
        // find, we treat as absent.
        return Ok(VmState::Absent);
    }
    if out.stdout.trim().starts_with("running") {
        Ok(VmState::Running)
    } else {
        Ok(VmState::Stopped)
    }
}

/// Drive the domain to the running state, installing the OS if it does not
/// exist yet.
pub async fn ensure_running(
    runner: &dyn CommandRunner,
    cfg: &ForgeConfig,
    iso: &Path,
    preseed: &Path,
) -> ForgeResult<EnsureOutcome> {
    match query_state(runner, &cfg.vm.name).await? {
        VmState::Absent => {
            create(runner, cfg, iso, preseed).await?;
            start(runner, &cfg.vm.name).await?;
            Ok(EnsureOutcome::Created)
        }
        VmState::Stopped => {
            tracing::info!(vm = %cfg.vm.name, "domain exists but is shut off, starting");
            start(runner, &cfg.vm.name).await?;
            Ok(EnsureOutcome::Started)
        }
        VmState::Running => {
            tracing::warn!(
                vm = %cfg.vm.name,
                "domain already running, no install performed"
            );
            Ok(EnsureOutcome::AlreadyRunning)
        }
    }
}

/// Create the domain and run the unattended install to completion.
///
/// `--wait -1` blocks until the installer powers the domain off; `--noreboot`
/// keeps virt-install from racing the explicit start that follows.
async fn create(
    runner: &dyn CommandRunner,
    cfg: &ForgeConfig,
    iso: &Path,
    preseed: &Path,
) -> ForgeResult<()> {
    let memory = cfg.vm.memory_mib.to_string();
    let vcpus = cfg.vm.cpus.to_string();
    let disk = format!("size={}", cfg.vm.disk_gib);
    let network = format!("network={},mac={}", cfg.network.network, cfg.vm.mac);
    let location = iso.display().to_string();
    let inject = preseed.display().to_string();

    tracing::info!(vm = %cfg.vm.name, "creating domain and running unattended install (this takes a while)");
    let code = runner
        .run_streamed(
            "virt-install",
            &[
                "--name",
                &cfg.vm.name,
                "--memory",
                &memory,
                "--vcpus",
                &vcpus,
                "--disk",
                &disk,
                "--os-variant",
                &cfg.vm.os_variant,
                "--network",
                &network,
                "--location",
                &location,
                "--initrd-inject",
                &inject,
                "--extra-args",
                UNATTENDED_BOOT_ARGS,
                "--graphics",
                "none",
                "--noautoconsole",
                "--noreboot",
                "--wait",
                "-1",
            ],
            None,
        )
        .await?;

    match code {
        Some(0) => Ok(()),
        Some(code) => Err(ForgeError::VmCreation(format!(
            "virt-install exited with code {code}"
        ))),
        None => Err(ForgeError::VmCreation(
            "virt-install was killed by a signal".to_string(),
        )),
    }
}

async fn start(runner: &dyn CommandRunner, name: &str) -> ForgeResult<()> {
    let out = runner.run("virsh", &["start", name]).await?;
    if out.success() {
        tracing::info!(vm = %name, "domain started");
        Ok(())
    } else {
        Err(ForgeError::Hypervisor(format!(
            "virsh start {name}: {}",
            out.stderr.trim()
        )))
    }
}

/// Force-stop and fully remove the domain, including its backing storage.
///
/// Irreversible and best-effort throughout: a domain that is already stopped
/// or does not exist is not an error, and a failed storage removal is only
/// warned about.
pub async fn destroy(runner: &dyn CommandRunner, name: &str) -> ForgeResult<()> {
    let stop = runner.run("virsh", &["destroy", name]).await?;
    if stop.success() {
        tracing::info!(vm = %name, "domain force-stopped");
    } else {
        tracing::debug!(vm = %name, stderr = %stop.stderr.trim(), "force-stop skipped");
    }

    let undefine = runner
        .run("virsh", &["undefine", name, "--remove-all-storage"])
        .await?;
    if undefine.success() {
        tracing::info!(vm = %name, "domain undefined, storage removed");
    } else {
        tracing::warn!(
            vm = %name,
            stderr = %undefine.stderr.trim(),
            "undefine failed or domain absent, continuing"
        );
    }
    Ok(())
}
