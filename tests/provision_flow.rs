//! End-to-end bootstrap scenario against a scripted hypervisor.
//!
//! Models the real external world in memory: a libvirt network with no
//! reservation, no domain, a vault that decrypts to two passwords, and a
//! target that accepts SSH once the domain runs. Verifies the full pipeline
//! converges on the first run and is a no-op on the second.

use std::path::Path;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use tempfile::TempDir;

use pveforge::config::{CacheDir, ForgeConfig, TemplatePath};
use pveforge::errors::ForgeResult;
use pveforge::provision;
use pveforge::util::{CommandOutput, CommandRunner};

const MAC: &str = "52:54:00:ab:cd:10";
const IP: &str = "192.168.122.10";

/// In-memory stand-in for libvirt, the vault, and the target host.
#[derive(Default)]
struct World {
    reservation_inserts: u32,
    reservation_present: bool,
    domain_exists: bool,
    domain_running: bool,
    installs: u32,
    starts: u32,
    playbook_runs: u32,
}

struct ScriptedRunner {
    world: Mutex<World>,
}

impl ScriptedRunner {
    fn new() -> Self {
        Self {
            world: Mutex::new(World::default()),
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> ForgeResult<CommandOutput> {
        let mut world = self.world.lock().unwrap();
        match (program, args.first().copied()) {
            ("virsh", Some("net-dumpxml")) => {
                let hosts = if world.reservation_present {
                    format!("<host mac='{MAC}' name='pve' ip='{IP}'/>")
                } else {
                    String::new()
                };
                Ok(CommandOutput::ok(&format!(
                    "<network><name>default</name><ip><dhcp>{hosts}</dhcp></ip></network>"
                )))
            }
            ("virsh", Some("net-update")) => {
                world.reservation_inserts += 1;
                world.reservation_present = true;
                Ok(CommandOutput::ok(""))
            }
            ("virsh", Some("domstate")) => {
                if !world.domain_exists {
                    Ok(CommandOutput::failed(
                        1,
                        "error: failed to get domain 'pve'",
                    ))
                } else if world.domain_running {
                    Ok(CommandOutput::ok("running\n"))
                } else {
                    Ok(CommandOutput::ok("shut off\n"))
                }
            }
            ("virsh", Some("start")) => {
                world.starts += 1;
                world.domain_running = true;
                Ok(CommandOutput::ok("Domain 'pve' started\n"))
            }
            ("ansible-vault", Some("view")) => Ok(CommandOutput::ok(
                "root_password: hunter2\nuser_password: swordfish\n",
            )),
            ("ssh", _) => {
                if world.domain_running {
                    Ok(CommandOutput::ok(""))
                } else {
                    Ok(CommandOutput::failed(255, "Connection refused"))
                }
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    async fn run_streamed(
        &self,
        program: &str,
        _args: &[&str],
        _cwd: Option<&Path>,
    ) -> ForgeResult<Option<i32>> {
        let mut world = self.world.lock().unwrap();
        match program {
            "virt-install" => {
                world.installs += 1;
                // Installer completes, domain defined but left powered off.
                world.domain_exists = true;
                world.domain_running = false;
                Ok(Some(0))
            }
            "ansible-playbook" => {
                world.playbook_runs += 1;
                Ok(Some(0))
            }
            other => panic!("unexpected streamed command: {other}"),
        }
    }
}

/// Preflight probes PATH for the real tools; point it at stub files so the
/// test is independent of what the host has installed.
fn ensure_stub_tools() {
    static STUBS: OnceLock<TempDir> = OnceLock::new();
    STUBS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        for tool in ["virsh", "virt-install", "ansible-playbook", "ansible-vault", "ssh"] {
            std::fs::write(dir.path().join(tool), "#!/bin/sh\n").unwrap();
        }
        let old = std::env::var_os("PATH").unwrap_or_default();
        let mut paths = vec![dir.path().to_path_buf()];
        paths.extend(std::env::split_paths(&old));
        let joined = std::env::join_paths(paths).unwrap();
        unsafe { std::env::set_var("PATH", &joined) };
        dir
    });
}

const TEMPLATE: &str = "\
d-i passwd/root-password-crypted password {{ROOT_PASSWORD_HASH}}
d-i passwd/user-password-crypted password {{USER_PASSWORD_HASH}}
d-i preseed/late_command string echo \"{{SSH_PUBLIC_KEY}}\" > /target/root/.ssh/authorized_keys
";

fn test_config(dir: &Path) -> ForgeConfig {
    let mut cfg = ForgeConfig::default();
    cfg.cache_dir = CacheDir(dir.join("cache"));
    cfg.template = TemplatePath(dir.join("preseed.cfg"));
    cfg.credentials.vault_file = dir.join("vault.yml");
    cfg.credentials.vault_password_file = dir.join(".vault_pass");
    cfg.credentials.ssh_public_key = dir.join("id_ed25519.pub");
    cfg.ssh.interval_secs = 0;
    cfg
}

fn write_fixtures(dir: &Path, cfg: &ForgeConfig) {
    std::fs::write(&cfg.template.0, TEMPLATE).unwrap();
    std::fs::write(&cfg.credentials.vault_file, "$ANSIBLE_VAULT;1.1;AES256\nabcdef\n").unwrap();
    std::fs::write(&cfg.credentials.vault_password_file, "vault-pw\n").unwrap();
    std::fs::write(&cfg.credentials.ssh_public_key, "ssh-ed25519 AAAAC3Nza op@host\n").unwrap();
    // Pre-populate the image cache so the run never reaches for the network.
    std::fs::create_dir_all(&cfg.cache_dir.0).unwrap();
    std::fs::write(cfg.iso_path(), b"iso-bytes").unwrap();
}

#[tokio::test]
async fn full_run_provisions_once_and_is_idempotent_after() {
    ensure_stub_tools();
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    write_fixtures(dir.path(), &cfg);

    let runner = std::sync::Arc::new(ScriptedRunner::new());

    // First run: empty world, everything gets built.
    let metrics = provision::run_full(cfg.clone(), runner.clone()).await.unwrap();
    let names: Vec<&str> = metrics.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "preflight",
            "network_reservation",
            "image_cache",
            "install_config",
            "vm_up",
            "ssh_wait",
            "converge",
        ]
    );

    {
        let world = runner.world.lock().unwrap();
        assert_eq!(world.reservation_inserts, 1);
        assert_eq!(world.installs, 1);
        assert_eq!(world.starts, 1);
        assert!(world.domain_running);
        assert_eq!(world.playbook_runs, 1);
    }

    // Generated install configuration: placeholders fully replaced, both
    // passwords present only as SHA-512-crypt hashes.
    let preseed = std::fs::read_to_string(cfg.preseed_path()).unwrap();
    assert!(!preseed.contains("{{"));
    assert_eq!(preseed.matches("$6$").count(), 2);
    assert!(!preseed.contains("hunter2"));
    assert!(!preseed.contains("swordfish"));
    assert!(preseed.contains("ssh-ed25519 AAAAC3Nza op@host"));

    // Second run: already-running VM and existing reservation, so nothing is
    // recreated and no duplicate host record appears.
    provision::run_full(cfg.clone(), runner.clone()).await.unwrap();
    {
        let world = runner.world.lock().unwrap();
        assert_eq!(world.reservation_inserts, 1);
        assert_eq!(world.installs, 1);
        assert_eq!(world.starts, 1);
        assert_eq!(world.playbook_runs, 2);
    }

    // Cached image untouched.
    assert_eq!(std::fs::read(cfg.iso_path()).unwrap(), b"iso-bytes");
}

#[tokio::test]
async fn ansible_only_run_skips_provisioning_stages() {
    ensure_stub_tools();
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    write_fixtures(dir.path(), &cfg);

    let runner = std::sync::Arc::new(ScriptedRunner::new());
    let metrics = provision::run_ansible(
        cfg,
        runner.clone(),
        vec!["--check".to_string()],
    )
    .await
    .unwrap();

    let names: Vec<&str> = metrics.stages.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["preflight", "converge"]);

    let world = runner.world.lock().unwrap();
    assert_eq!(world.playbook_runs, 1);
    assert_eq!(world.installs, 0);
    assert_eq!(world.reservation_inserts, 0);
}
