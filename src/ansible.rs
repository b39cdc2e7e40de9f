//! Configuration convergence.
//!
//! Hands the reachable host to the configuration-management engine. The
//! engine's own output streams to the operator and its exit code is the sole
//! success signal; individual task results are never interpreted here.

use crate::config::ForgeConfig;
use crate::errors::{ForgeError, ForgeResult};
use crate::util::CommandRunner;

/// Run the playbook against the inventory, forwarding `extra_args` verbatim.
pub async fn converge(
    runner: &dyn CommandRunner,
    cfg: &ForgeConfig,
    extra_args: &[String],
) -> ForgeResult<()> {
    let mut args: Vec<&str> = vec!["-i", &cfg.ansible.inventory, &cfg.ansible.playbook];
    args.extend(extra_args.iter().map(String::as_str));

    tracing::info!(
        playbook = %cfg.ansible.playbook,
        inventory = %cfg.ansible.inventory,
        dir = %cfg.ansible.dir.display(),
        "running configuration convergence"
    );
    let code = runner
        .run_streamed("ansible-playbook", &args, Some(&cfg.ansible.dir))
        .await?;

    match code {
        Some(0) => Ok(()),
        Some(code) => Err(ForgeError::Convergence(code)),
        None => Err(ForgeError::Convergence(1)),
    }
}

/// Operator-facing success banner.
pub fn print_summary(cfg: &ForgeConfig) {
    println!();
    println!("Proxmox VE host is ready.");
    println!("  Web UI : https://{}:8006", cfg.network.ip);
    println!("  Login  : root@pam (root password from the vault)");
    println!("  SSH    : ssh {}@{}", cfg.ssh.user, cfg.network.ip);
}
