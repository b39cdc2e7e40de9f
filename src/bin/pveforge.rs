//! Dispatcher: maps a verb to a stage sequence.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pveforge::util::{CommandRunner, HostRunner};
use pveforge::{ForgeConfig, ForgeError, ForgeResult, provision};

#[derive(Parser)]
#[command(name = "pveforge", version, about = "Bootstrap a Proxmox VE host on libvirt")]
struct Cli {
    /// JSON file overriding the built-in deployment constants.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full bootstrap: preflight, reservation, image, install, wait, converge
    Up,
    /// Run configuration management only; arguments after the verb are
    /// forwarded to the engine verbatim
    Ansible {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Force-stop the VM and delete it together with its storage. Irreversible
    Destroy,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> ForgeResult<()> {
    let config = match &cli.config {
        Some(path) => ForgeConfig::load(path)?,
        None => ForgeConfig::default(),
    };
    let runner: Arc<dyn CommandRunner> = Arc::new(HostRunner);

    match cli.command {
        Command::Up => {
            provision::run_full(config, runner).await?;
        }
        Command::Ansible { args } => {
            provision::run_ansible(config, runner, args).await?;
        }
        Command::Destroy => {
            provision::run_destroy(config, runner).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = dispatch(cli).await {
        eprintln!("\x1b[1;31merror:\x1b[0m {err}");
        let code = match err {
            ForgeError::Convergence(code) if code > 0 => code,
            _ => 1,
        };
        std::process::exit(code);
    }
}
