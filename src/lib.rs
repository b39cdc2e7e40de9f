//! pveforge: unattended Proxmox VE host bootstrap on top of libvirt.
//!
//! Sequencing glue around mature external tools: `virt-install` drives the
//! unattended OS install, `virsh` handles domain and network state,
//! `ansible-vault` guards the credentials, and `ansible-playbook` converges
//! the installed host. The crate's own job is the idempotent stage pipeline
//! that decides what to (re)do given the current state of the VM and the
//! network, and to fail loudly when a stage cannot.

pub mod ansible;
pub mod cache;
pub mod config;
pub mod errors;
pub mod installcfg;
pub mod net;
pub mod pipeline;
pub mod preflight;
pub mod provision;
pub mod retry;
pub mod secrets;
pub mod ssh;
pub mod util;
pub mod vm;

pub use config::ForgeConfig;
pub use errors::{ForgeError, ForgeResult};
