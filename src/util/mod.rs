//! Shared utilities.

pub mod process;

pub use process::{CommandOutput, CommandRunner, HostRunner, find_binary};
