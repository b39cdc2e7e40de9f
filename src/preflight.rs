//! Dependency and precondition checks.
//!
//! Runs before anything destructive: verifies every external tool is on PATH
//! and every credential file exists. Fails fast on the first missing
//! requirement and has no side effects.

use crate::config::{ForgeConfig, REQUIRED_TOOLS};
use crate::errors::{ForgeError, ForgeResult};
use crate::util::find_binary;

pub fn check(cfg: &ForgeConfig) -> ForgeResult<()> {
    check_tools()?;
    check_credentials(cfg)
}

/// Verify every required executable is on PATH.
pub fn check_tools() -> ForgeResult<()> {
    for tool in REQUIRED_TOOLS {
        let path = find_binary(tool)?;
        tracing::debug!(tool, path = %path.display(), "dependency present");
    }
    Ok(())
}

/// Verify every required credential file exists.
pub fn check_credentials(cfg: &ForgeConfig) -> ForgeResult<()> {
    let required = [
        &cfg.credentials.vault_file,
        &cfg.credentials.vault_password_file,
        &cfg.credentials.ssh_public_key,
    ];
    for path in required {
        if !path.is_file() {
            return Err(ForgeError::MissingCredentialFile(path.clone()));
        }
        tracing::debug!(path = %path.display(), "credential file present");
    }
    Ok(())
}
