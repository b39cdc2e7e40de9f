//! Error taxonomy for the bootstrap pipeline.
//!
//! Every stage fails the whole run immediately; the only deliberately lenient
//! paths (network reservation insertion, destroy of an absent VM) are modeled
//! as typed outcomes in their own modules rather than as errors.

use std::path::PathBuf;

use thiserror::Error;

pub type ForgeResult<T> = Result<T, ForgeError>;

#[derive(Debug, Error)]
pub enum ForgeError {
    /// A required external executable is not on PATH.
    #[error("required tool not found on PATH: {0}")]
    MissingDependency(String),

    /// A required local credential file is absent.
    #[error("required credential file missing: {0}")]
    MissingCredentialFile(PathBuf),

    /// Installer image download failed. The cache entry may be truncated and
    /// must be cleared manually before retrying.
    #[error("download failed: {0}")]
    Download(String),

    /// A named secret could not be extracted from the decrypted vault.
    #[error("secret lookup failed: {0}")]
    SecretLookup(String),

    /// `virt-install` failed. Never retried automatically; destroy and re-run.
    #[error("VM creation failed: {0}")]
    VmCreation(String),

    /// The target never accepted an SSH connection within the attempt budget.
    #[error("target did not accept SSH connections after {attempts} attempts")]
    SshTimeout { attempts: u32 },

    /// The configuration-management engine reported failure; the exit code is
    /// propagated to the operator verbatim.
    #[error("configuration run failed with exit code {0}")]
    Convergence(i32),

    /// A hypervisor CLI invocation failed outside the creation path.
    #[error("hypervisor command failed: {0}")]
    Hypervisor(String),

    /// Install-configuration template is malformed or a placeholder survived
    /// substitution.
    #[error("install template error: {0}")]
    Template(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),

    /// Configuration file could not be loaded or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// An external command could not be launched at all.
    #[error("failed to launch external command: {0}")]
    Launch(String),

    /// Pipeline wiring bug (stage ran out of order, missing output).
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
