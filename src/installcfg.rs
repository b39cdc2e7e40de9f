//! Unattended-install configuration generation.
//!
//! Materializes the preseed answer file from the template: three placeholder
//! tokens are replaced verbatim with the hashed root password, the hashed
//! user password, and the SSH public key. The result goes to a scratch path
//! in the cache directory and is regenerated on every full run. Plaintext
//! passwords are never substituted, only their hashes.

use std::path::Path;

use crate::errors::{ForgeError, ForgeResult};

pub const ROOT_HASH_TOKEN: &str = "{{ROOT_PASSWORD_HASH}}";
pub const USER_HASH_TOKEN: &str = "{{USER_PASSWORD_HASH}}";
pub const SSH_KEY_TOKEN: &str = "{{SSH_PUBLIC_KEY}}";

/// Values substituted into the template. Both password fields are already
/// one-way hashes by the time they reach this module.
#[derive(Debug)]
pub struct PreseedInputs {
    pub root_password_hash: String,
    pub user_password_hash: String,
    pub ssh_public_key: String,
}

/// Render the template to `dest`, replacing all three tokens.
///
/// A token missing from the template is an error: it would mean the install
/// configuration silently ships without that credential.
pub async fn render(template: &Path, dest: &Path, inputs: &PreseedInputs) -> ForgeResult<()> {
    let mut body = tokio::fs::read_to_string(template).await.map_err(|e| {
        ForgeError::Template(format!("cannot read {}: {e}", template.display()))
    })?;

    let substitutions = [
        (ROOT_HASH_TOKEN, inputs.root_password_hash.as_str()),
        (USER_HASH_TOKEN, inputs.user_password_hash.as_str()),
        (SSH_KEY_TOKEN, inputs.ssh_public_key.as_str()),
    ];
    for (token, value) in substitutions {
        if !body.contains(token) {
            return Err(ForgeError::Template(format!(
                "placeholder {token} not found in {}",
                template.display()
            )));
        }
        body = body.replace(token, value);
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, &body).await?;
    tracing::info!(path = %dest.display(), "install configuration generated");
    Ok(())
}
