//! Vault access and credential hashing.
//!
//! Secrets live encrypted at rest in an ansible-vault document. Reading a
//! secret decrypts the whole document in memory (`ansible-vault view`) and
//! extracts the field by textual key match. Plaintext never touches disk;
//! only the derived SHA-512-crypt hashes are written into the generated
//! install configuration.

use std::path::Path;

use sha_crypt::{Sha512Params, sha512_simple};

use crate::errors::{ForgeError, ForgeResult};
use crate::util::CommandRunner;

/// Vault key holding the Proxmox root password.
pub const ROOT_PASSWORD_KEY: &str = "root_password";
/// Vault key holding the unprivileged admin user's password.
pub const USER_PASSWORD_KEY: &str = "user_password";

/// Handle to the encrypted secrets document.
pub struct Vault<'a> {
    runner: &'a dyn CommandRunner,
    vault_file: &'a Path,
    password_file: &'a Path,
}

impl<'a> Vault<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        vault_file: &'a Path,
        password_file: &'a Path,
    ) -> Self {
        Self {
            runner,
            vault_file,
            password_file,
        }
    }

    /// Decrypt the store and extract one named field.
    ///
    /// A missing key is fatal: letting an empty value flow into the install
    /// configuration would silently produce an account with a broken hash.
    pub async fn read(&self, key: &str) -> ForgeResult<String> {
        let password_file = self.password_file.display().to_string();
        let vault_file = self.vault_file.display().to_string();
        let view = self
            .runner
            .run(
                "ansible-vault",
                &[
                    "view",
                    "--vault-password-file",
                    &password_file,
                    &vault_file,
                ],
            )
            .await?;

        if !view.success() {
            return Err(ForgeError::SecretLookup(format!(
                "vault decrypt failed: {}",
                view.stderr.trim()
            )));
        }

        extract_field(&view.stdout, key)
            .ok_or_else(|| ForgeError::SecretLookup(format!("key '{key}' not present in vault")))
    }
}

/// Find `key: value` in the decrypted document. Quoting is stripped; an
/// empty value counts as missing.
fn extract_field(plaintext: &str, key: &str) -> Option<String> {
    plaintext.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        if k.trim() != key {
            return None;
        }
        let value = v.trim().trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Derive an irreversible salted SHA-512-crypt hash (the `$6$` scheme the
/// installer expects for pre-hashed passwords).
pub fn hash_password(plain: &str) -> ForgeResult<String> {
    let params = Sha512Params::default();
    sha512_simple(plain, &params).map_err(|e| ForgeError::Hash(format!("{e:?}")))
}
