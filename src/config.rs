//! Bootstrap configuration.
//!
//! The original deployment constants live in the `Default` impls so a plain
//! `pveforge up` works against the stock libvirt `default` network. Every
//! field can be overridden through a JSON file passed with `--config`; the
//! file only needs to name the fields it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ForgeError, ForgeResult};

/// External executables every run depends on, checked during preflight.
pub const REQUIRED_TOOLS: &[&str] = &[
    "virsh",
    "virt-install",
    "ansible-playbook",
    "ansible-vault",
    "ssh",
];

/// Resource and identity spec for the Proxmox VE guest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VmSpec {
    /// Libvirt domain name.
    pub name: String,
    pub cpus: u32,
    pub memory_mib: u64,
    pub disk_gib: u64,
    /// Fixed MAC, bound 1:1 to the DHCP reservation.
    pub mac: String,
    /// `--os-variant` hint for virt-install.
    pub os_variant: String,
}

impl Default for VmSpec {
    fn default() -> Self {
        Self {
            name: "pve".to_string(),
            cpus: 4,
            memory_mib: 8192,
            disk_gib: 64,
            mac: "52:54:00:ab:cd:10".to_string(),
            os_variant: "debian12".to_string(),
        }
    }
}

/// Virtual network identity and the address the guest is pinned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSpec {
    /// Libvirt network the reservation is inserted into.
    pub network: String,
    pub ip: String,
    /// Host name recorded alongside the reservation.
    pub hostname: String,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self {
            network: "default".to_string(),
            ip: "192.168.122.10".to_string(),
            hostname: "pve".to_string(),
        }
    }
}

/// Where the installer image comes from and what the cache entry is called.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSource {
    pub url: String,
    pub filename: String,
}

impl Default for ImageSource {
    fn default() -> Self {
        Self {
            url: "https://cdimage.debian.org/debian-cd/current/amd64/iso-cd/debian-12.5.0-amd64-netinst.iso"
                .to_string(),
            filename: "debian-12-netinst.iso".to_string(),
        }
    }
}

/// Local files holding credential material. All of these must exist before
/// any destructive stage runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialPaths {
    /// Encrypted vault document with the root and user passwords.
    pub vault_file: PathBuf,
    /// Password file paired with the vault.
    pub vault_password_file: PathBuf,
    /// Public key injected into the installed system.
    pub ssh_public_key: PathBuf,
}

impl Default for CredentialPaths {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            vault_file: PathBuf::from("secrets/vault.yml"),
            vault_password_file: PathBuf::from("secrets/.vault_pass"),
            ssh_public_key: home.join(".ssh/id_ed25519.pub"),
        }
    }
}

/// Reachability probe parameters. A fixed-interval bounded retry, no backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshProbeSpec {
    pub user: String,
    pub connect_timeout_secs: u64,
    pub max_attempts: u32,
    pub interval_secs: u64,
}

impl Default for SshProbeSpec {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            connect_timeout_secs: 5,
            max_attempts: 30,
            interval_secs: 10,
        }
    }
}

/// Where the convergence engine finds its playbook and inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsibleSpec {
    /// Working directory the engine is invoked from.
    pub dir: PathBuf,
    pub playbook: String,
    pub inventory: String,
}

impl Default for AnsibleSpec {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("ansible"),
            playbook: "site.yml".to_string(),
            inventory: "inventory.ini".to_string(),
        }
    }
}

/// Full configuration passed into every stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub vm: VmSpec,
    pub network: NetworkSpec,
    pub image: ImageSource,
    pub credentials: CredentialPaths,
    /// Install-configuration template with the three placeholder tokens.
    pub template: TemplatePath,
    /// Holds the downloaded image and the generated install configuration.
    /// Fully disposable; the operator may delete it at any time.
    pub cache_dir: CacheDir,
    pub ssh: SshProbeSpec,
    pub ansible: AnsibleSpec,
}

/// Newtype wrappers so `Default` can resolve user directories lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplatePath(pub PathBuf);

impl Default for TemplatePath {
    fn default() -> Self {
        Self(PathBuf::from("templates/preseed.cfg"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheDir(pub PathBuf);

impl Default for CacheDir {
    fn default() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        Self(base.join("pveforge"))
    }
}

impl ForgeConfig {
    /// Load a JSON override file on top of the defaults.
    pub fn load(path: &Path) -> ForgeResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ForgeError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ForgeError::Config(format!("{}: {e}", path.display())))
    }

    /// Cache path of the installer image.
    pub fn iso_path(&self) -> PathBuf {
        self.cache_dir.0.join(&self.image.filename)
    }

    /// Scratch path of the generated install configuration. Regenerated on
    /// every full run, never treated as a cache.
    pub fn preseed_path(&self) -> PathBuf {
        self.cache_dir.0.join("preseed.cfg")
    }
}
