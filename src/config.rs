//! Install configuration, resolved once at startup.
//!
//! All tunables come from `RELAYD_*` environment overrides on top of built-in
//! defaults. The resolved struct is immutable and threaded by reference into
//! each provisioning step; nothing reads the environment deeper in the call
//! chain.

use std::env;
use std::path::PathBuf;

use crate::error::InstallError;

pub const SERVICE_NAME: &str = "relayd";
pub const BINARY_NAME: &str = "relayd";

#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Service account the server runs as.
    pub user: String,
    pub group: String,
    /// Install root; doubles as the service account home and the unit's
    /// working directory.
    pub install_dir: PathBuf,
    /// Where the server binary lands. Defaults to the install root.
    pub bin_dir: PathBuf,
    /// Environment file referenced (optionally) by the unit.
    pub env_file: PathBuf,
    pub metadata_url: String,
    /// Fallback source for the unit template when none ships next to the
    /// installer.
    pub template_url: String,
    pub unit_dir: PathBuf,
    pub service_name: String,
    pub binary_name: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        let install_dir = PathBuf::from("/opt/relayd");
        Self {
            user: "relayd".into(),
            group: "relayd".into(),
            bin_dir: install_dir.clone(),
            install_dir,
            env_file: PathBuf::from("/etc/relayd/relayd.env"),
            metadata_url: "https://dl.relayd.io/latest.json".into(),
            template_url: "https://dl.relayd.io/relayd.service.template".into(),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            service_name: SERVICE_NAME.into(),
            binary_name: BINARY_NAME.into(),
        }
    }
}

impl InstallConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, InstallError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolution against an arbitrary lookup so overrides can be injected.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InstallError> {
        let mut cfg = Self::default();

        if let Some(v) = override_value(&lookup, "RELAYD_USER")? {
            cfg.user = v;
        }
        if let Some(v) = override_value(&lookup, "RELAYD_GROUP")? {
            cfg.group = v;
        }
        if let Some(v) = override_value(&lookup, "RELAYD_INSTALL_DIR")? {
            cfg.install_dir = PathBuf::from(v);
        }
        // An explicit binary directory wins; otherwise it follows the install
        // root, including an overridden one.
        cfg.bin_dir = match override_value(&lookup, "RELAYD_BIN_DIR")? {
            Some(v) => PathBuf::from(v),
            None => cfg.install_dir.clone(),
        };
        if let Some(v) = override_value(&lookup, "RELAYD_ENV_FILE")? {
            cfg.env_file = PathBuf::from(v);
        }
        if let Some(v) = override_value(&lookup, "RELAYD_METADATA_URL")? {
            cfg.metadata_url = v;
        }
        if let Some(v) = override_value(&lookup, "RELAYD_TEMPLATE_URL")? {
            cfg.template_url = v;
        }

        Ok(cfg)
    }

    /// Absolute path of the installed server binary.
    pub fn exec_start(&self) -> PathBuf {
        self.bin_dir.join(&self.binary_name)
    }

    /// File name the unit template is looked up under next to the installer.
    pub fn template_file_name(&self) -> String {
        format!("{}.service.template", self.service_name)
    }
}

/// Overrides are plain strings; the only validation performed is
/// non-emptiness.
fn override_value(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<String>, InstallError> {
    match lookup(key) {
        Some(v) if v.trim().is_empty() => {
            Err(InstallError::System(format!("{key} must not be empty")))
        }
        other => Ok(other),
    }
}
