//! Error taxonomy for the install workflow.
//!
//! Every variant is terminal for the run: nothing is retried, and no
//! completed step is rolled back. Re-invoking the installer after the cause
//! is fixed is safe because each provisioning step is idempotent.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("installation requires root privileges")]
    PermissionDenied,

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("failed to fetch release metadata from {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("invalid release metadata: {reason}; body starts with: {preview}")]
    InvalidMetadata { reason: String, preview: String },

    #[error("failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("failed to extract {entry} from release archive: {reason}")]
    ExtractFailed { entry: String, reason: String },

    #[error("failed to create service account {name}: {reason}")]
    AccountCreationFailed { name: String, reason: String },

    #[error("service unit template not found at {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("failed to fetch service unit template from {url}: {reason}")]
    TemplateFetchFailed { url: String, reason: String },

    #[error("systemd daemon-reload failed: {0}")]
    ServiceReloadFailed(String),

    #[error("failed to enable service: {0}")]
    ServiceEnableFailed(String),

    #[error("{0}")]
    System(String),
}
