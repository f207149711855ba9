//! Install orchestration.
//!
//! Sequences the provisioning steps over a [`HostEnvironment`]. Steps run
//! strictly in order; the first failure aborts the run with a typed error
//! and no rollback. Completed steps are left in place, and a re-run after
//! the cause is fixed finishes the remaining work because every step is
//! idempotent.

use std::path::PathBuf;
use std::time::Duration;

use log::info;

use crate::account;
use crate::artifact;
use crate::config::InstallConfig;
use crate::error::InstallError;
use crate::host::HostEnvironment;
use crate::metadata;
use crate::platform::Platform;
use crate::service;
use crate::unit::{self, UnitParams};

/// Steps of one install run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    ResolvingConfig,
    DetectingPlatform,
    FetchingMetadata,
    ProvisioningAccount,
    InstallingArtifact,
    ResolvingTemplate,
    GeneratingUnit,
    RegisteringService,
    Complete,
}

pub struct InstallOrchestrator<'a> {
    config: InstallConfig,
    host: &'a dyn HostEnvironment,
    state: InstallState,
}

impl<'a> InstallOrchestrator<'a> {
    pub fn new(config: InstallConfig, host: &'a dyn HostEnvironment) -> Self {
        Self {
            config,
            host,
            state: InstallState::ResolvingConfig,
        }
    }

    /// The step the run last entered. [`InstallState::Complete`] after a
    /// successful run; the failing step after an aborted one.
    pub fn state(&self) -> InstallState {
        self.state
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Run the whole workflow, fail-fast.
    pub async fn run(&mut self) -> Result<(), InstallError> {
        // Privilege check happens once, before anything touches the host.
        if !self.host.is_privileged() {
            return Err(InstallError::PermissionDenied);
        }

        self.enter(InstallState::DetectingPlatform);
        let platform = Platform::detect()?;
        info!("detected platform {}", platform.key());

        self.enter(InstallState::FetchingMetadata);
        let release = metadata::fetch(&self.config.metadata_url).await?;
        let download_url = release.download_url(platform)?.to_string();
        info!(
            "installing {} {} from {download_url}",
            self.config.binary_name, release.version
        );

        self.enter(InstallState::ProvisioningAccount);
        account::ensure(
            self.host,
            &self.config.user,
            &self.config.group,
            &self.config.install_dir,
        )?;

        self.enter(InstallState::InstallingArtifact);
        artifact::install(
            self.host,
            &download_url,
            &self.config.bin_dir,
            &self.config.binary_name,
            &self.config.user,
            &self.config.group,
        )
        .await?;

        self.enter(InstallState::ResolvingTemplate);
        let template = self.resolve_template().await?;

        self.enter(InstallState::GeneratingUnit);
        let working_dir = self.config.install_dir.to_string_lossy().into_owned();
        let env_file = self.config.env_file.to_string_lossy().into_owned();
        let exec_start = self.config.exec_start().to_string_lossy().into_owned();
        let unit_text = unit::render(
            &template,
            &UnitParams {
                user: &self.config.user,
                group: &self.config.group,
                working_dir: &working_dir,
                env_file: &env_file,
                exec_start: &exec_start,
            },
        );

        self.enter(InstallState::RegisteringService);
        service::register(
            self.host,
            &unit_text,
            &self.config.service_name,
            &self.config.unit_dir,
            &self.config.install_dir,
            &self.config.user,
            &self.config.group,
        )?;

        self.enter(InstallState::Complete);
        Ok(())
    }

    fn enter(&mut self, state: InstallState) {
        self.state = state;
        info!("install step: {state:?}");
    }

    /// Template resolution order: a file next to the running installer, the
    /// same file next to the canonicalized installer path, then the release
    /// endpoint. A miss at the network step is fatal.
    async fn resolve_template(&self) -> Result<String, InstallError> {
        let file_name = self.config.template_file_name();
        for dir in installer_dirs() {
            let candidate = dir.join(&file_name);
            if candidate.exists() {
                info!("using unit template {}", candidate.display());
                return unit::load_template(&candidate);
            }
        }

        info!("no local unit template, fetching {}", self.config.template_url);
        fetch_template(&self.config.template_url).await
    }
}

/// Directories the installer may carry its template in: its own directory,
/// and the directory of its canonicalized path when invoked through a
/// symlink.
fn installer_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            dirs.push(parent.to_path_buf());
        }
        if let Ok(canonical) = exe.canonicalize() {
            if let Some(parent) = canonical.parent() {
                let parent = parent.to_path_buf();
                if !dirs.contains(&parent) {
                    dirs.push(parent);
                }
            }
        }
    }
    dirs
}

/// Fetch the unit template from its well-known location. Buffered in
/// memory; nothing persists past this step.
async fn fetch_template(url: &str) -> Result<String, InstallError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("relayd-install/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| template_fetch_failed(url, e))?;

    let response = client.get(url).send().await.map_err(|e| template_fetch_failed(url, e))?;
    if !response.status().is_success() {
        return Err(InstallError::TemplateFetchFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let body = response.text().await.map_err(|e| template_fetch_failed(url, e))?;
    if body.is_empty() {
        return Err(InstallError::TemplateFetchFailed {
            url: url.to_string(),
            reason: "empty response body".to_string(),
        });
    }
    Ok(body)
}

fn template_fetch_failed(url: &str, err: reqwest::Error) -> InstallError {
    InstallError::TemplateFetchFailed {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
