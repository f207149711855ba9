//! relayd-install: provisions the relayd server on the local host.
//!
//! The installer detects the platform, resolves the latest release from the
//! metadata endpoint, installs the server binary under a dedicated service
//! account, and registers a systemd unit for it (enabled, not started).
//! [`orchestrator::InstallOrchestrator`] sequences the workflow; every
//! mutation of shared host state goes through [`host::HostEnvironment`].

pub mod account;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod metadata;
pub mod orchestrator;
pub mod platform;
pub mod service;
pub mod unit;
