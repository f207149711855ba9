//! End-to-end install flow over loopback HTTP endpoints.
//!
//! A local server publishes the release metadata, the artifact archive, and
//! the unit template; all host mutations land in the in-memory host.

mod common;

use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use axum::routing::get;
use common::FakeHost;
use flate2::Compression;
use flate2::write::GzEncoder;
use relayd_install::config::InstallConfig;
use relayd_install::error::InstallError;
use relayd_install::orchestrator::{InstallOrchestrator, InstallState};

const BINARY_CONTENT: &[u8] = b"#!/bin/sh\necho relayd\n";

fn release_archive() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(BINARY_CONTENT.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, "relayd", BINARY_CONTENT).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// Serve metadata, archive, and template on an ephemeral loopback port. The
/// metadata covers every supported platform so the flow works wherever the
/// tests run.
async fn serve_release() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let archive_url = format!("http://{addr}/relayd.tar.gz");
    let metadata = serde_json::json!({
        "version": "1.4.2",
        "downloads": {
            "linux-amd64": archive_url.clone(),
            "linux-arm64": archive_url.clone(),
            "darwin-amd64": archive_url.clone(),
            "darwin-arm64": archive_url,
        },
    })
    .to_string();
    let archive = release_archive();
    let template = include_str!("../templates/relayd.service.template");

    let app = Router::new()
        .route("/latest.json", get(move || async move { metadata }))
        .route("/relayd.tar.gz", get(move || async move { archive }))
        .route(
            "/relayd.service.template",
            get(move || async move { template }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn test_config(addr: SocketAddr) -> InstallConfig {
    let mut config = InstallConfig::default();
    config.metadata_url = format!("http://{addr}/latest.json");
    config.template_url = format!("http://{addr}/relayd.service.template");
    config
}

#[tokio::test]
async fn full_run_reaches_complete_with_expected_host_effects() {
    let addr = serve_release().await;
    let host = FakeHost::new();

    let mut orchestrator = InstallOrchestrator::new(test_config(addr), &host);
    orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.state(), InstallState::Complete);

    let state = host.state.lock().unwrap();
    assert!(state.groups.contains("relayd"));
    assert!(state.users.contains("relayd"));

    let binary = state.files.get(Path::new("/opt/relayd/relayd")).unwrap();
    assert_eq!(binary.bytes, BINARY_CONTENT);
    assert_eq!(binary.mode, 0o755);
    assert_eq!(
        binary.owner,
        Some(("relayd".to_string(), "relayd".to_string()))
    );

    let unit = state
        .files
        .get(Path::new("/etc/systemd/system/relayd.service"))
        .unwrap();
    let text = String::from_utf8(unit.bytes.clone()).unwrap();
    assert!(!text.contains('@'), "unresolved placeholders: {text}");
    assert!(text.contains("User=relayd"));
    assert!(text.contains("Group=relayd"));
    assert!(text.contains("WorkingDirectory=/opt/relayd"));
    assert!(text.contains("EnvironmentFile=-/etc/relayd/relayd.env"));
    assert!(text.contains("ExecStart=/opt/relayd/relayd"));

    let events = state.events.clone();
    drop(state);

    let account = events.iter().position(|e| e.starts_with("useradd")).unwrap();
    let install = events.iter().position(|e| e.starts_with("install ")).unwrap();
    let reload = events.iter().position(|e| e == "daemon-reload").unwrap();
    let enable = events.iter().position(|e| e == "enable relayd").unwrap();
    assert!(account < install, "account must be provisioned before the artifact");
    assert!(install < reload, "unit install precedes the reload");
    assert!(reload < enable, "reload precedes enable");

    // the service is enabled, never started
    assert!(events.iter().all(|e| !e.starts_with("start")));
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let addr = serve_release().await;
    let host = FakeHost::new();

    InstallOrchestrator::new(test_config(addr), &host).run().await.unwrap();
    InstallOrchestrator::new(test_config(addr), &host).run().await.unwrap();

    let events = host.events();
    assert_eq!(events.iter().filter(|e| e.starts_with("groupadd")).count(), 1);
    assert_eq!(events.iter().filter(|e| e.starts_with("useradd")).count(), 1);
    // the artifact and unit are simply overwritten on the second pass
    assert_eq!(events.iter().filter(|e| e.starts_with("install ")).count(), 2);

    let state = host.state.lock().unwrap();
    assert!(state.files.contains_key(Path::new("/opt/relayd/relayd")));
    assert!(
        state
            .files
            .contains_key(Path::new("/etc/systemd/system/relayd.service"))
    );
    assert_eq!(state.files.len(), 2, "exactly one binary and one unit file");
}

#[tokio::test]
async fn unreachable_metadata_aborts_before_any_host_mutation() {
    let host = FakeHost::new();
    let mut config = InstallConfig::default();
    // discard port: nothing listens here
    config.metadata_url = "http://127.0.0.1:9/latest.json".to_string();

    let mut orchestrator = InstallOrchestrator::new(config, &host);
    let err = orchestrator.run().await.unwrap_err();

    assert!(matches!(err, InstallError::FetchFailed { .. }), "{err:?}");
    assert_eq!(orchestrator.state(), InstallState::FetchingMetadata);
    assert!(host.events().is_empty(), "no provisioning side effects");
}

#[tokio::test]
async fn unprivileged_host_is_rejected_up_front() {
    let host = FakeHost::unprivileged();

    let mut orchestrator = InstallOrchestrator::new(InstallConfig::default(), &host);
    let err = orchestrator.run().await.unwrap_err();

    assert!(matches!(err, InstallError::PermissionDenied));
    assert!(host.events().is_empty());
}
