//! Release metadata retrieval and validation.

use std::collections::HashMap;
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::error::InstallError;
use crate::platform::Platform;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on how much of a malformed response body is echoed back in
/// diagnostics.
const PREVIEW_LIMIT: usize = 200;

/// One release as published by the metadata endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseMetadata {
    pub version: String,
    /// Download URL per platform key. Entries may be explicitly null for
    /// platforms a release skipped.
    pub downloads: HashMap<String, Option<String>>,
}

impl ReleaseMetadata {
    /// Parse and validate a metadata document.
    pub fn parse(body: &str) -> Result<Self, InstallError> {
        let meta: ReleaseMetadata =
            serde_json::from_str(body).map_err(|e| InstallError::InvalidMetadata {
                reason: e.to_string(),
                preview: preview(body),
            })?;

        if meta.version.is_empty() || meta.version == "null" {
            return Err(InstallError::InvalidMetadata {
                reason: "missing release version".to_string(),
                preview: preview(body),
            });
        }

        Ok(meta)
    }

    /// Download URL for the detected platform. An absent entry and an
    /// explicit null both mean the release does not cover this platform,
    /// which is distinct from a malformed document.
    pub fn download_url(&self, platform: Platform) -> Result<&str, InstallError> {
        self.downloads
            .get(platform.key())
            .and_then(|entry| entry.as_deref())
            .ok_or_else(|| {
                InstallError::UnsupportedPlatform(format!(
                    "release {} has no download for {}",
                    self.version,
                    platform.key()
                ))
            })
    }
}

/// Fetch release metadata from `url`.
///
/// The body is buffered in memory; nothing outlives this call but the parsed
/// metadata, on success and failure paths alike.
pub async fn fetch(url: &str) -> Result<ReleaseMetadata, InstallError> {
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(FETCH_TIMEOUT)
        .user_agent(concat!("relayd-install/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| fetch_failed(url, e))?;

    let response = client.get(url).send().await.map_err(|e| fetch_failed(url, e))?;
    if !response.status().is_success() {
        return Err(InstallError::FetchFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let body = response.text().await.map_err(|e| fetch_failed(url, e))?;
    if body.is_empty() {
        return Err(InstallError::FetchFailed {
            url: url.to_string(),
            reason: "empty response body".to_string(),
        });
    }

    let meta = ReleaseMetadata::parse(&body)?;
    info!("resolved release {}", meta.version);
    Ok(meta)
}

fn fetch_failed(url: &str, err: reqwest::Error) -> InstallError {
    InstallError::FetchFailed {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

/// Truncate a response body for diagnostics without splitting a UTF-8
/// character.
fn preview(body: &str) -> String {
    if body.len() <= PREVIEW_LIMIT {
        return body.to_string();
    }
    let mut end = PREVIEW_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
