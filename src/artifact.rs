//! Release artifact download, extraction, and placement.

use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use tar::Archive;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use crate::error::InstallError;
use crate::host::HostEnvironment;

const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Abort if the download stream stalls this long.
const DOWNLOAD_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Installed binary mode: owner rwx, group/other rx.
const BINARY_MODE: u32 = 0o755;
const DEST_DIR_MODE: u32 = 0o755;

/// Download the release archive, extract the server binary, and place it at
/// `dest_dir/binary_name` owned by `user:group`.
///
/// Idempotent: re-running with the same inputs overwrites the previous
/// binary without requiring removal first. The transient workspace is
/// removed on every exit path, success or failure.
pub async fn install(
    host: &dyn HostEnvironment,
    download_url: &str,
    dest_dir: &Path,
    binary_name: &str,
    user: &str,
    group: &str,
) -> Result<(), InstallError> {
    // TempDir guard: the workspace disappears on drop, whichever way this
    // function exits.
    let workspace = tempfile::tempdir()
        .map_err(|e| InstallError::System(format!("failed to create download workspace: {e}")))?;

    let archive_path = workspace.path().join(format!("{binary_name}.tar.gz"));
    download(download_url, &archive_path).await?;

    let extracted = workspace.path().join(binary_name);
    {
        let archive_path = archive_path.clone();
        let entry = binary_name.to_string();
        let extracted = extracted.clone();
        tokio::task::spawn_blocking(move || extract_entry(&archive_path, &entry, &extracted))
            .await
            .map_err(|e| InstallError::System(format!("extraction task failed: {e}")))??;
    }

    host.ensure_directory(dest_dir, DEST_DIR_MODE)?;
    host.chown(dest_dir, user, group)?;

    let dest = dest_dir.join(binary_name);
    host.install_file(&extracted, &dest, BINARY_MODE, user, group)?;
    info!("installed {}", dest.display());

    Ok(())
}

/// Stream `url` into `dest` with byte-level progress.
async fn download(url: &str, dest: &Path) -> Result<(), InstallError> {
    let client = reqwest::Client::builder()
        .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
        .user_agent(concat!("relayd-install/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| download_failed(url, e))?;

    let response = client.get(url).send().await.map_err(|e| download_failed(url, e))?;
    if !response.status().is_success() {
        return Err(InstallError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   [{bar:50.green/blue}] {bytes}/{total_bytes}  {msg}")
            .map_err(|e| InstallError::System(format!("invalid progress bar template: {e}")))?
            .progress_chars("█▓░"),
    );
    pb.set_message("downloading");

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| InstallError::System(format!("failed to create {}: {e}", dest.display())))?;

    let mut stream = response.bytes_stream();
    loop {
        let chunk = match timeout(DOWNLOAD_INACTIVITY_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                pb.finish_and_clear();
                return Err(download_failed(url, e));
            }
            Ok(None) => break,
            Err(_) => {
                pb.finish_and_clear();
                return Err(InstallError::DownloadFailed {
                    url: url.to_string(),
                    reason: format!(
                        "no data received for {} seconds",
                        DOWNLOAD_INACTIVITY_TIMEOUT.as_secs()
                    ),
                });
            }
        };
        file.write_all(&chunk)
            .await
            .map_err(|e| InstallError::System(format!("failed to write {}: {e}", dest.display())))?;
        pb.inc(chunk.len() as u64);
    }

    file.flush()
        .await
        .map_err(|e| InstallError::System(format!("failed to flush {}: {e}", dest.display())))?;
    pb.finish_and_clear();
    Ok(())
}

fn download_failed(url: &str, err: impl std::fmt::Display) -> InstallError {
    InstallError::DownloadFailed {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

/// Unpack the single `entry_name` entry from a gzip tar archive into `dest`.
///
/// The archive contract is one binary entry at the archive root; anything
/// else in the archive is ignored.
fn extract_entry(archive_path: &Path, entry_name: &str, dest: &Path) -> Result<(), InstallError> {
    let file = std::fs::File::open(archive_path)
        .map_err(|e| extract_failed(entry_name, format!("cannot open archive: {e}")))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let entries = archive
        .entries()
        .map_err(|e| extract_failed(entry_name, format!("cannot read archive: {e}")))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| extract_failed(entry_name, format!("corrupt archive entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| extract_failed(entry_name, format!("corrupt entry path: {e}")))?
            .into_owned();

        // Some tar producers prefix root entries with `./`.
        let matches = path == Path::new(entry_name)
            || path.strip_prefix(".").is_ok_and(|p| p == Path::new(entry_name));
        if matches {
            entry
                .unpack(dest)
                .map_err(|e| extract_failed(entry_name, format!("cannot unpack: {e}")))?;
            return Ok(());
        }
    }

    Err(extract_failed(
        entry_name,
        "entry not present in archive".to_string(),
    ))
}

fn extract_failed(entry: &str, reason: String) -> InstallError {
    InstallError::ExtractFailed {
        entry: entry.to_string(),
        reason,
    }
}
