//! Host capability surface.
//!
//! Every mutation of shared host state (filesystem, user database, service
//! manager) funnels through [`HostEnvironment`], so the provisioning steps
//! can be exercised against an in-memory host in tests. [`SystemHost`] is the
//! production implementation: real filesystem, `useradd`/`groupadd`, and
//! `systemctl`, each located through `which`.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output};

use log::debug;
use nix::unistd::{Gid, Group, Uid, User, chown, geteuid};
use walkdir::WalkDir;

use crate::error::InstallError;

/// Shell that forbids interactive login for the service account.
const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

pub trait HostEnvironment: Send + Sync {
    /// Whether the process runs with the privileges provisioning requires.
    fn is_privileged(&self) -> bool;

    fn group_exists(&self, group: &str) -> Result<bool, InstallError>;
    fn user_exists(&self, user: &str) -> Result<bool, InstallError>;
    fn path_exists(&self, path: &Path) -> bool;

    /// Create a system group. Not idempotent on its own; callers check
    /// existence first.
    fn create_system_group(&self, group: &str) -> Result<(), InstallError>;

    /// Create a system user with the given primary group, home directory,
    /// and a shell that forbids interactive login. The home directory itself
    /// is not created here.
    fn create_system_user(&self, user: &str, group: &str, home: &Path)
    -> Result<(), InstallError>;

    /// Create `path` (and intermediate directories) with `mode`.
    fn ensure_directory(&self, path: &Path, mode: u32) -> Result<(), InstallError>;

    /// Copy `src` to `dest` with `mode` and `user:group` ownership,
    /// overwriting any existing file.
    fn install_file(
        &self,
        src: &Path,
        dest: &Path,
        mode: u32,
        user: &str,
        group: &str,
    ) -> Result<(), InstallError>;

    /// Atomically write `content` to `path` with `mode`, replacing any prior
    /// file.
    fn write_file(&self, path: &Path, content: &str, mode: u32) -> Result<(), InstallError>;

    fn chown(&self, path: &Path, user: &str, group: &str) -> Result<(), InstallError>;
    fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<(), InstallError>;

    fn reload_service_manager(&self) -> Result<(), InstallError>;

    /// Enable (but do not start) a service for automatic start at boot.
    fn enable_service(&self, service: &str) -> Result<(), InstallError>;
}

pub struct SystemHost;

impl SystemHost {
    fn resolve_ids(user: &str, group: &str) -> Result<(Uid, Gid), InstallError> {
        let user = User::from_name(user)
            .map_err(|e| InstallError::System(format!("user lookup failed for {user}: {e}")))?
            .ok_or_else(|| InstallError::System(format!("user {user} does not exist")))?;
        let group = Group::from_name(group)
            .map_err(|e| InstallError::System(format!("group lookup failed for {group}: {e}")))?
            .ok_or_else(|| InstallError::System(format!("group {group} does not exist")))?;
        Ok((user.uid, group.gid))
    }

    /// Run a host tool located via `which`, returning a failure reason the
    /// caller maps into its own error variant.
    fn run_tool(tool: &str, args: &[&str]) -> Result<Output, String> {
        let bin = which::which(tool).map_err(|e| format!("{tool} not found on this host: {e}"))?;
        debug!("running {tool} {}", args.join(" "));
        Command::new(bin)
            .args(args)
            .output()
            .map_err(|e| format!("failed to run {tool}: {e}"))
    }
}

fn tool_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exit status {}", output.status)
    } else {
        stderr
    }
}

impl HostEnvironment for SystemHost {
    fn is_privileged(&self) -> bool {
        geteuid().is_root()
    }

    fn group_exists(&self, group: &str) -> Result<bool, InstallError> {
        Group::from_name(group)
            .map(|g| g.is_some())
            .map_err(|e| InstallError::System(format!("group lookup failed for {group}: {e}")))
    }

    fn user_exists(&self, user: &str) -> Result<bool, InstallError> {
        User::from_name(user)
            .map(|u| u.is_some())
            .map_err(|e| InstallError::System(format!("user lookup failed for {user}: {e}")))
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_system_group(&self, group: &str) -> Result<(), InstallError> {
        let output =
            Self::run_tool("groupadd", &["--system", group]).map_err(|reason| {
                InstallError::AccountCreationFailed {
                    name: group.to_string(),
                    reason,
                }
            })?;
        if !output.status.success() {
            return Err(InstallError::AccountCreationFailed {
                name: group.to_string(),
                reason: tool_failure(&output),
            });
        }
        Ok(())
    }

    fn create_system_user(
        &self,
        user: &str,
        group: &str,
        home: &Path,
    ) -> Result<(), InstallError> {
        let home = home.to_string_lossy();
        let args = [
            "--system",
            "--gid",
            group,
            "--home-dir",
            home.as_ref(),
            "--shell",
            NOLOGIN_SHELL,
            "--no-create-home",
            user,
        ];
        let output = Self::run_tool("useradd", &args).map_err(|reason| {
            InstallError::AccountCreationFailed {
                name: user.to_string(),
                reason,
            }
        })?;
        if !output.status.success() {
            return Err(InstallError::AccountCreationFailed {
                name: user.to_string(),
                reason: tool_failure(&output),
            });
        }
        Ok(())
    }

    fn ensure_directory(&self, path: &Path, mode: u32) -> Result<(), InstallError> {
        fs::create_dir_all(path)
            .map_err(|e| InstallError::System(format!("failed to create {}: {e}", path.display())))?;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
            InstallError::System(format!("failed to set mode on {}: {e}", path.display()))
        })
    }

    fn install_file(
        &self,
        src: &Path,
        dest: &Path,
        mode: u32,
        user: &str,
        group: &str,
    ) -> Result<(), InstallError> {
        fs::copy(src, dest)
            .map_err(|e| InstallError::System(format!("failed to install {}: {e}", dest.display())))?;
        fs::set_permissions(dest, fs::Permissions::from_mode(mode)).map_err(|e| {
            InstallError::System(format!("failed to set mode on {}: {e}", dest.display()))
        })?;
        self.chown(dest, user, group)
    }

    /// Write via a sibling temp file and rename, so a crash mid-write never
    /// leaves a truncated file at `path`.
    fn write_file(&self, path: &Path, content: &str, mode: u32) -> Result<(), InstallError> {
        let temp_path = path.with_extension("tmp");

        {
            let mut file = fs::File::create(&temp_path).map_err(|e| {
                InstallError::System(format!("failed to create {}: {e}", temp_path.display()))
            })?;
            file.write_all(content.as_bytes()).map_err(|e| {
                InstallError::System(format!("failed to write {}: {e}", temp_path.display()))
            })?;
            file.sync_all().map_err(|e| {
                InstallError::System(format!("failed to sync {}: {e}", temp_path.display()))
            })?;
        }

        fs::set_permissions(&temp_path, fs::Permissions::from_mode(mode)).map_err(|e| {
            InstallError::System(format!("failed to set mode on {}: {e}", temp_path.display()))
        })?;
        fs::rename(&temp_path, path).map_err(|e| {
            InstallError::System(format!("failed to move into place {}: {e}", path.display()))
        })
    }

    fn chown(&self, path: &Path, user: &str, group: &str) -> Result<(), InstallError> {
        let (uid, gid) = Self::resolve_ids(user, group)?;
        chown(path, Some(uid), Some(gid))
            .map_err(|e| InstallError::System(format!("failed to chown {}: {e}", path.display())))
    }

    fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<(), InstallError> {
        let (uid, gid) = Self::resolve_ids(user, group)?;
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|e| {
                InstallError::System(format!("failed to walk {}: {e}", path.display()))
            })?;
            chown(entry.path(), Some(uid), Some(gid)).map_err(|e| {
                InstallError::System(format!("failed to chown {}: {e}", entry.path().display()))
            })?;
        }
        Ok(())
    }

    fn reload_service_manager(&self) -> Result<(), InstallError> {
        let output = Self::run_tool("systemctl", &["daemon-reload"])
            .map_err(InstallError::ServiceReloadFailed)?;
        if !output.status.success() {
            return Err(InstallError::ServiceReloadFailed(tool_failure(&output)));
        }
        Ok(())
    }

    fn enable_service(&self, service: &str) -> Result<(), InstallError> {
        let unit = format!("{service}.service");
        let output = Self::run_tool("systemctl", &["enable", &unit])
            .map_err(InstallError::ServiceEnableFailed)?;
        if !output.status.success() {
            return Err(InstallError::ServiceEnableFailed(tool_failure(&output)));
        }
        Ok(())
    }
}
