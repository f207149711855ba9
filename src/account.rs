//! Service account provisioning.

use std::path::Path;

use log::info;

use crate::error::InstallError;
use crate::host::HostEnvironment;

/// Home directory mode: owner rwx, group/other rx.
const HOME_DIR_MODE: u32 = 0o755;

/// Ensure the service group, user, and home directory exist.
///
/// Idempotent: safe to call repeatedly with identical arguments. Accounts
/// that already exist are taken as-is; their primary group, home directory,
/// and shell are not reconciled against the requested values.
pub fn ensure(
    host: &dyn HostEnvironment,
    user: &str,
    group: &str,
    home_dir: &Path,
) -> Result<(), InstallError> {
    if host.group_exists(group)? {
        info!("group {group} already exists");
    } else {
        info!("creating system group {group}");
        host.create_system_group(group)?;
    }

    if host.user_exists(user)? {
        info!("service user {user} already exists");
    } else {
        info!("creating system user {user}");
        host.create_system_user(user, group, home_dir)?;
    }

    if !host.path_exists(home_dir) {
        info!("creating home directory {}", home_dir.display());
        host.ensure_directory(home_dir, HOME_DIR_MODE)?;
        host.chown(home_dir, user, group)?;
    }

    Ok(())
}
