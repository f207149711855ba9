//! Service registration with the host service manager.

use std::path::Path;

use log::info;

use crate::error::InstallError;
use crate::host::HostEnvironment;

/// Unit files are world-readable, root-writable.
const UNIT_FILE_MODE: u32 = 0o644;

/// Install the rendered unit and enable the service for start at boot.
///
/// Overwrites any prior unit file at the same path. The service is never
/// started here; starting is left to the operator.
pub fn register(
    host: &dyn HostEnvironment,
    unit_text: &str,
    service_name: &str,
    unit_dir: &Path,
    working_dir: &Path,
    user: &str,
    group: &str,
) -> Result<(), InstallError> {
    let unit_path = unit_dir.join(format!("{service_name}.service"));
    info!("writing unit file {}", unit_path.display());
    host.write_file(&unit_path, unit_text, UNIT_FILE_MODE)?;

    host.chown_recursive(working_dir, user, group)?;

    host.reload_service_manager()?;
    host.enable_service(service_name)?;
    info!("service {service_name} enabled (not started)");
    Ok(())
}
