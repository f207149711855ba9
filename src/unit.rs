//! Service unit rendering from a placeholder template.

use std::fs;
use std::path::Path;

use crate::error::InstallError;

/// Values substituted into the unit template.
#[derive(Debug, Clone)]
pub struct UnitParams<'a> {
    pub user: &'a str,
    pub group: &'a str,
    pub working_dir: &'a str,
    pub env_file: &'a str,
    pub exec_start: &'a str,
}

/// Read a unit template from disk.
pub fn load_template(path: &Path) -> Result<String, InstallError> {
    if !path.exists() {
        return Err(InstallError::TemplateNotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|e| {
        InstallError::System(format!("failed to read template {}: {e}", path.display()))
    })
}

/// Substitute the five placeholders.
///
/// Placeholders missing from the template are silently ignored, and values
/// are inserted verbatim with no escaping — callers must not pass values
/// containing the `@...@` delimiter syntax.
pub fn render(template: &str, params: &UnitParams<'_>) -> String {
    template
        .replace("@USER@", params.user)
        .replace("@GROUP@", params.group)
        .replace("@WORKING_DIR@", params.working_dir)
        .replace("@ENV_FILE@", params.env_file)
        .replace("@EXEC_START@", params.exec_start)
}
