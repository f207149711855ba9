//! Host platform detection.

use once_cell::sync::OnceCell;

use crate::error::InstallError;

/// Canonical `{os}-{arch}` platforms releases are published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    LinuxAmd64,
    LinuxArm64,
    DarwinAmd64,
    DarwinArm64,
}

/// Global cache for platform detection (initialized once, used everywhere)
static PLATFORM_CACHE: OnceCell<Platform> = OnceCell::new();

impl Platform {
    /// Detect the current platform (cached after first call).
    pub fn detect() -> Result<Self, InstallError> {
        PLATFORM_CACHE
            .get_or_try_init(|| Self::from_os_arch(std::env::consts::OS, std::env::consts::ARCH))
            .copied()
    }

    /// Map OS and CPU identifiers to a canonical platform.
    ///
    /// Anything outside the supported enumeration is fatal; at this point in
    /// the workflow no host state has been touched yet.
    pub fn from_os_arch(os: &str, arch: &str) -> Result<Self, InstallError> {
        match (os, arch) {
            ("linux", "x86_64") => Ok(Platform::LinuxAmd64),
            ("linux", "aarch64" | "arm64") => Ok(Platform::LinuxArm64),
            ("macos", "x86_64") => Ok(Platform::DarwinAmd64),
            ("macos", "aarch64" | "arm64") => Ok(Platform::DarwinArm64),
            (os, arch) => Err(InstallError::UnsupportedPlatform(format!("{os} {arch}"))),
        }
    }

    /// Download key used by release metadata, e.g. `linux-amd64`.
    pub fn key(&self) -> &'static str {
        match self {
            Platform::LinuxAmd64 => "linux-amd64",
            Platform::LinuxArm64 => "linux-arm64",
            Platform::DarwinAmd64 => "darwin-amd64",
            Platform::DarwinArm64 => "darwin-arm64",
        }
    }
}
