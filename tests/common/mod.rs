//! In-memory host used by the provisioning tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use relayd_install::error::InstallError;
use relayd_install::host::HostEnvironment;

/// A file placed on the fake host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub bytes: Vec<u8>,
    pub mode: u32,
    pub owner: Option<(String, String)>,
}

#[derive(Debug, Default)]
pub struct HostState {
    pub groups: BTreeSet<String>,
    pub users: BTreeSet<String>,
    pub dirs: BTreeMap<PathBuf, u32>,
    pub files: BTreeMap<PathBuf, FileRecord>,
    pub owners: BTreeMap<PathBuf, (String, String)>,
    /// Ordered log of every mutation, for sequencing assertions.
    pub events: Vec<String>,
}

pub struct FakeHost {
    pub privileged: bool,
    pub state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            privileged: true,
            state: Mutex::new(HostState::default()),
        }
    }

    pub fn unprivileged() -> Self {
        Self {
            privileged: false,
            state: Mutex::new(HostState::default()),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }
}

impl HostEnvironment for FakeHost {
    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn group_exists(&self, group: &str) -> Result<bool, InstallError> {
        Ok(self.state.lock().unwrap().groups.contains(group))
    }

    fn user_exists(&self, user: &str) -> Result<bool, InstallError> {
        Ok(self.state.lock().unwrap().users.contains(user))
    }

    fn path_exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.dirs.contains_key(path) || state.files.contains_key(path)
    }

    fn create_system_group(&self, group: &str) -> Result<(), InstallError> {
        let mut state = self.state.lock().unwrap();
        state.groups.insert(group.to_string());
        state.events.push(format!("groupadd {group}"));
        Ok(())
    }

    fn create_system_user(
        &self,
        user: &str,
        group: &str,
        home: &Path,
    ) -> Result<(), InstallError> {
        let mut state = self.state.lock().unwrap();
        state.users.insert(user.to_string());
        state
            .events
            .push(format!("useradd {user} gid={group} home={}", home.display()));
        Ok(())
    }

    fn ensure_directory(&self, path: &Path, mode: u32) -> Result<(), InstallError> {
        let mut state = self.state.lock().unwrap();
        state.dirs.insert(path.to_path_buf(), mode);
        state.events.push(format!("mkdir {}", path.display()));
        Ok(())
    }

    fn install_file(
        &self,
        src: &Path,
        dest: &Path,
        mode: u32,
        user: &str,
        group: &str,
    ) -> Result<(), InstallError> {
        // The source is a real file in the step's transient workspace; keep
        // its bytes so tests can assert on the installed content.
        let bytes = std::fs::read(src).map_err(|e| {
            InstallError::System(format!("fake host cannot read {}: {e}", src.display()))
        })?;
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            dest.to_path_buf(),
            FileRecord {
                bytes,
                mode,
                owner: Some((user.to_string(), group.to_string())),
            },
        );
        state.events.push(format!("install {}", dest.display()));
        Ok(())
    }

    fn write_file(&self, path: &Path, content: &str, mode: u32) -> Result<(), InstallError> {
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            path.to_path_buf(),
            FileRecord {
                bytes: content.as_bytes().to_vec(),
                mode,
                owner: None,
            },
        );
        state.events.push(format!("write {}", path.display()));
        Ok(())
    }

    fn chown(&self, path: &Path, user: &str, group: &str) -> Result<(), InstallError> {
        let mut state = self.state.lock().unwrap();
        state
            .owners
            .insert(path.to_path_buf(), (user.to_string(), group.to_string()));
        state.events.push(format!("chown {}", path.display()));
        Ok(())
    }

    fn chown_recursive(&self, path: &Path, user: &str, group: &str) -> Result<(), InstallError> {
        let mut state = self.state.lock().unwrap();
        state
            .owners
            .insert(path.to_path_buf(), (user.to_string(), group.to_string()));
        state.events.push(format!("chown -R {}", path.display()));
        Ok(())
    }

    fn reload_service_manager(&self) -> Result<(), InstallError> {
        self.state.lock().unwrap().events.push("daemon-reload".to_string());
        Ok(())
    }

    fn enable_service(&self, service: &str) -> Result<(), InstallError> {
        self.state
            .lock()
            .unwrap()
            .events
            .push(format!("enable {service}"));
        Ok(())
    }
}
