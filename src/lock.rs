use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;

pub const LOCK_FILE: &str = "assistant.lock";

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Assistant is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("Lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Single-instance guard; the lock file holds our PID and is removed on drop
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
}

impl InstanceLock {
    pub fn acquire(dir: &Path) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE);
        let pid = std::process::id();
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        if let Ok(content) = fs::read_to_string(&path) {
            match content.trim().parse::<u32>() {
                Ok(owner) if owner != pid && process_alive(owner) => {
                    return Err(LockError::AlreadyRunning(owner));
                }
                Ok(owner) => log::warn!("⚠️ Removing stale lock left by pid {}", owner),
                Err(_) => log::warn!("⚠️ Removing unreadable lock file {}", path.display()),
            }
        }

        fs::create_dir_all(dir).map_err(io_err)?;
        fs::write(&path, pid.to_string()).map_err(io_err)?;
        log::debug!("🔒 Instance lock acquired: {}", path.display());

        Ok(Self { path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("🔓 Instance lock released"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::error!("❌ Failed to remove lock file {}: {}", self.path.display(), e),
        }
    }
}

pub fn process_alive(pid: u32) -> bool {
    let mut sys = System::new();
    let pid = Pid::from_u32(pid);
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let path = {
            let lock = InstanceLock::acquire(dir.path()).unwrap();
            assert_eq!(lock.pid(), std::process::id());
            assert_eq!(
                fs::read_to_string(lock.path()).unwrap(),
                std::process::id().to_string()
            );
            lock.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test_log::test]
    fn test_stale_lock_is_replaced() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOCK_FILE), "not a pid").unwrap();
        let lock = InstanceLock::acquire(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(lock.path()).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn test_live_owner_blocks_start() {
        let mut child = std::process::Command::new("sleep").arg("5").spawn().unwrap();
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOCK_FILE), child.id().to_string()).unwrap();

        let result = InstanceLock::acquire(dir.path());
        child.kill().unwrap();
        child.wait().unwrap();

        assert!(matches!(result, Err(LockError::AlreadyRunning(pid)) if pid == child.id()));
        // Refused start leaves the other instance's lock in place
        assert!(dir.path().join(LOCK_FILE).exists());
    }
}
