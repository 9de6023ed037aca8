use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{AppError, Result};

/// Exclusive single-instance guard backed by an advisory file lock.
///
/// Acquisition is non-blocking: if another process holds the lock the caller
/// gets `AppError::LockHeld` and is expected to exit instead of waiting. The
/// owning pid is written into the file for diagnostics. Dropping the guard
/// releases the lock and removes the file best-effort.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive()
            .map_err(|_| AppError::LockHeld(path.to_path_buf()))?;

        file.set_len(0)?;
        let mut writer = &file;
        writer.write_all(std::process::id().to_string().as_bytes())?;
        writer.flush()?;

        tracing::info!(path = %path.display(), "acquired instance lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
        tracing::info!(path = %self.path.display(), "released instance lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.lock");

        let first = InstanceLock::acquire(&path).unwrap();
        match InstanceLock::acquire(&path) {
            Err(AppError::LockHeld(p)) => assert_eq!(p, path),
            other => panic!("expected LockHeld, got {other:?}"),
        }

        // pid of the owner is readable for diagnostics
        let pid = std::fs::read_to_string(&path).unwrap();
        assert_eq!(pid, std::process::id().to_string());

        drop(first);
        // released: a new acquire succeeds
        let _second = InstanceLock::acquire(&path).unwrap();
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/courier.lock");
        let _lock = InstanceLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
}
