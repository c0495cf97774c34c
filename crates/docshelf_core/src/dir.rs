//! Database directory management.
//!
//! ```text
//! <data_dir>/<name>/
//! ├─ LOCK        # advisory lock, one live engine per directory
//! └─ data.log    # commit log
//! ```

use crate::error::{CoreError, CoreResult};
use docshelf_storage::FileBackend;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "data.log";

/// An opened database directory.
///
/// Holds an exclusive lock on `LOCK` for as long as it lives, so a second
/// engine on the same directory, in this process or another, fails to open.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens (creating if needed) the directory for database `name` under
    /// `data_dir` and takes its lock.
    pub fn open(data_dir: &Path, name: &str) -> CoreResult<Self> {
        let path = data_dir.join(name);
        fs::create_dir_all(&path)?;
        if !path.is_dir() {
            return Err(CoreError::storage_unavailable(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::storage_unavailable(format!(
                "database locked: {}",
                path.display()
            )));
        }

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Path of the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the commit log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Opens the commit log file.
    pub fn open_log(&self) -> CoreResult<FileBackend> {
        Ok(FileBackend::open(&self.log_path())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_layout() {
        let tmp = tempdir().unwrap();
        let dir = DatabaseDir::open(tmp.path(), "app").unwrap();
        assert_eq!(dir.path(), tmp.path().join("app"));
        assert!(dir.path().join(LOCK_FILE).exists());

        dir.open_log().unwrap();
        assert!(dir.log_path().exists());
    }

    #[test]
    fn second_open_is_locked_out() {
        let tmp = tempdir().unwrap();
        let _held = DatabaseDir::open(tmp.path(), "app").unwrap();
        let err = DatabaseDir::open(tmp.path(), "app").unwrap_err();
        match err {
            CoreError::StorageUnavailable { reason } => assert!(reason.contains("locked")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lock_released_on_drop() {
        let tmp = tempdir().unwrap();
        drop(DatabaseDir::open(tmp.path(), "app").unwrap());
        assert!(DatabaseDir::open(tmp.path(), "app").is_ok());
    }

    #[test]
    fn databases_are_separate() {
        let tmp = tempdir().unwrap();
        let _a = DatabaseDir::open(tmp.path(), "a").unwrap();
        assert!(DatabaseDir::open(tmp.path(), "b").is_ok());
    }
}
