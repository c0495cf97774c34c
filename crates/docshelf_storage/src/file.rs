//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A commit log stored in one file.
///
/// `flush` hands buffered data to the OS; `sync` calls `File::sync_all`
/// so the data and the file length survive a crash.
///
/// ```no_run
/// use docshelf_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("data.log")).unwrap();
/// backend.append(b"frame").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens the file at `path`, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: RwLock::new(size),
        })
    }

    /// Like [`FileBackend::open`], creating parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or the file cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path the new contents are staged at during [`StorageBackend::replace`].
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".compact");
        self.path.with_file_name(name)
    }

    fn stage(staging: &Path, data: &[u8]) -> StorageResult<File> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(staging)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(file)
    }
}

/// Makes a rename inside the parent directory of `path` durable.
#[cfg(unix)]
fn sync_parent(path: &Path) -> StorageResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

/// NTFS journals the rename itself; directories cannot be fsynced here.
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> StorageResult<()> {
    Ok(())
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut size = self.size.write();
        if data.is_empty() {
            return Ok(*size);
        }

        let mut file = self.file.lock();
        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut size = self.size.write();
        if new_size > *size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size: *size,
            });
        }

        let file = self.file.lock();
        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let mut size = self.size.write();
        let mut file = self.file.lock();

        // A crash leaves either the old file or the new one.
        let staging = self.staging_path();
        let staged = Self::stage(&staging, data).and_then(|staged| {
            std::fs::rename(&staging, &self.path)?;
            Ok(staged)
        });
        match staged {
            Ok(staged) => {
                *file = staged;
                *size = data.len() as u64;
                sync_parent(&self.path)
            }
            Err(err) => {
                let _ = std::fs::remove_file(&staging);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert_eq!(backend.path(), path);
        assert!(path.exists());
    }

    #[test]
    fn appended_frames_read_back() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("data.log")).unwrap();

        assert_eq!(backend.append(b"first").unwrap(), 0);
        assert_eq!(backend.append(b"second").unwrap(), 5);
        assert_eq!(backend.read_at(5, 6).unwrap(), b"second");
        assert_eq!(backend.read_all().unwrap(), b"firstsecond");
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"durable").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 7);
        assert_eq!(backend.read_all().unwrap(), b"durable");
    }

    #[test]
    fn append_after_truncate_overwrites_tail() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("data.log")).unwrap();
        backend.append(b"keep").unwrap();
        backend.append(b"torn").unwrap();

        backend.truncate(4).unwrap();
        assert_eq!(backend.append(b"next").unwrap(), 4);
        assert_eq!(backend.read_all().unwrap(), b"keepnext");
    }

    #[test]
    fn replace_swaps_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.log");
        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"dead frames and live ones").unwrap();
            backend.replace(b"live").unwrap();
            assert_eq!(backend.size().unwrap(), 4);
            assert_eq!(backend.append(b"+1").unwrap(), 4);
            backend.sync().unwrap();
            assert!(!backend.staging_path().exists());
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.read_all().unwrap(), b"live+1");
    }

    #[test]
    fn read_past_end_is_rejected() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("data.log")).unwrap();
        backend.append(b"abc").unwrap();
        assert!(matches!(
            backend.read_at(1, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn open_with_create_dirs_builds_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shop").join("data.log");
        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }
}
