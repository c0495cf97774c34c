//! Crash simulation for docshelf.
//!
//! Two ways to leave a commit log the way a crash would:
//!
//! 1. [`CrashableBackend`] wraps a backend and dies part-way through a
//!    write, keeping only a prefix of the frame.
//! 2. The file helpers damage a closed database's `data.log` directly.
//!
//! ## Usage
//!
//! ```rust
//! use docshelf_storage::InMemoryBackend;
//! use docshelf_testkit::crash::CrashableBackend;
//!
//! let shared = InMemoryBackend::new();
//! let backend = CrashableBackend::new(Box::new(shared.clone()));
//! let switch = backend.switch();
//! switch.crash_after(16);
//! // hand `backend` to an engine; the write crossing byte 16 is torn
//! ```

use docshelf_storage::{StorageBackend, StorageError, StorageResult};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct CrashState {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_sync: AtomicBool,
}

/// Remote control for a [`CrashableBackend`] that an engine owns.
#[derive(Debug, Clone)]
pub struct CrashSwitch {
    state: Arc<CrashState>,
}

impl CrashSwitch {
    /// Crash once this many more bytes have been written.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.state.bytes_written.load(Ordering::SeqCst);
        self.state
            .crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Sets whether flush and sync fail. A failing sync does not crash the
    /// backend: the writer can still cut back what it appended.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.state.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Returns whether the backend has crashed.
    pub fn has_crashed(&self) -> bool {
        self.state.crashed.load(Ordering::SeqCst)
    }
}

/// A storage backend wrapper that can simulate crashes.
///
/// After a crash every operation fails, as if the process had died.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    state: Arc<CrashState>,
}

impl CrashableBackend {
    /// Creates a new crashable backend wrapping an inner backend.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            state: Arc::new(CrashState {
                crash_after_bytes: AtomicUsize::new(usize::MAX),
                bytes_written: AtomicUsize::new(0),
                crashed: AtomicBool::new(false),
                fail_on_sync: AtomicBool::new(false),
            }),
        }
    }

    /// A handle that stays usable after the backend is boxed away.
    pub fn switch(&self) -> CrashSwitch {
        CrashSwitch {
            state: Arc::clone(&self.state),
        }
    }

    fn check_alive(&self) -> StorageResult<()> {
        if self.state.crashed.load(Ordering::SeqCst) {
            return Err(simulated("backend crashed earlier"));
        }
        Ok(())
    }

    fn check_sync(&self) -> StorageResult<()> {
        self.check_alive()?;
        if self.state.fail_on_sync.load(Ordering::SeqCst) {
            return Err(simulated("simulated sync failure"));
        }
        Ok(())
    }
}

fn simulated(message: &str) -> StorageError {
    StorageError::Io(std::io::Error::other(message.to_string()))
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.check_alive()?;
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        self.check_alive()?;
        let current = self.state.bytes_written.fetch_add(bytes.len(), Ordering::SeqCst);
        let threshold = self.state.crash_after_bytes.load(Ordering::SeqCst);

        if current + bytes.len() > threshold {
            self.state.crashed.store(true, Ordering::SeqCst);
            let partial = threshold.saturating_sub(current);
            if partial > 0 {
                self.inner.append(&bytes[..partial])?;
            }
            return Err(simulated("simulated crash during write"));
        }

        self.inner.append(bytes)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.check_sync()?;
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.check_alive()?;
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.check_sync()?;
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.check_alive()?;
        self.inner.truncate(new_size)
    }

    /// A crash or sync failure while staging the new contents leaves the
    /// old ones in place, as a staged rename would.
    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        self.check_sync()?;
        let current = self.state.bytes_written.fetch_add(bytes.len(), Ordering::SeqCst);
        let threshold = self.state.crash_after_bytes.load(Ordering::SeqCst);
        if current + bytes.len() > threshold {
            self.state.crashed.store(true, Ordering::SeqCst);
            return Err(simulated("simulated crash during replace"));
        }
        self.inner.replace(bytes)
    }
}

/// Appends raw bytes to the end of a file.
pub fn append_garbage(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Cuts `n` bytes off the end of a file.
pub fn chop_tail(path: &Path, n: u64) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    file.set_len(len.saturating_sub(n))?;
    file.sync_all()
}

/// Flips every bit of the byte at `offset`.
pub fn flip_byte(path: &Path, offset: u64) -> std::io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut byte)?;
    byte[0] = !byte[0];
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&byte)?;
    file.sync_all()
}

/// Size of a file in bytes.
pub fn file_len(path: &Path) -> std::io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}
