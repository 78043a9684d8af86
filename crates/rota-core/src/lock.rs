use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// Default wait before an allocation run gives up on the ledger lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Advisory lock errors for the household ledger.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("ledger lock timed out after {waited:?} at {}", path.display())]
    Timeout { path: PathBuf, waited: Duration },
    #[error("ledger lock I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl LockError {
    /// Machine-readable code associated with this lock error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::InternalUnexpected,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// RAII guard for the household-wide exclusive lock held during an
/// allocation run or any other ledger write from the CLI.
///
/// The lock is advisory: it serializes `rota` processes, not arbitrary
/// writers to the SQLite file.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    /// Acquire an exclusive advisory lock, polling until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Timeout`] if another process holds the lock for
    /// longer than `timeout`, or [`LockError::Io`] if the lock file cannot
    /// be created.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if file.try_lock_exclusive().is_ok() {
                tracing::debug!(path = %path.display(), "acquired ledger lock");
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Explicitly release the lock. Release also happens automatically on drop.
    pub fn release(self) {
        drop(self);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
