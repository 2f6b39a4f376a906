use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{LockError, UtilError};
use crate::Result;

/// RAII advisory lock for coordinating writers across processes.
///
/// This follows Mercurial's lock protocol rather than git's rename-based
/// one: the lock is a plain file created with O_CREAT|O_EXCL whose content
/// is `hostname:pid`, so a human (or a future breaking tool) can see who
/// holds it. Acquisition polls with a timeout; the file is removed on drop.
///
/// Read paths never take this lock — it exists only to serialize appends
/// to the store from multiple processes.
#[derive(Debug)]
pub struct RepoLock {
    lock_path: PathBuf,
    released: bool,
}

/// How often to re-check a held lock while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

impl RepoLock {
    /// Acquire the lock at `path`, waiting up to `timeout` for a holder
    /// to release it.
    ///
    /// Returns `LockError::Timeout` (with the current holder's
    /// `hostname:pid` for diagnostics) if the deadline passes.
    pub fn acquire(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let lock_path = path.as_ref().to_path_buf();
        let deadline = Instant::now() + timeout;

        loop {
            match Self::try_create(&lock_path) {
                Ok(lock) => return Ok(lock),
                Err(UtilError::Lock(LockError::AlreadyLocked { path, holder })) => {
                    if Instant::now() >= deadline {
                        return Err(UtilError::Lock(LockError::Timeout {
                            path,
                            holder,
                            waited_secs: timeout.as_secs(),
                        }));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Try to acquire without waiting. Returns `Ok(None)` if held.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::try_create(path.as_ref()) {
            Ok(lock) => Ok(Some(lock)),
            Err(UtilError::Lock(LockError::AlreadyLocked { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn try_create(lock_path: &Path) -> Result<Self> {
        let attempt = OpenOptions::new()
            .write(true)
            .create_new(true) // O_CREAT|O_EXCL equivalent
            .open(lock_path);

        match attempt {
            Ok(mut file) => {
                let content = format!("{}:{}", hostname(), std::process::id());
                file.write_all(content.as_bytes()).map_err(|e| {
                    // Don't leave a half-written lock behind.
                    let _ = fs::remove_file(lock_path);
                    UtilError::Lock(LockError::Create {
                        path: lock_path.to_path_buf(),
                        source: e,
                    })
                })?;
                Ok(Self {
                    lock_path: lock_path.to_path_buf(),
                    released: false,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(UtilError::Lock(LockError::AlreadyLocked {
                    path: lock_path.to_path_buf(),
                    holder: read_holder(lock_path),
                }))
            }
            Err(e) => Err(UtilError::Lock(LockError::Create {
                path: lock_path.to_path_buf(),
                source: e,
            })),
        }
    }

    /// Get the path of the lock file.
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Release the lock explicitly (also happens on drop).
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path)?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

/// Read the `hostname:pid` content of a held lock, for error messages.
fn read_holder(lock_path: &Path) -> String {
    fs::read_to_string(lock_path)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
