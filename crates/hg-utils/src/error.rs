use std::path::PathBuf;

/// Base error type for hg-utils operations.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error("lock file error: {0}")]
    Lock(#[from] LockError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Lock file specific errors.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("repository locked by {holder} (lock file '{path}')")]
    AlreadyLocked { path: PathBuf, holder: String },

    #[error("timed out after {waited_secs}s waiting for lock '{path}' held by {holder}")]
    Timeout {
        path: PathBuf,
        holder: String,
        waited_secs: u64,
    },

    #[error("unable to create lock file '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
