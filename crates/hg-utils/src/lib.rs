//! Foundation utilities for the hgr Mercurial implementation.

pub mod error;
pub mod lockfile;
pub mod progress;

// Re-export core types at crate root for convenience
pub use bstr::{BStr, BString, ByteSlice, ByteVec};
pub use error::{LockError, UtilError};
pub use lockfile::RepoLock;
pub use progress::{ProgressSink, StderrProgress};

pub type Result<T> = std::result::Result<T, UtilError>;

/// External cancellation check for long-running walks.
///
/// Invoked between revisions; returning `true` asks the operation to stop
/// and surface a distinct cancelled outcome rather than an error.
pub type CancelCheck<'a> = &'a dyn Fn() -> bool;
