//! Repository discovery and store access tying the revlog machinery
//! together: the changelog, the manifest log, and per-file logs, found
//! under `.hg/store` with the store filename encoding applied.

mod changelog;
mod error;
mod filelog;
mod manifestlog;
pub mod pathencode;
mod repo;

pub use changelog::Changelog;
pub use error::RepoError;
pub use filelog::FileLog;
pub use manifestlog::ManifestLog;
pub use repo::HgRepository;
