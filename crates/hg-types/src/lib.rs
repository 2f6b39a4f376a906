//! Structured entity types stored inside revlogs: changesets and
//! manifests, plus a string-interning pool for their repeated values.
//!
//! Everything here parses raw revision content as bytes. User names,
//! paths and messages are not guaranteed to be UTF-8, so they stay
//! `BString` and only surface as `str` on demand.

mod changeset;
pub mod intern;
mod manifest;

pub use changeset::Changeset;
pub use intern::InternPool;
pub use manifest::{Manifest, ManifestEntry, ManifestFlags};

use hg_hash::HashError;

/// Errors produced while parsing structured entities.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("invalid changeset at revision {rev}: {reason}")]
    InvalidChangeset { rev: u32, reason: String },

    #[error("invalid manifest entry at offset {offset}: {reason}")]
    InvalidManifest { offset: usize, reason: String },

    #[error(transparent)]
    Hash(#[from] HashError),
}
