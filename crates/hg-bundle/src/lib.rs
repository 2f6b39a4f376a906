//! Bundle (changegroup) reading and writing.
//!
//! A bundle carries whole slices of history between repositories: a
//! changelog group, a manifest group, then per-file groups, each a
//! stream of length-framed chunks. Elements inside a group are
//! delta-encoded against the previous element in stream order, which
//! keeps the producer single-pass.

mod bundle;
mod chunk;
mod group;

pub use bundle::{Bundle, Compression, FileGroup};
pub use chunk::{read_chunk, write_chunk, write_terminator};
pub use group::{Group, GroupElement};

use hg_hash::{HashError, NodeId};
use hg_revlog::RevlogError;

/// Errors produced by bundle operations.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("unsupported bundle type {0:?}")]
    UnsupportedBundle(String),

    #[error("malformed bundle at byte {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("node mismatch replaying {expected}: reconstructed content hashes to {computed}")]
    NodeMismatch { expected: NodeId, computed: NodeId },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Revlog(#[from] RevlogError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
