//! Revlog reading and writing for the hgr Mercurial implementation.
//!
//! A revlog is the append-only, delta-compressed, content-addressed
//! structure Mercurial uses for every versioned entity stream: the
//! changelog, the manifest, and each file's history. This crate
//! implements the binary index/data codec, delta chain reconstruction,
//! the patch engine, and revision-graph queries on top of a pluggable
//! data-access abstraction.

pub mod cache;
pub mod dataaccess;
pub mod delta;
pub mod graph;
pub mod index;
pub mod revlog;

use std::path::PathBuf;

use hg_hash::{HashError, NodeId};

pub use cache::ContentCache;
pub use delta::PatchRecord;
pub use graph::RevisionGraph;
pub use index::{IndexEntry, RevlogHeader};
pub use revlog::{Contents, Revlog, RevisionRecord, MAX_INLINE_SIZE};

/// Errors that can occur during revlog operations.
///
/// The variants fall into four camps callers are expected to tell apart:
/// caller-input errors (`RevisionOutOfRange`, `UnknownNode`) are
/// recoverable by adjusting the request; corruption errors (`Corrupt`,
/// `InvalidPatch`, `NodeMismatch`) mean the on-disk files are damaged;
/// `Unsupported*` means the format was recognized but not implemented;
/// and `Cancelled` is a voluntary early stop, not a fault.
#[derive(Debug, thiserror::Error)]
pub enum RevlogError {
    #[error("revision {rev} out of range (revlog has {count} revisions)")]
    RevisionOutOfRange { rev: u32, count: u32 },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("corrupt revlog '{file}'{}: {reason}", fmt_rev(.rev))]
    Corrupt {
        file: PathBuf,
        rev: Option<u32>,
        reason: String,
    },

    #[error("invalid patch at offset {offset}: {reason}")]
    InvalidPatch {
        /// Byte offset of the offending record in the patch wire data.
        offset: usize,
        reason: String,
    },

    #[error("node mismatch for revision {rev}: computed {computed}, index has {stored}")]
    NodeMismatch {
        rev: u32,
        computed: NodeId,
        stored: NodeId,
    },

    #[error("unsupported revlog version {0}")]
    UnsupportedVersion(u16),

    #[error("unsupported compression marker {0:#04x}")]
    UnsupportedCompression(u8),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn fmt_rev(rev: &Option<u32>) -> String {
    match rev {
        Some(r) => format!(", revision {r}"),
        None => String::new(),
    }
}

/// Size of one index entry in the RevlogNG format.
pub const ENTRY_SIZE: usize = 64;

/// Sentinel for "no revision" in on-disk parent/base fields.
pub const NULL_REV: u32 = !0;

/// Feature bit: revision data is stored inline after each index entry.
pub const FEATURE_INLINE: u16 = 1 << 0;

/// Feature bit: delta bases are arbitrary revisions, not storage
/// predecessors.
pub const FEATURE_GENERAL_DELTA: u16 = 1 << 1;

/// The only revlog version this crate reads and writes (RevlogNG).
pub const REVLOG_VERSION: u16 = 1;

/// Maximum delta chain length before we assume a corrupt base pointer
/// loop and bail out.
pub const MAX_DELTA_CHAIN: usize = 1000;
