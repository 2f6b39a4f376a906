//! Nodeid type and hash computation for the hgr Mercurial implementation.
//!
//! This crate provides the core `NodeId` type (a 20-byte SHA-1 digest
//! identifying one revision), hex encoding/decoding, and the hash rule
//! that ties a nodeid to a revision's parents and final content.

mod error;
pub mod hex;
mod nodeid;

pub use error::HashError;
pub use nodeid::{NodeId, NODE_HEX_LEN, NODE_LEN};
