//! Per-file history: one revlog per tracked path under `store/data`.

use std::path::PathBuf;
use std::sync::Arc;

use bstr::BString;
use hg_hash::NodeId;
use hg_revlog::revlog::Revlog;

use crate::RepoError;

/// The revision history of a single tracked file.
pub struct FileLog {
    revlog: Revlog,
    tracked_path: BString,
}

impl FileLog {
    pub fn open(index_path: PathBuf, tracked_path: &[u8]) -> Result<Self, RepoError> {
        Ok(Self {
            revlog: Revlog::open(index_path)?,
            tracked_path: BString::from(tracked_path),
        })
    }

    /// The tracked path this log records, as stored in manifests.
    pub fn tracked_path(&self) -> &BString {
        &self.tracked_path
    }

    pub fn len(&self) -> u32 {
        self.revlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revlog.is_empty()
    }

    /// File content at a file revision.
    pub fn content(&mut self, rev: u32) -> Result<Arc<Vec<u8>>, RepoError> {
        Ok(self.revlog.content(rev)?)
    }

    /// File content for the node a manifest recorded.
    pub fn content_by_node(&mut self, node: &NodeId) -> Result<Arc<Vec<u8>>, RepoError> {
        let rev = self.revlog.rev_of_node(node)?;
        self.content(rev)
    }

    /// The changelog revision that introduced a file revision.
    pub fn link_rev(&self, rev: u32) -> Result<u32, RepoError> {
        Ok(self.revlog.link_rev(rev)?)
    }

    pub fn append(
        &mut self,
        content: &[u8],
        p1: &NodeId,
        p2: &NodeId,
        link_rev: u32,
    ) -> Result<(u32, NodeId), RepoError> {
        Ok(self.revlog.append(content, p1, p2, link_rev)?)
    }

    pub fn revlog(&self) -> &Revlog {
        &self.revlog
    }

    pub fn revlog_mut(&mut self) -> &mut Revlog {
        &mut self.revlog
    }
}
