//! The manifest log: manifest access on top of `00manifest.i`, plus
//! the mapping between manifest and changelog revisions.

use std::path::PathBuf;

use hg_hash::NodeId;
use hg_revlog::revlog::Revlog;
use hg_types::Manifest;

use crate::RepoError;

/// Manifest-level view of the manifest revlog.
pub struct ManifestLog {
    revlog: Revlog,
}

impl ManifestLog {
    pub fn open(index_path: PathBuf) -> Result<Self, RepoError> {
        Ok(Self {
            revlog: Revlog::open(index_path)?,
        })
    }

    pub fn len(&self) -> u32 {
        self.revlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revlog.is_empty()
    }

    /// Parse the manifest stored at a manifest revision.
    pub fn manifest(&mut self, rev: u32) -> Result<Manifest, RepoError> {
        let content = self.revlog.content(rev)?;
        Ok(Manifest::parse(&content)?)
    }

    /// Parse the manifest identified by node.
    pub fn manifest_by_node(&mut self, node: &NodeId) -> Result<Manifest, RepoError> {
        let rev = self.revlog.rev_of_node(node)?;
        self.manifest(rev)
    }

    /// The changelog revision a manifest revision belongs to.
    pub fn link_rev(&self, rev: u32) -> Result<u32, RepoError> {
        Ok(self.revlog.link_rev(rev)?)
    }

    /// Find the manifest revision for a changelog revision carrying
    /// `manifest_node`.
    ///
    /// Histories written by a single writer keep the two logs in
    /// lockstep, so the same revision number is tried first; when
    /// strips or exchanges have let them diverge, the node lookup
    /// answers authoritatively.
    pub fn rev_for_changelog(
        &self,
        changelog_rev: u32,
        manifest_node: &NodeId,
    ) -> Result<u32, RepoError> {
        if changelog_rev < self.revlog.len() {
            if let Ok(node) = self.revlog.node(changelog_rev) {
                if node == *manifest_node {
                    return Ok(changelog_rev);
                }
            }
        }
        Ok(self.revlog.rev_of_node(manifest_node)?)
    }

    pub fn append(
        &mut self,
        manifest: &Manifest,
        p1: &NodeId,
        p2: &NodeId,
        link_rev: u32,
    ) -> Result<(u32, NodeId), RepoError> {
        Ok(self
            .revlog
            .append(&manifest.serialize(), p1, p2, link_rev)?)
    }

    pub fn revlog(&self) -> &Revlog {
        &self.revlog
    }

    pub fn revlog_mut(&mut self) -> &mut Revlog {
        &mut self.revlog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BString;
    use hg_types::{ManifestEntry, ManifestFlags};

    fn entry(path: &str, fill: u8) -> ManifestEntry {
        ManifestEntry {
            path: BString::from(path),
            node: NodeId::from_bytes(&[fill; 20]).unwrap(),
            flags: ManifestFlags::Regular,
        }
    }

    #[test]
    fn append_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = ManifestLog::open(dir.path().join("00manifest.i")).unwrap();

        let m0 = Manifest {
            entries: vec![entry("a.txt", 1)],
        };
        let m1 = Manifest {
            entries: vec![entry("a.txt", 1), entry("b.txt", 2)],
        };
        let (_, n0) = log.append(&m0, &NodeId::NULL, &NodeId::NULL, 0).unwrap();
        let (r1, n1) = log.append(&m1, &n0, &NodeId::NULL, 1).unwrap();

        assert_eq!(log.manifest(r1).unwrap(), m1);
        assert_eq!(log.manifest_by_node(&n0).unwrap(), m0);
        assert_eq!(log.link_rev(r1).unwrap(), 1);

        // Lockstep fast path and node fallback agree.
        assert_eq!(log.rev_for_changelog(1, &n1).unwrap(), 1);
        assert_eq!(log.rev_for_changelog(99, &n1).unwrap(), 1);
        assert_eq!(log.rev_for_changelog(0, &n1).unwrap(), 1);
    }
}
