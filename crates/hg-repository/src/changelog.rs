//! The changelog: changeset access on top of the `00changelog.i`
//! revlog.

use std::ops::Range;
use std::path::PathBuf;

use hg_hash::NodeId;
use hg_revlog::revlog::Revlog;
use hg_types::{Changeset, InternPool};
use hg_utils::CancelCheck;

use crate::RepoError;

/// Changeset-level view of the changelog revlog.
pub struct Changelog {
    revlog: Revlog,
    /// Author strings repeat heavily across a history; parsed users are
    /// interned so repeated values share storage.
    users: InternPool,
}

impl Changelog {
    pub fn open(index_path: PathBuf) -> Result<Self, RepoError> {
        Ok(Self {
            revlog: Revlog::open(index_path)?,
            users: InternPool::new(),
        })
    }

    pub fn len(&self) -> u32 {
        self.revlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revlog.is_empty()
    }

    pub fn tip(&self) -> Option<(u32, NodeId)> {
        self.revlog.tip()
    }

    pub fn node(&self, rev: u32) -> Result<NodeId, RepoError> {
        Ok(self.revlog.node(rev)?)
    }

    pub fn rev_of_node(&self, node: &NodeId) -> Result<u32, RepoError> {
        Ok(self.revlog.rev_of_node(node)?)
    }

    /// Parse one changeset.
    pub fn changeset(&mut self, rev: u32) -> Result<Changeset, RepoError> {
        let content = self.revlog.content(rev)?;
        let changeset = Changeset::parse(&content, rev)?;
        self.users.intern(&changeset.user);
        Ok(changeset)
    }

    /// Number of distinct authors seen by this instance so far.
    pub fn distinct_users(&self) -> usize {
        self.users.len()
    }

    /// Iterate parsed changesets over a revision range, oldest first.
    pub fn changesets<'a, 'c>(
        &'a mut self,
        range: Range<u32>,
        cancel: Option<CancelCheck<'c>>,
    ) -> Changesets<'a, 'c> {
        Changesets {
            log: self,
            range,
            cancel,
            finished: false,
        }
    }

    /// Append a serialized changeset. Exposed for mirroring history
    /// from bundles; authoring new commits is a caller concern.
    pub fn append(
        &mut self,
        changeset: &Changeset,
        p1: &NodeId,
        p2: &NodeId,
    ) -> Result<(u32, NodeId), RepoError> {
        let link_rev = self.revlog.len();
        Ok(self
            .revlog
            .append(&changeset.serialize(), p1, p2, link_rev)?)
    }

    pub fn revlog(&self) -> &Revlog {
        &self.revlog
    }

    pub fn revlog_mut(&mut self) -> &mut Revlog {
        &mut self.revlog
    }
}

/// Iterator created by [`Changelog::changesets`].
pub struct Changesets<'a, 'c> {
    log: &'a mut Changelog,
    range: Range<u32>,
    cancel: Option<CancelCheck<'c>>,
    finished: bool,
}

impl Iterator for Changesets<'_, '_> {
    type Item = Result<(u32, Changeset), RepoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let rev = self.range.next()?;
        if self.cancel.map_or(false, |c| c()) {
            self.finished = true;
            return Some(Err(hg_revlog::RevlogError::Cancelled.into()));
        }
        match self.log.changeset(rev) {
            Ok(cs) => Some(Ok((rev, cs))),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BString;

    fn sample_changeset(i: u32, manifest: NodeId) -> Changeset {
        Changeset {
            manifest,
            user: BString::from("dev <dev@example.com>"),
            timestamp: 1_700_000_000 + i as i64,
            tz_offset: 0,
            extras: Vec::new(),
            files: vec![BString::from("a.txt")],
            message: BString::from(format!("change {i}")),
        }
    }

    fn open_temp() -> (tempfile::TempDir, Changelog) {
        let dir = tempfile::tempdir().unwrap();
        let log = Changelog::open(dir.path().join("00changelog.i")).unwrap();
        (dir, log)
    }

    #[test]
    fn append_and_parse_back() {
        let (_dir, mut log) = open_temp();
        let manifest = NodeId::from_bytes(&[1u8; 20]).unwrap();
        let cs = sample_changeset(0, manifest);
        let (rev, node) = log.append(&cs, &NodeId::NULL, &NodeId::NULL).unwrap();
        assert_eq!(rev, 0);
        assert_eq!(log.tip().unwrap(), (0, node));
        let parsed = log.changeset(0).unwrap();
        assert_eq!(parsed, cs);
        assert_eq!(parsed.branch(), "default");
    }

    #[test]
    fn users_are_interned_once() {
        let (_dir, mut log) = open_temp();
        let manifest = NodeId::from_bytes(&[1u8; 20]).unwrap();
        let mut parent = NodeId::NULL;
        for i in 0..5 {
            let (_, node) = log
                .append(&sample_changeset(i, manifest), &parent, &NodeId::NULL)
                .unwrap();
            parent = node;
        }
        for rev in 0..5 {
            log.changeset(rev).unwrap();
        }
        assert_eq!(log.distinct_users(), 1);
    }

    #[test]
    fn range_iteration_and_cancel() {
        let (_dir, mut log) = open_temp();
        let manifest = NodeId::from_bytes(&[1u8; 20]).unwrap();
        let mut parent = NodeId::NULL;
        for i in 0..4 {
            let (_, node) = log
                .append(&sample_changeset(i, manifest), &parent, &NodeId::NULL)
                .unwrap();
            parent = node;
        }

        let collected: Vec<_> = log.changesets(1..3, None).map(|r| r.unwrap()).collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].0, 1);
        assert_eq!(collected[1].1.message, "change 2");

        let cancel = || true;
        let mut iter = log.changesets(0..4, Some(&cancel));
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }
}
