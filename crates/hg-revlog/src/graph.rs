//! Revision graph queries over a revlog's parent links.
//!
//! The index stores each revision's parents; queries in the other
//! direction (children, heads, descendant tests) need the edges
//! reversed. The graph snapshots those reversed edges in compact sorted
//! arrays built in two passes, with no per-revision allocation.

use std::collections::BinaryHeap;

use hg_hash::NodeId;
use hg_utils::CancelCheck;

use crate::revlog::Revlog;
use crate::RevlogError;

/// How often the build loop polls the cancellation check.
const CANCEL_STRIDE: u32 = 1024;

/// Immutable child-edge snapshot of a revlog's revision graph.
///
/// Built once and valid for the revisions present at build time;
/// revisions appended later are simply absent.
pub struct RevisionGraph {
    parents: Vec<(Option<u32>, Option<u32>)>,
    /// Node identities in natural (revision) order.
    nodes: Vec<NodeId>,
    /// (node, rev) pairs sorted by node; node lookups binary-search
    /// here instead of hashing.
    sorted_nodes: Vec<(NodeId, u32)>,
    /// Offsets into `children`, one per revision plus a final end
    /// marker.
    child_offsets: Vec<u32>,
    /// Child revisions grouped by parent, ascending within each group.
    children: Vec<u32>,
}

impl RevisionGraph {
    /// Snapshot the graph of every revision currently in `revlog`.
    pub fn build(revlog: &Revlog, cancel: Option<CancelCheck<'_>>) -> Result<Self, RevlogError> {
        let mut parents = Vec::with_capacity(revlog.len() as usize);
        let mut nodes = Vec::with_capacity(revlog.len() as usize);
        for record in revlog.records() {
            if record.rev % CANCEL_STRIDE == 0 && cancel.map_or(false, |c| c()) {
                return Err(RevlogError::Cancelled);
            }
            parents.push((record.p1, record.p2));
            nodes.push(record.node);
        }
        Ok(Self::from_parts(parents, nodes))
    }

    /// Build from bare parent pairs, with synthetic node identities.
    /// Parents must precede their children, which the index parser
    /// already guarantees.
    pub fn from_parents(parents: Vec<(Option<u32>, Option<u32>)>) -> Self {
        let nodes = (0..parents.len())
            .map(|rev| {
                let mut bytes = [0u8; 20];
                bytes[16..20].copy_from_slice(&(rev as u32 + 1).to_be_bytes());
                NodeId::from_bytes(&bytes).unwrap_or(NodeId::NULL)
            })
            .collect();
        Self::from_parts(parents, nodes)
    }

    fn from_parts(parents: Vec<(Option<u32>, Option<u32>)>, nodes: Vec<NodeId>) -> Self {
        let count = parents.len();

        // Two passes: count children per revision, then place them.
        let mut child_offsets = vec![0u32; count + 1];
        for &(p1, p2) in &parents {
            for p in [p1, p2].into_iter().flatten() {
                child_offsets[p as usize + 1] += 1;
            }
        }
        for i in 1..child_offsets.len() {
            child_offsets[i] += child_offsets[i - 1];
        }

        let mut children = vec![0u32; child_offsets[count] as usize];
        let mut cursor = child_offsets.clone();
        for (rev, &(p1, p2)) in parents.iter().enumerate() {
            for p in [p1, p2].into_iter().flatten() {
                children[cursor[p as usize] as usize] = rev as u32;
                cursor[p as usize] += 1;
            }
        }
        // Children are placed in revision order, so each group is
        // already ascending.

        let mut sorted_nodes: Vec<(NodeId, u32)> = nodes
            .iter()
            .enumerate()
            .map(|(rev, n)| (*n, rev as u32))
            .collect();
        sorted_nodes.sort_unstable();

        Self {
            parents,
            nodes,
            sorted_nodes,
            child_offsets,
            children,
        }
    }

    /// Number of revisions in the snapshot.
    pub fn len(&self) -> u32 {
        self.parents.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    fn check_rev(&self, rev: u32) -> Result<(), RevlogError> {
        if (rev as usize) < self.parents.len() {
            Ok(())
        } else {
            Err(RevlogError::RevisionOutOfRange {
                rev,
                count: self.len(),
            })
        }
    }

    pub fn parents(&self, rev: u32) -> Result<(Option<u32>, Option<u32>), RevlogError> {
        self.check_rev(rev)?;
        Ok(self.parents[rev as usize])
    }

    pub fn first_parent(&self, rev: u32) -> Result<Option<u32>, RevlogError> {
        Ok(self.parents(rev)?.0)
    }

    pub fn second_parent(&self, rev: u32) -> Result<Option<u32>, RevlogError> {
        Ok(self.parents(rev)?.1)
    }

    /// Revisions naming `rev` as a parent, ascending.
    pub fn direct_children(&self, rev: u32) -> Result<&[u32], RevlogError> {
        self.check_rev(rev)?;
        let start = self.child_offsets[rev as usize] as usize;
        let end = self.child_offsets[rev as usize + 1] as usize;
        Ok(&self.children[start..end])
    }

    pub fn has_children(&self, rev: u32) -> Result<bool, RevlogError> {
        Ok(!self.direct_children(rev)?.is_empty())
    }

    /// The node identity of a revision.
    pub fn node(&self, rev: u32) -> Result<NodeId, RevlogError> {
        self.check_rev(rev)?;
        Ok(self.nodes[rev as usize])
    }

    /// Find the revision carrying `node` in the snapshot.
    pub fn rev_of_node(&self, node: &NodeId) -> Result<u32, RevlogError> {
        self.sorted_nodes
            .binary_search_by(|(n, _)| n.cmp(node))
            .map(|i| self.sorted_nodes[i].1)
            .map_err(|_| RevlogError::UnknownNode(*node))
    }

    /// Parent identities of the revision carrying `node`; absent
    /// parents come back as the null node.
    pub fn parents_of_node(&self, node: &NodeId) -> Result<(NodeId, NodeId), RevlogError> {
        let (p1, p2) = self.parents(self.rev_of_node(node)?)?;
        let resolve = |p: Option<u32>| match p {
            Some(rev) => self.nodes[rev as usize],
            None => NodeId::NULL,
        };
        Ok((resolve(p1), resolve(p2)))
    }

    /// Children of the revision carrying `node`, as node identities.
    pub fn children_of_node(&self, node: &NodeId) -> Result<Vec<NodeId>, RevlogError> {
        let revs = self.direct_children(self.rev_of_node(node)?)?;
        Ok(revs.iter().map(|&r| self.nodes[r as usize]).collect())
    }

    /// Revisions with no children, ascending.
    pub fn heads(&self) -> Vec<u32> {
        (0..self.len())
            .filter(|&rev| {
                let start = self.child_offsets[rev as usize] as usize;
                let end = self.child_offsets[rev as usize + 1] as usize;
                start == end
            })
            .collect()
    }

    /// Whether `descendant` is reachable from `ancestor` through child
    /// edges. Every revision is its own descendant.
    pub fn is_descendant(&self, ancestor: u32, descendant: u32) -> Result<bool, RevlogError> {
        self.check_rev(ancestor)?;
        self.check_rev(descendant)?;
        if descendant < ancestor {
            return Ok(false);
        }
        if descendant == ancestor {
            return Ok(true);
        }
        // Parents precede children, so one forward sweep over the
        // window suffices.
        let span = (descendant - ancestor) as usize + 1;
        let mut reachable = vec![false; span];
        reachable[0] = true;
        for rev in ancestor + 1..=descendant {
            let (p1, p2) = self.parents[rev as usize];
            let hit = [p1, p2]
                .into_iter()
                .flatten()
                .any(|p| p >= ancestor && reachable[(p - ancestor) as usize]);
            reachable[(rev - ancestor) as usize] = hit;
        }
        Ok(reachable[span - 1])
    }

    /// Iterate all ancestors of `rev`, newest first, `rev` excluded.
    pub fn ancestors(&self, rev: u32) -> Result<Ancestors<'_>, RevlogError> {
        self.check_rev(rev)?;
        let mut pending = BinaryHeap::new();
        let (p1, p2) = self.parents[rev as usize];
        pending.extend([p1, p2].into_iter().flatten());
        Ok(Ancestors {
            graph: self,
            pending,
        })
    }
}

/// Ancestor walk yielding each ancestor exactly once, newest first.
pub struct Ancestors<'a> {
    graph: &'a RevisionGraph,
    pending: BinaryHeap<u32>,
}

impl Iterator for Ancestors<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let rev = self.pending.pop()?;
        // The heap may hold duplicates when histories converge.
        while self.pending.peek() == Some(&rev) {
            self.pending.pop();
        }
        let (p1, p2) = self.graph.parents[rev as usize];
        self.pending.extend([p1, p2].into_iter().flatten());
        Some(rev)
    }
}
