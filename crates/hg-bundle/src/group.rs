//! Changegroup parsing and replay.

use hg_hash::NodeId;
use hg_revlog::dataaccess::DataAccess;
use hg_revlog::delta::{self, PatchRecord};
use hg_utils::CancelCheck;

use crate::chunk::{read_chunk, write_chunk, write_terminator};
use crate::BundleError;

/// Size of the fixed header at the front of each group element.
const ELEMENT_HEADER: usize = 80;

/// One delta-carrying element of a group.
///
/// The patch payload stays raw until [`records`](Self::records) is
/// called; most consumers replay a whole group and never look at
/// individual patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupElement {
    /// Identity of the revision this element reconstructs.
    pub node: NodeId,
    pub p1: NodeId,
    pub p2: NodeId,
    /// Changelog node this revision is linked to.
    pub link_node: NodeId,
    /// Patch list in wire form, applied against the previous element.
    pub patch_data: Vec<u8>,
}

impl GroupElement {
    fn parse(chunk: Vec<u8>, offset: u64) -> Result<Self, BundleError> {
        if chunk.len() < ELEMENT_HEADER {
            return Err(BundleError::Malformed {
                offset,
                reason: format!(
                    "group element of {} bytes is shorter than its header",
                    chunk.len()
                ),
            });
        }
        let node = NodeId::from_bytes(&chunk[0..20])?;
        let p1 = NodeId::from_bytes(&chunk[20..40])?;
        let p2 = NodeId::from_bytes(&chunk[40..60])?;
        let link_node = NodeId::from_bytes(&chunk[60..80])?;
        Ok(Self {
            node,
            p1,
            p2,
            link_node,
            patch_data: chunk[ELEMENT_HEADER..].to_vec(),
        })
    }

    fn to_chunk(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ELEMENT_HEADER + self.patch_data.len());
        out.extend_from_slice(self.node.as_bytes());
        out.extend_from_slice(self.p1.as_bytes());
        out.extend_from_slice(self.p2.as_bytes());
        out.extend_from_slice(self.link_node.as_bytes());
        out.extend_from_slice(&self.patch_data);
        out
    }

    /// Materialize the patch list.
    pub fn records(&self) -> Result<Vec<PatchRecord>, BundleError> {
        Ok(PatchRecord::parse_list(&self.patch_data)?)
    }
}

/// One group: elements up to a terminator chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Group {
    pub elements: Vec<GroupElement>,
}

impl Group {
    /// Read elements until the group terminator. An immediate
    /// terminator yields an empty group.
    pub fn read(src: &mut dyn DataAccess) -> Result<Self, BundleError> {
        let mut elements = Vec::new();
        loop {
            let offset = src.position();
            match read_chunk(src)? {
                Some(chunk) => elements.push(GroupElement::parse(chunk, offset)?),
                None => return Ok(Self { elements }),
            }
        }
    }

    /// Frame every element and the terminator into `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        for element in &self.elements {
            write_chunk(out, &element.to_chunk());
        }
        write_terminator(out);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Reconstruct every element's full content.
    ///
    /// Each element's patch applies against the previous element's
    /// reconstructed content in stream order, whatever its declared
    /// parents say; the first element applies against `base` (empty for
    /// a file the receiver has never seen). Every reconstruction is
    /// hash-verified against the element's node before it is returned.
    pub fn replay(
        &self,
        base: &[u8],
        cancel: Option<CancelCheck<'_>>,
    ) -> Result<Vec<(NodeId, Vec<u8>)>, BundleError> {
        let mut out = Vec::with_capacity(self.elements.len());
        let mut previous = base.to_vec();
        for element in &self.elements {
            if cancel.map_or(false, |c| c()) {
                return Err(BundleError::Cancelled);
            }
            let records = element.records()?;
            let content = delta::apply(&previous, &records)?;
            let computed = NodeId::for_content(&element.p1, &element.p2, &content);
            if computed != element.node {
                return Err(BundleError::NodeMismatch {
                    expected: element.node,
                    computed,
                });
            }
            out.push((element.node, content.clone()));
            previous = content;
        }
        Ok(out)
    }
}
