//! The revlog proper: index plus data, reading and appending.
//!
//! A revlog is a pair of files: `name.i` holds the fixed-size index
//! entries and, while the revlog is small, the revision data inline
//! between them; once the file outgrows [`MAX_INLINE_SIZE`] the data
//! moves to a sibling `name.d` and the index becomes pure entries.
//! Revisions are immutable once written; the only mutation is appending
//! a new one at the tip.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use hg_hash::NodeId;
use hg_utils::progress::ProgressSink;
use hg_utils::CancelCheck;

use crate::cache::ContentCache;
use crate::dataaccess::{DataAccess, InflateAccess, MemoryAccess, MmapAccess, WindowAccess};
use crate::delta::{self, PatchRecord};
use crate::index::{encode_entry, parse_index, IndexEntry, RevlogHeader};
use crate::{RevlogError, ENTRY_SIZE, MAX_DELTA_CHAIN};

/// Index file size past which inline data migrates to a `.d` file.
pub const MAX_INLINE_SIZE: u64 = 128 * 1024;

/// Reconstructed content kept hot per revlog.
const CONTENT_CACHE_CAPACITY: usize = 64;

/// One revision's index metadata in caller-friendly form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionRecord {
    pub rev: u32,
    pub node: NodeId,
    pub p1: Option<u32>,
    pub p2: Option<u32>,
    pub link_rev: u32,
    pub base_rev: Option<u32>,
    pub uncompressed_len: u32,
    pub flags: u16,
}

/// An open revlog.
///
/// The index is parsed eagerly at open; revision content is
/// reconstructed on demand and cached. A missing index file is a valid
/// empty revlog, so opening never creates anything on disk.
pub struct Revlog {
    index_path: PathBuf,
    data_path: PathBuf,
    header: RevlogHeader,
    entries: Vec<IndexEntry>,
    /// (node, rev) pairs sorted by node for binary-search lookup.
    nodes: Vec<(NodeId, u32)>,
    index_map: Option<MmapAccess>,
    data_map: Option<MmapAccess>,
    cache: ContentCache,
}

impl Revlog {
    /// Open the revlog whose index lives at `index_path`.
    pub fn open(index_path: impl AsRef<Path>) -> Result<Self, RevlogError> {
        let index_path = index_path.as_ref().to_path_buf();
        let data_path = data_path_for(&index_path);

        let mut revlog = Self {
            index_path,
            data_path,
            header: RevlogHeader::new_default(),
            entries: Vec::new(),
            nodes: Vec::new(),
            index_map: None,
            data_map: None,
            cache: ContentCache::new(CONTENT_CACHE_CAPACITY),
        };
        revlog.reload()?;
        Ok(revlog)
    }

    /// Re-read index and mappings from disk. Cached content stays:
    /// existing revisions never change.
    fn reload(&mut self) -> Result<(), RevlogError> {
        if !self.index_path.exists() {
            self.header = RevlogHeader::new_default();
            self.entries.clear();
            self.nodes.clear();
            self.index_map = None;
            self.data_map = None;
            return Ok(());
        }
        let mut map = MmapAccess::open(&self.index_path)?;
        let (header, entries) = parse_index(&mut map, &self.index_path)?;
        let mut nodes: Vec<(NodeId, u32)> = entries
            .iter()
            .enumerate()
            .map(|(rev, e)| (e.node, rev as u32))
            .collect();
        nodes.sort_unstable();

        self.data_map = if header.inline() || !self.data_path.exists() {
            None
        } else {
            Some(MmapAccess::open(&self.data_path)?)
        };
        self.header = header;
        self.entries = entries;
        self.nodes = nodes;
        self.index_map = Some(map);
        Ok(())
    }

    pub fn header(&self) -> RevlogHeader {
        self.header
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Number of revisions.
    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The newest revision, if any.
    pub fn tip(&self) -> Option<(u32, NodeId)> {
        let rev = self.len().checked_sub(1)?;
        Some((rev, self.entries[rev as usize].node))
    }

    fn check_rev(&self, rev: u32) -> Result<(), RevlogError> {
        if (rev as usize) < self.entries.len() {
            Ok(())
        } else {
            Err(RevlogError::RevisionOutOfRange {
                rev,
                count: self.len(),
            })
        }
    }

    pub fn entry(&self, rev: u32) -> Result<&IndexEntry, RevlogError> {
        self.check_rev(rev)?;
        Ok(&self.entries[rev as usize])
    }

    pub fn node(&self, rev: u32) -> Result<NodeId, RevlogError> {
        Ok(self.entry(rev)?.node)
    }

    pub fn parents(&self, rev: u32) -> Result<(Option<u32>, Option<u32>), RevlogError> {
        let e = self.entry(rev)?;
        Ok((e.p1, e.p2))
    }

    /// Parent identities, with absent parents reported as the null node.
    pub fn parent_nodes(&self, rev: u32) -> Result<(NodeId, NodeId), RevlogError> {
        let (p1, p2) = self.parents(rev)?;
        Ok((self.node_or_null(p1)?, self.node_or_null(p2)?))
    }

    fn node_or_null(&self, rev: Option<u32>) -> Result<NodeId, RevlogError> {
        match rev {
            Some(r) => self.node(r),
            None => Ok(NodeId::NULL),
        }
    }

    pub fn link_rev(&self, rev: u32) -> Result<u32, RevlogError> {
        Ok(self.entry(rev)?.link_rev)
    }

    /// Find the revision carrying `node`.
    pub fn rev_of_node(&self, node: &NodeId) -> Result<u32, RevlogError> {
        self.nodes
            .binary_search_by(|(n, _)| n.cmp(node))
            .map(|i| self.nodes[i].1)
            .map_err(|_| RevlogError::UnknownNode(*node))
    }

    pub fn has_node(&self, node: &NodeId) -> bool {
        self.rev_of_node(node).is_ok()
    }

    /// Iterate the index metadata of every revision in order.
    pub fn records(&self) -> impl Iterator<Item = RevisionRecord> + '_ {
        self.entries.iter().enumerate().map(|(rev, e)| RevisionRecord {
            rev: rev as u32,
            node: e.node,
            p1: e.p1,
            p2: e.p2,
            link_rev: e.link_rev,
            base_rev: e.base_rev,
            uncompressed_len: e.uncompressed_len,
            flags: e.flags,
        })
    }

    fn corrupt(&self, rev: Option<u32>, reason: impl Into<String>) -> RevlogError {
        RevlogError::Corrupt {
            file: self.index_path.clone(),
            rev,
            reason: reason.into(),
        }
    }

    /// Raw stored bytes of one revision's chunk, compression marker
    /// included.
    fn raw_chunk(&self, rev: u32) -> Result<Vec<u8>, RevlogError> {
        let entry = &self.entries[rev as usize];
        if entry.compressed_len == 0 {
            return Ok(Vec::new());
        }
        let (source, offset): (Box<dyn DataAccess>, u64) = if self.header.inline() {
            let map = self
                .index_map
                .as_ref()
                .ok_or_else(|| self.corrupt(Some(rev), "index file missing"))?;
            // Inline chunks sit right after their own entry, so the
            // physical position is the entries consumed so far plus the
            // virtual data offset.
            let physical = ENTRY_SIZE as u64 * (rev as u64 + 1) + entry.data_offset;
            (Box::new(map.share()), physical)
        } else {
            let map = self
                .data_map
                .as_ref()
                .ok_or_else(|| self.corrupt(Some(rev), "data file missing"))?;
            (Box::new(map.share()), entry.data_offset)
        };
        let mut window = WindowAccess::new(source, offset, entry.compressed_len as u64)
            .map_err(|_| self.corrupt(Some(rev), "chunk extends past end of data"))?;
        Ok(window.read_to_end()?)
    }

    /// The decompressed chunk: a full snapshot or a patch list,
    /// depending on the entry's base.
    pub fn chunk(&self, rev: u32) -> Result<Vec<u8>, RevlogError> {
        self.check_rev(rev)?;
        let raw = self.raw_chunk(rev)?;
        match raw.first() {
            // Empty chunks and NUL-led chunks are stored verbatim.
            None | Some(&0) => Ok(raw),
            Some(&b'u') => Ok(raw[1..].to_vec()),
            Some(&b'x') => {
                let mut inflater = InflateAccess::new(Box::new(MemoryAccess::new(raw)));
                inflater
                    .read_to_end()
                    .map_err(|e| self.corrupt(Some(rev), format!("zlib chunk: {e}")))
            }
            Some(&marker) => Err(RevlogError::UnsupportedCompression(marker)),
        }
    }

    /// Reconstruct the full content of a revision.
    ///
    /// Walks the base chain down to a snapshot (or a cached ancestor),
    /// then replays each delta upward. The result is length-checked
    /// against the index before being cached and returned.
    pub fn content(&mut self, rev: u32) -> Result<Arc<Vec<u8>>, RevlogError> {
        self.check_rev(rev)?;
        if let Some(hit) = self.cache.get(rev) {
            return Ok(hit);
        }

        // Chain from rev down toward its snapshot, newest first. With
        // general-delta bases each link names the revision it patches;
        // in the classic layout every member's base field names the
        // chain's snapshot and each delta applies against its storage
        // predecessor.
        let general_delta = self.header.general_delta();
        let mut chain = vec![rev];
        let mut start: Option<Arc<Vec<u8>>> = None;
        let mut cur = rev;
        loop {
            let prev = match self.entries[cur as usize].base_rev {
                // Bases pointing at the revision itself (or absent)
                // mark a snapshot.
                Some(base) if base < cur => {
                    if general_delta {
                        base
                    } else {
                        cur - 1
                    }
                }
                _ => break,
            };
            if chain.len() >= MAX_DELTA_CHAIN {
                return Err(self.corrupt(
                    Some(rev),
                    format!("delta chain longer than {MAX_DELTA_CHAIN}"),
                ));
            }
            if let Some(hit) = self.cache.get(prev) {
                start = Some(hit);
                break;
            }
            chain.push(prev);
            cur = prev;
        }
        chain.reverse();

        let (mut current, deltas): (Vec<u8>, &[u32]) = match &start {
            Some(cached) => (cached.as_ref().clone(), &chain[..]),
            None => (self.chunk(chain[0])?, &chain[1..]),
        };
        for &delta_rev in deltas {
            let raw = self.chunk(delta_rev)?;
            let records = PatchRecord::parse_list(&raw)?;
            current = delta::apply(&current, &records)?;
        }

        let expect = self.entries[rev as usize].uncompressed_len;
        if current.len() as u64 != expect as u64 {
            return Err(self.corrupt(
                Some(rev),
                format!(
                    "reconstructed {} bytes, index promises {expect}",
                    current.len()
                ),
            ));
        }
        let content = Arc::new(current);
        self.cache.insert(rev, Arc::clone(&content));
        Ok(content)
    }

    /// Stream one revision's content into `sink`.
    pub fn write_content(&mut self, rev: u32, sink: &mut dyn io::Write) -> Result<(), RevlogError> {
        let content = self.content(rev)?;
        sink.write_all(&content)?;
        Ok(())
    }

    /// Iterate reconstructed content over a revision range.
    ///
    /// Errors end the iteration; a true answer from `cancel` yields
    /// [`RevlogError::Cancelled`] and stops.
    pub fn contents<'a, 'c>(
        &'a mut self,
        range: Range<u32>,
        cancel: Option<CancelCheck<'c>>,
    ) -> Contents<'a, 'c> {
        Contents {
            revlog: self,
            range,
            cancel,
            finished: false,
        }
    }

    /// Recompute a revision's identity hash and compare it to the index.
    pub fn verify_node(&mut self, rev: u32) -> Result<(), RevlogError> {
        let (p1, p2) = self.parent_nodes(rev)?;
        let stored = self.entries[rev as usize].node;
        let content = self.content(rev)?;
        let computed = NodeId::for_content(&p1, &p2, &content);
        if computed == stored {
            Ok(())
        } else {
            Err(RevlogError::NodeMismatch {
                rev,
                computed,
                stored,
            })
        }
    }

    /// Verify every revision's hash, oldest first.
    pub fn verify(
        &mut self,
        cancel: Option<CancelCheck<'_>>,
        mut progress: Option<&mut dyn ProgressSink>,
    ) -> Result<(), RevlogError> {
        let total = self.len() as u64;
        for rev in 0..self.len() {
            if cancel.map_or(false, |c| c()) {
                return Err(RevlogError::Cancelled);
            }
            self.verify_node(rev)?;
            if let Some(sink) = progress.as_deref_mut() {
                sink.update(rev as u64 + 1, Some(total));
            }
        }
        if let Some(sink) = progress {
            sink.finish();
        }
        Ok(())
    }

    /// Length of the delta chain a revision sits on.
    fn chain_length(&self, rev: u32) -> usize {
        if !self.header.general_delta() {
            // Classic chains run contiguously from the snapshot named
            // in the base field up to the revision.
            let base = match self.entries[rev as usize].base_rev {
                Some(b) if b <= rev => b,
                _ => rev,
            };
            return (rev - base) as usize + 1;
        }
        let mut len = 1;
        let mut cur = rev;
        while let Some(base) = self.entries[cur as usize].base_rev {
            if base >= cur || len >= MAX_DELTA_CHAIN {
                break;
            }
            len += 1;
            cur = base;
        }
        len
    }

    fn resolve_parent(&self, node: &NodeId) -> Result<Option<u32>, RevlogError> {
        if node.is_null() {
            Ok(None)
        } else {
            Ok(Some(self.rev_of_node(node)?))
        }
    }

    /// Append a new revision at the tip.
    ///
    /// Parents are given by node, the null node meaning "no parent".
    /// Appending content that already exists under the same parents is
    /// a no-op returning the existing revision. Returns the new
    /// revision number and its node.
    pub fn append(
        &mut self,
        content: &[u8],
        p1: &NodeId,
        p2: &NodeId,
        link_rev: u32,
    ) -> Result<(u32, NodeId), RevlogError> {
        let node = NodeId::for_content(p1, p2, content);
        if let Ok(existing) = self.rev_of_node(&node) {
            return Ok((existing, node));
        }
        let p1_rev = self.resolve_parent(p1)?;
        let p2_rev = self.resolve_parent(p2)?;
        let rev = self.len();

        // Store a delta when it is smaller than a snapshot and the
        // chain stays bounded. General-delta revlogs delta against the
        // first parent and record it as the base; the classic layout
        // deltas against the storage predecessor and records the
        // chain's snapshot in the base field.
        let general_delta = self.header.general_delta();
        let delta_parent = if general_delta {
            p1_rev
        } else {
            rev.checked_sub(1)
        };
        let (stored, base_rev) = match delta_parent {
            Some(prev)
                if !content.is_empty() && self.chain_length(prev) < MAX_DELTA_CHAIN - 1 =>
            {
                let base_content = self.content(prev)?;
                let patch = delta::diff(&base_content, content);
                let wire = PatchRecord::serialize_list(&patch);
                if wire.len() < content.len() {
                    let base = if general_delta {
                        prev
                    } else {
                        self.entries[prev as usize].base_rev.unwrap_or(prev)
                    };
                    (wire, base)
                } else {
                    (content.to_vec(), rev)
                }
            }
            _ => (content.to_vec(), rev),
        };
        let chunk = compress_chunk(&stored)?;

        let data_offset = match self.entries.last() {
            Some(prev) => prev.data_offset + prev.compressed_len as u64,
            None => 0,
        };
        let entry = IndexEntry {
            data_offset,
            flags: 0,
            compressed_len: chunk.len() as u32,
            uncompressed_len: content.len() as u32,
            base_rev: Some(base_rev),
            link_rev,
            p1: p1_rev,
            p2: p2_rev,
            node,
        };

        if self.header.inline() {
            let index_size = self.index_size_on_disk();
            let grown = index_size + ENTRY_SIZE as u64 + chunk.len() as u64;
            if grown > MAX_INLINE_SIZE {
                self.migrate_to_external()?;
            }
        }

        let entry_bytes = encode_entry(&entry, rev, self.header);
        if self.header.inline() {
            let mut record = Vec::with_capacity(ENTRY_SIZE + chunk.len());
            record.extend_from_slice(&entry_bytes);
            record.extend_from_slice(&chunk);
            append_file(&self.index_path, &record)?;
        } else {
            append_file(&self.data_path, &chunk)?;
            append_file(&self.index_path, &entry_bytes)?;
        }

        self.entries.push(entry);
        let slot = self
            .nodes
            .binary_search_by(|(n, _)| n.cmp(&node))
            .unwrap_or_else(|i| i);
        self.nodes.insert(slot, (node, rev));
        self.remap()?;
        self.cache.insert(rev, Arc::new(content.to_vec()));
        Ok((rev, node))
    }

    fn index_size_on_disk(&self) -> u64 {
        self.entries.iter().fold(0, |acc, e| {
            acc + ENTRY_SIZE as u64
                + if self.header.inline() {
                    e.compressed_len as u64
                } else {
                    0
                }
        })
    }

    /// Move inline data chunks out to the `.d` file and rewrite the
    /// index without the inline bit.
    fn migrate_to_external(&mut self) -> Result<(), RevlogError> {
        let mut chunks = Vec::with_capacity(self.entries.len());
        for rev in 0..self.len() {
            chunks.push(self.raw_chunk(rev)?);
        }

        let new_header = self.header.without_inline();
        let mut index_bytes = Vec::with_capacity(self.entries.len() * ENTRY_SIZE);
        let mut data_bytes = Vec::new();
        for (rev, (entry, chunk)) in self.entries.iter().zip(&chunks).enumerate() {
            index_bytes.extend_from_slice(&encode_entry(entry, rev as u32, new_header));
            data_bytes.extend_from_slice(chunk);
        }

        // Data lands first so a crash between the two writes leaves the
        // old inline index intact and self-contained.
        std::fs::write(&self.data_path, &data_bytes)?;
        std::fs::write(&self.index_path, &index_bytes)?;
        self.header = new_header;
        self.remap()
    }

    /// Refresh the memory maps after the files changed size.
    fn remap(&mut self) -> Result<(), RevlogError> {
        self.index_map = Some(MmapAccess::open(&self.index_path)?);
        self.data_map = if self.header.inline() {
            None
        } else {
            Some(MmapAccess::open(&self.data_path)?)
        };
        Ok(())
    }
}

/// Iterator over reconstructed revision content, created by
/// [`Revlog::contents`].
pub struct Contents<'a, 'c> {
    revlog: &'a mut Revlog,
    range: Range<u32>,
    cancel: Option<CancelCheck<'c>>,
    finished: bool,
}

impl Iterator for Contents<'_, '_> {
    type Item = Result<(u32, Arc<Vec<u8>>), RevlogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let rev = self.range.next()?;
        if self.cancel.map_or(false, |c| c()) {
            self.finished = true;
            return Some(Err(RevlogError::Cancelled));
        }
        match self.revlog.content(rev) {
            Ok(content) => Some(Ok((rev, content))),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn data_path_for(index_path: &Path) -> PathBuf {
    index_path.with_extension("d")
}

/// Compress a chunk for storage, choosing whichever of zlib and the
/// stored form is smaller. Zlib output self-identifies through its
/// leading `x` byte; stored chunks get a `u` marker.
fn compress_chunk(data: &[u8]) -> io::Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    if compressed.len() < data.len() {
        Ok(compressed)
    } else {
        let mut stored = Vec::with_capacity(data.len() + 1);
        stored.push(b'u');
        stored.extend_from_slice(data);
        Ok(stored)
    }
}

fn append_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)
}
