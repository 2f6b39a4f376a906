//! RevlogNG index parsing.
//!
//! The index is a sequence of fixed 64-byte entries, one per revision.
//! Entry 0 is special: its first four bytes double as the revlog header
//! (big-endian feature bits, then the version number), and its data
//! offset is implicitly zero. When the INLINE feature is set, each
//! revision's data chunk follows its index entry in the same file
//! instead of living in a sibling `.d` file.

use std::path::Path;

use hg_hash::NodeId;

use crate::dataaccess::DataAccess;
use crate::{
    RevlogError, ENTRY_SIZE, FEATURE_GENERAL_DELTA, FEATURE_INLINE, NULL_REV, REVLOG_VERSION,
};

/// Parsed revlog header (entry 0's leading four bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevlogHeader {
    pub version: u16,
    features: u16,
}

impl RevlogHeader {
    /// Header written for freshly created revlogs: version 1, inline
    /// data, general-delta bases.
    pub fn new_default() -> Self {
        Self {
            version: REVLOG_VERSION,
            features: FEATURE_INLINE | FEATURE_GENERAL_DELTA,
        }
    }

    pub fn from_bits(features: u16, version: u16) -> Result<Self, RevlogError> {
        if version != REVLOG_VERSION {
            return Err(RevlogError::UnsupportedVersion(version));
        }
        Ok(Self { version, features })
    }

    /// Whether revision data is appended after each index entry.
    ///
    /// Detected once from entry 0 and applied to every subsequent read;
    /// a revlog never mixes inline and external storage.
    pub fn inline(&self) -> bool {
        self.features & FEATURE_INLINE != 0
    }

    pub fn general_delta(&self) -> bool {
        self.features & FEATURE_GENERAL_DELTA != 0
    }

    pub fn feature_bits(&self) -> u16 {
        self.features
    }

    /// Drop the inline bit (used when data migrates to a `.d` file).
    pub fn without_inline(self) -> Self {
        Self {
            version: self.version,
            features: self.features & !FEATURE_INLINE,
        }
    }
}

/// One parsed 64-byte index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset of this revision's chunk in the data stream
    /// (virtual: inline storage still counts only data bytes).
    pub data_offset: u64,
    /// Per-revision flag bits (censored, external storage, ...).
    pub flags: u16,
    /// Stored (possibly compressed) chunk size.
    pub compressed_len: u32,
    /// Size of the final reconstructed content.
    pub uncompressed_len: u32,
    /// Revision this chunk's delta applies against; `None` when the
    /// chunk is a full snapshot.
    pub base_rev: Option<u32>,
    /// Cross-revlog link (e.g. the changelog revision that introduced a
    /// file revision).
    pub link_rev: u32,
    pub p1: Option<u32>,
    pub p2: Option<u32>,
    pub node: NodeId,
}

impl IndexEntry {
    /// Whether this revision's stored bytes are a full snapshot rather
    /// than a delta.
    pub fn is_snapshot(&self, rev: u32) -> bool {
        match self.base_rev {
            None => true,
            Some(base) => base == rev,
        }
    }
}

fn read_u48_be(src: &mut dyn DataAccess) -> std::io::Result<u64> {
    let mut buf = [0u8; 6];
    src.read_exact(&mut buf)?;
    Ok(((buf[0] as u64) << 40)
        | ((buf[1] as u64) << 32)
        | ((buf[2] as u64) << 24)
        | ((buf[3] as u64) << 16)
        | ((buf[4] as u64) << 8)
        | (buf[5] as u64))
}

fn decode_rev_field(raw: u32) -> Option<u32> {
    if raw == NULL_REV {
        None
    } else {
        Some(raw)
    }
}

fn corrupt(path: &Path, rev: Option<u32>, reason: impl Into<String>) -> RevlogError {
    RevlogError::Corrupt {
        file: path.to_path_buf(),
        rev,
        reason: reason.into(),
    }
}

/// Parse one index entry at the cursor. `rev` selects the entry-0
/// special case: there the offset field's high bytes hold the header,
/// so the data offset is forced to zero.
fn parse_entry(
    src: &mut dyn DataAccess,
    rev: u32,
    path: &Path,
) -> Result<IndexEntry, RevlogError> {
    let map_io = |e: std::io::Error| corrupt(path, Some(rev), format!("truncated index: {e}"));

    let offset_and_header = read_u48_be(src).map_err(map_io)?;
    let data_offset = if rev == 0 { 0 } else { offset_and_header };
    let flags = {
        let mut buf = [0u8; 2];
        src.read_exact(&mut buf).map_err(map_io)?;
        u16::from_be_bytes(buf)
    };
    let compressed_len = src.read_u32_be().map_err(map_io)?;
    let uncompressed_len = src.read_u32_be().map_err(map_io)?;
    let base_rev = decode_rev_field(src.read_u32_be().map_err(map_io)?);
    let link_rev = src.read_u32_be().map_err(map_io)?;
    let p1 = decode_rev_field(src.read_u32_be().map_err(map_io)?);
    let p2 = decode_rev_field(src.read_u32_be().map_err(map_io)?);

    // 32 hash bytes on disk; this format uses the first 20 and
    // zero-pads the rest.
    let mut hash = [0u8; 32];
    src.read_exact(&mut hash).map_err(map_io)?;
    let node = NodeId::from_bytes(&hash[..20])?;

    // Strict ordering invariants: parents precede their children, and a
    // delta base precedes (or is) its revision. These also guarantee
    // delta chains terminate.
    for p in [p1, p2].into_iter().flatten() {
        if p >= rev {
            return Err(corrupt(
                path,
                Some(rev),
                format!("parent revision {p} does not precede {rev}"),
            ));
        }
    }
    if let Some(base) = base_rev {
        if base > rev {
            return Err(corrupt(
                path,
                Some(rev),
                format!("base revision {base} follows {rev}"),
            ));
        }
    }

    Ok(IndexEntry {
        data_offset,
        flags,
        compressed_len,
        uncompressed_len,
        base_rev,
        link_rev,
        p1,
        p2,
        node,
    })
}

/// Parse a whole revlog index through a DataAccess source.
///
/// For inline revlogs the per-revision data chunks interleave with the
/// entries and are skipped using each entry's compressed length.
pub fn parse_index(
    src: &mut dyn DataAccess,
    path: &Path,
) -> Result<(RevlogHeader, Vec<IndexEntry>), RevlogError> {
    let total = src
        .len()
        .map_err(|e| corrupt(path, None, format!("cannot stat index: {e}")))?;
    if total == 0 {
        return Ok((RevlogHeader::new_default(), Vec::new()));
    }
    if total < ENTRY_SIZE as u64 {
        return Err(corrupt(path, None, "index shorter than one entry"));
    }

    // The header overlaps entry 0's offset field.
    let mut head = [0u8; 4];
    src.read_exact(&mut head)
        .map_err(|e| corrupt(path, None, format!("truncated header: {e}")))?;
    let header = RevlogHeader::from_bits(
        u16::from_be_bytes([head[0], head[1]]),
        u16::from_be_bytes([head[2], head[3]]),
    )?;
    src.reset()
        .map_err(|e| corrupt(path, None, format!("cannot rewind index: {e}")))?;

    let mut entries = Vec::new();
    if header.inline() {
        let mut pos = 0u64;
        let mut rev = 0u32;
        while pos < total {
            if total - pos < ENTRY_SIZE as u64 {
                return Err(corrupt(path, Some(rev), "trailing partial index entry"));
            }
            src.seek(pos)
                .map_err(|e| corrupt(path, Some(rev), e.to_string()))?;
            let entry = parse_entry(src, rev, path)?;
            pos += ENTRY_SIZE as u64 + entry.compressed_len as u64;
            if pos > total {
                return Err(corrupt(path, Some(rev), "inline data chunk truncated"));
            }
            entries.push(entry);
            rev += 1;
        }
    } else {
        if total % ENTRY_SIZE as u64 != 0 {
            return Err(corrupt(path, None, "index size not a multiple of 64"));
        }
        let count = (total / ENTRY_SIZE as u64) as u32;
        for rev in 0..count {
            entries.push(parse_entry(src, rev, path)?);
        }
    }

    Ok((header, entries))
}

/// Serialize one index entry, embedding the header when `rev == 0`.
pub fn encode_entry(entry: &IndexEntry, rev: u32, header: RevlogHeader) -> [u8; ENTRY_SIZE] {
    let mut out = [0u8; ENTRY_SIZE];
    if rev == 0 {
        out[0..2].copy_from_slice(&header.feature_bits().to_be_bytes());
        out[2..4].copy_from_slice(&header.version.to_be_bytes());
        // bytes 4..6 stay zero: the high bits of an offset that is
        // implicitly zero for revision 0.
    } else {
        let off = entry.data_offset;
        out[0] = (off >> 40) as u8;
        out[1] = (off >> 32) as u8;
        out[2] = (off >> 24) as u8;
        out[3] = (off >> 16) as u8;
        out[4] = (off >> 8) as u8;
        out[5] = off as u8;
    }
    out[6..8].copy_from_slice(&entry.flags.to_be_bytes());
    out[8..12].copy_from_slice(&entry.compressed_len.to_be_bytes());
    out[12..16].copy_from_slice(&entry.uncompressed_len.to_be_bytes());
    out[16..20].copy_from_slice(&entry.base_rev.unwrap_or(NULL_REV).to_be_bytes());
    out[20..24].copy_from_slice(&entry.link_rev.to_be_bytes());
    out[24..28].copy_from_slice(&entry.p1.unwrap_or(NULL_REV).to_be_bytes());
    out[28..32].copy_from_slice(&entry.p2.unwrap_or(NULL_REV).to_be_bytes());
    out[32..52].copy_from_slice(entry.node.as_bytes());
    // out[52..64] stays zero-padded.
    out
}
