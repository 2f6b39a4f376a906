//! Binary patch records and their application.
//!
//! A revision's stored bytes, when not a full snapshot, are a sequence
//! of patch records against a base buffer: replace `[start, end)` of
//! the base with the record's replacement bytes. Records carry explicit
//! lengths (never terminators) so arbitrary binary content, embedded
//! NULs included, round-trips.

use crate::RevlogError;

/// One patch record: replace base bytes `[start, end)` with `data`.
///
/// Positions are expressed in coordinates of the *original* base
/// buffer, regardless of how earlier records in the same list have
/// shifted lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    pub start: u32,
    pub end: u32,
    pub data: Vec<u8>,
}

impl PatchRecord {
    /// Parse a wire-format patch list: repeated
    /// `be32 start ++ be32 end ++ be32 len ++ data[len]`.
    pub fn parse_list(raw: &[u8]) -> Result<Vec<PatchRecord>, RevlogError> {
        let mut records = Vec::new();
        let mut pos = 0usize;
        while pos < raw.len() {
            if raw.len() - pos < 12 {
                return Err(RevlogError::InvalidPatch {
                    offset: pos,
                    reason: "truncated record header".into(),
                });
            }
            let start = be32(&raw[pos..]);
            let end = be32(&raw[pos + 4..]);
            let len = be32(&raw[pos + 8..]) as usize;
            pos += 12;
            if raw.len() - pos < len {
                return Err(RevlogError::InvalidPatch {
                    offset: pos,
                    reason: format!("record data truncated: need {len}, have {}", raw.len() - pos),
                });
            }
            if end < start {
                return Err(RevlogError::InvalidPatch {
                    offset: pos - 12,
                    reason: format!("record removes inverted range [{start}, {end})"),
                });
            }
            records.push(PatchRecord {
                start,
                end,
                data: raw[pos..pos + len].to_vec(),
            });
            pos += len;
        }
        Ok(records)
    }

    /// Serialize a patch list to the wire format.
    pub fn serialize_list(records: &[PatchRecord]) -> Vec<u8> {
        let total: usize = records.iter().map(|r| 12 + r.data.len()).sum();
        let mut out = Vec::with_capacity(total);
        for r in records {
            out.extend_from_slice(&r.start.to_be_bytes());
            out.extend_from_slice(&r.end.to_be_bytes());
            out.extend_from_slice(&(r.data.len() as u32).to_be_bytes());
            out.extend_from_slice(&r.data);
        }
        out
    }
}

fn be32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Apply a patch list to a base buffer.
///
/// Records must be ordered and non-overlapping in base coordinates; the
/// running output length differs from the base as records insert and
/// remove bytes, which is why positions stay in original coordinates.
/// An empty list yields the base unchanged.
pub fn apply(base: &[u8], records: &[PatchRecord]) -> Result<Vec<u8>, RevlogError> {
    let grow: usize = records.iter().map(|r| r.data.len()).sum();
    let mut out = Vec::with_capacity(base.len() + grow);
    let mut consumed = 0usize;
    // Wire position of the current record, so errors point at the same
    // byte offsets `parse_list` reports.
    let mut wire_pos = 0usize;

    for r in records {
        let (start, end) = (r.start as usize, r.end as usize);
        if start < consumed {
            return Err(RevlogError::InvalidPatch {
                offset: wire_pos,
                reason: format!("record out of order: starts at {start} after {consumed}"),
            });
        }
        if end > base.len() {
            return Err(RevlogError::InvalidPatch {
                offset: wire_pos,
                reason: format!("record ends at {end} past base length {}", base.len()),
            });
        }
        out.extend_from_slice(&base[consumed..start]);
        out.extend_from_slice(&r.data);
        consumed = end;
        wire_pos += 12 + r.data.len();
    }
    out.extend_from_slice(&base[consumed..]);
    Ok(out)
}

/// Apply several patch lists in sequence, from the oldest delta to the
/// newest. Each list's coordinates refer to the output of the previous
/// application.
pub fn apply_chain<'a, I>(base: &[u8], lists: I) -> Result<Vec<u8>, RevlogError>
where
    I: IntoIterator<Item = &'a [PatchRecord]>,
{
    let mut current = base.to_vec();
    for records in lists {
        current = apply(&current, records)?;
    }
    Ok(current)
}

/// Compute a patch list transforming `old` into `new`.
///
/// Trims the common prefix and suffix and replaces whatever remains in
/// one record. Round-trip exactness is the contract; record count and
/// size are quality-of-implementation, and single-record output matches
/// what the original tool's fallback differ emits.
pub fn diff(old: &[u8], new: &[u8]) -> Vec<PatchRecord> {
    if old == new {
        return Vec::new();
    }

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);

    vec![PatchRecord {
        start: prefix as u32,
        end: (old.len() - suffix) as u32,
        data: new[prefix..new.len() - suffix].to_vec(),
    }]
}
