//! Changeset (changelog entry) parsing and serialization.
//!
//! The payload layout is line-oriented:
//!
//! ```text
//! <40-hex manifest node>\n
//! <user>\n
//! <time> <tz offset>[ <extras>]\n
//! <file path>\n            (zero or more)
//! \n
//! <message>                 (verbatim bytes to the end)
//! ```
//!
//! Extras are NUL-separated `key:value` pairs whose values escape
//! backslash, newline, carriage return and NUL.

use bstr::{BStr, BString, ByteSlice};
use hg_hash::NodeId;

use crate::TypesError;

/// One parsed changelog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    /// Manifest revision this changeset snapshots.
    pub manifest: NodeId,
    /// Author, conventionally `Name <email>` but free-form bytes.
    pub user: BString,
    /// Commit time, seconds since the epoch.
    pub timestamp: i64,
    /// Timezone offset in seconds west of UTC.
    pub tz_offset: i32,
    /// Extra metadata pairs, in stored order.
    pub extras: Vec<(BString, BString)>,
    /// Paths touched by this changeset.
    pub files: Vec<BString>,
    /// Commit message, verbatim.
    pub message: BString,
}

impl Changeset {
    /// Parse one changelog payload. `rev` only labels errors.
    pub fn parse(content: &[u8], rev: u32) -> Result<Self, TypesError> {
        let bad = |reason: &str| TypesError::InvalidChangeset {
            rev,
            reason: reason.to_string(),
        };

        let (manifest_line, rest) = split_line(content).ok_or_else(|| bad("missing manifest line"))?;
        let manifest = NodeId::from_hex(manifest_line)?;

        let (user, rest) = split_line(rest).ok_or_else(|| bad("missing user line"))?;
        let (date_line, rest) = split_line(rest).ok_or_else(|| bad("missing date line"))?;
        let (timestamp, tz_offset, extras) = parse_date_line(date_line, rev)?;

        // File list runs until the blank separator line.
        let mut files = Vec::new();
        let mut tail = rest;
        loop {
            let (line, next) = split_line(tail).ok_or_else(|| bad("missing blank separator"))?;
            tail = next;
            if line.is_empty() {
                break;
            }
            files.push(BString::from(line));
        }

        Ok(Changeset {
            manifest,
            user: BString::from(user),
            timestamp,
            tz_offset,
            extras,
            files,
            message: BString::from(tail),
        })
    }

    /// Serialize back to the on-disk payload. Parsing the result yields
    /// an equal value.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.manifest.to_hex().as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&self.user);
        out.push(b'\n');
        out.extend_from_slice(format!("{} {}", self.timestamp, self.tz_offset).as_bytes());
        for (i, (key, value)) in self.extras.iter().enumerate() {
            out.push(if i == 0 { b' ' } else { b'\0' });
            out.extend_from_slice(key);
            out.push(b':');
            out.extend_from_slice(&escape_extra(value));
        }
        out.push(b'\n');
        for file in &self.files {
            out.extend_from_slice(file);
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// The named branch, defaulting to "default" when the extras carry
    /// no branch entry.
    pub fn branch(&self) -> &BStr {
        self.extra(b"branch").unwrap_or_else(|| b"default".as_bstr())
    }

    /// Look up one extras value by key.
    pub fn extra(&self, key: &[u8]) -> Option<&BStr> {
        self.extras
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v.as_bstr())
    }
}

/// Split at the first newline; the newline itself is consumed.
fn split_line(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = bytes.find_byte(b'\n')?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

fn parse_date_line(
    line: &[u8],
    rev: u32,
) -> Result<(i64, i32, Vec<(BString, BString)>), TypesError> {
    let bad = |reason: String| TypesError::InvalidChangeset { rev, reason };

    let mut parts = line.splitn(3, |&b| b == b' ');
    let time_part = parts.next().unwrap_or_default();
    let tz_part = parts
        .next()
        .ok_or_else(|| bad("date line lacks timezone".into()))?;
    let extras_part = parts.next();

    let timestamp = parse_timestamp(time_part)
        .ok_or_else(|| bad(format!("bad timestamp {:?}", time_part.as_bstr())))?;
    let tz_offset: i32 = std::str::from_utf8(tz_part)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| bad(format!("bad timezone {:?}", tz_part.as_bstr())))?;

    let mut extras = Vec::new();
    if let Some(blob) = extras_part {
        for pair in blob.split(|&b| b == b'\0') {
            let sep = pair
                .find_byte(b':')
                .ok_or_else(|| bad(format!("extras pair without colon: {:?}", pair.as_bstr())))?;
            extras.push((
                BString::from(&pair[..sep]),
                BString::from(unescape_extra(&pair[sep + 1..])),
            ));
        }
    }
    Ok((timestamp, tz_offset, extras))
}

/// Timestamps are usually integral seconds but historically allowed a
/// fractional part; the fraction is discarded.
fn parse_timestamp(bytes: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(bytes).ok()?;
    let whole = text.split('.').next()?;
    whole.parse().ok()
}

fn escape_extra(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for &b in value {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\0' => out.extend_from_slice(b"\\0"),
            _ => out.push(b),
        }
    }
    out
}

fn unescape_extra(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    let mut iter = value.iter();
    while let Some(&b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(&b'\\') => out.push(b'\\'),
            Some(&b'n') => out.push(b'\n'),
            Some(&b'r') => out.push(b'\r'),
            Some(&b'0') => out.push(b'\0'),
            // Unknown escapes pass through untouched.
            Some(&other) => {
                out.push(b'\\');
                out.push(other);
            }
            None => out.push(b'\\'),
        }
    }
    out
}
