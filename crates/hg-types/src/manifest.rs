//! Manifest parsing: the path -> file-node map of one revision.
//!
//! The payload is a sequence of `path \0 40-hex [flag] \n` records,
//! sorted by path. Parsing is a single byte-wise scan; no per-field
//! strings are built beyond the owned path.

use bstr::{BString, ByteSlice};
use hg_hash::{NodeId, NODE_HEX_LEN};

use crate::TypesError;

/// Per-file mode recorded in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestFlags {
    #[default]
    Regular,
    Executable,
    Symlink,
}

impl ManifestFlags {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'x' => Some(Self::Executable),
            b'l' => Some(Self::Symlink),
            _ => None,
        }
    }

    fn as_byte(self) -> Option<u8> {
        match self {
            Self::Regular => None,
            Self::Executable => Some(b'x'),
            Self::Symlink => Some(b'l'),
        }
    }
}

/// One manifest record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: BString,
    pub node: NodeId,
    pub flags: ManifestFlags,
}

/// A parsed manifest, entries in payload (path-sorted) order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn parse(content: &[u8]) -> Result<Self, TypesError> {
        let bad = |offset: usize, reason: &str| TypesError::InvalidManifest {
            offset,
            reason: reason.to_string(),
        };

        let mut entries = Vec::new();
        let mut pos = 0;
        while pos < content.len() {
            let rest = &content[pos..];
            let nul = rest
                .find_byte(b'\0')
                .ok_or_else(|| bad(pos, "record without NUL separator"))?;
            let nl = rest[nul..]
                .find_byte(b'\n')
                .map(|p| p + nul)
                .ok_or_else(|| bad(pos, "record without newline terminator"))?;

            let path = &rest[..nul];
            let meta = &rest[nul + 1..nl];
            if path.is_empty() {
                return Err(bad(pos, "empty path"));
            }
            if meta.len() < NODE_HEX_LEN {
                return Err(bad(pos, "node hex shorter than 40 characters"));
            }
            let node = NodeId::from_hex(&meta[..NODE_HEX_LEN])?;
            let flags = match &meta[NODE_HEX_LEN..] {
                [] => ManifestFlags::Regular,
                [b] => ManifestFlags::from_byte(*b)
                    .ok_or_else(|| bad(pos, "unknown flag character"))?,
                _ => return Err(bad(pos, "trailing bytes after flag")),
            };

            entries.push(ManifestEntry {
                path: BString::from(path),
                node,
                flags,
            });
            pos += nl + 1;
        }
        Ok(Manifest { entries })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(&entry.path);
            out.push(b'\0');
            out.extend_from_slice(entry.node.to_hex().as_bytes());
            if let Some(flag) = entry.flags.as_byte() {
                out.push(flag);
            }
            out.push(b'\n');
        }
        out
    }

    /// Look up one path. Entries are path-sorted by construction, so
    /// this is a binary search.
    pub fn get(&self, path: &[u8]) -> Option<&ManifestEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_slice().cmp(path))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
