//! Whole-bundle layout: signature, compression wrapper, and the
//! changelog / manifest / file-group sequence.

use std::io::Write;
use std::path::Path;

use bstr::BString;
use flate2::write::ZlibEncoder;
use hg_revlog::dataaccess::{BufFileAccess, DataAccess, InflateAccess, MemoryAccess, WindowAccess};

use crate::chunk::{read_chunk, write_chunk, write_terminator};
use crate::group::Group;
use crate::BundleError;

const SIGNATURE_LEN: u64 = 6;

/// Compression wrapper declared by the bundle signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// `HG10UN`: no wrapper.
    None,
    /// `HG10GZ`: the group stream is one zlib stream.
    Zlib,
}

impl Compression {
    fn signature(self) -> &'static [u8; 6] {
        match self {
            Self::None => b"HG10UN",
            Self::Zlib => b"HG10GZ",
        }
    }
}

/// A file group and the store path it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub path: BString,
    pub group: Group,
}

/// A fully parsed bundle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bundle {
    pub changelog: Group,
    pub manifest: Group,
    pub files: Vec<FileGroup>,
}

impl Bundle {
    /// Parse a bundle from a byte buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, BundleError> {
        Self::read(Box::new(MemoryAccess::new(bytes)))
    }

    /// Parse a bundle file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        Self::read(Box::new(BufFileAccess::open(path)?))
    }

    /// Parse a bundle from any data source, sniffing the signature.
    ///
    /// A missing signature is accepted and treated as a bare
    /// uncompressed group stream, which is what wire-protocol
    /// changegroups look like.
    pub fn read(mut src: Box<dyn DataAccess + '_>) -> Result<Self, BundleError> {
        let total = src.len()?;
        let mut signature = [0u8; SIGNATURE_LEN as usize];
        let sniffed = if total >= SIGNATURE_LEN {
            src.read_exact(&mut signature)?;
            true
        } else {
            false
        };

        if sniffed && &signature[0..4] == b"HG10" {
            let mut body = WindowAccess::new(src, SIGNATURE_LEN, total - SIGNATURE_LEN)
                .map_err(|e| BundleError::Malformed {
                    offset: SIGNATURE_LEN,
                    reason: e.to_string(),
                })?;
            match (signature[4], signature[5]) {
                (b'U', b'N') => Self::read_groups(&mut body),
                (b'G', b'Z') => {
                    let mut inflated = InflateAccess::new(Box::new(body));
                    Self::read_groups(&mut inflated)
                }
                _ => Err(BundleError::UnsupportedBundle(
                    String::from_utf8_lossy(&signature).into_owned(),
                )),
            }
        } else {
            src.reset()?;
            Self::read_groups(src.as_mut())
        }
    }

    fn read_groups(src: &mut dyn DataAccess) -> Result<Self, BundleError> {
        let changelog = Group::read(src)?;
        let manifest = Group::read(src)?;

        // File sections: a filename chunk, then that file's group,
        // until an empty filename chunk ends the bundle.
        let mut files = Vec::new();
        loop {
            if src.is_empty()? {
                // Producers may omit the final terminator after the
                // last file group.
                break;
            }
            match read_chunk(src)? {
                None => break,
                Some(name) => {
                    let group = Group::read(src)?;
                    files.push(FileGroup {
                        path: BString::from(name),
                        group,
                    });
                }
            }
        }
        Ok(Self {
            changelog,
            manifest,
            files,
        })
    }

    /// Serialize with the given compression wrapper.
    pub fn to_bytes(&self, compression: Compression) -> Result<Vec<u8>, BundleError> {
        let mut body = Vec::new();
        self.changelog.write(&mut body);
        self.manifest.write(&mut body);
        for file in &self.files {
            write_chunk(&mut body, &file.path);
            file.group.write(&mut body);
        }
        write_terminator(&mut body);

        let mut out = Vec::with_capacity(body.len() + SIGNATURE_LEN as usize);
        out.extend_from_slice(compression.signature());
        match compression {
            Compression::None => out.extend_from_slice(&body),
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(out, flate2::Compression::default());
                encoder.write_all(&body)?;
                out = encoder.finish()?;
            }
        }
        Ok(out)
    }

    /// Serialize to a file.
    pub fn write_to(
        &self,
        path: impl AsRef<Path>,
        compression: Compression,
    ) -> Result<(), BundleError> {
        std::fs::write(path, self.to_bytes(compression)?)?;
        Ok(())
    }

    /// Total number of revisions across all groups.
    pub fn revision_count(&self) -> usize {
        self.changelog.len()
            + self.manifest.len()
            + self.files.iter().map(|f| f.group.len()).sum::<usize>()
    }
}
