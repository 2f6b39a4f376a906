use std::io;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use super::{closed_error, eof_error, DataAccess};

/// DataAccess over a memory-mapped file.
///
/// The map is reference-counted so several cursors can be opened over
/// one mapping: each [`share`](MmapAccess::share) hands out an
/// independent `MmapAccess` with its own position, which is how
/// concurrent readers stay safe without locking.
pub struct MmapAccess {
    map: Option<Arc<Mmap>>,
    len: u64,
    pos: u64,
}

impl MmapAccess {
    /// Map `path` read-only. Empty files are represented without a
    /// mapping (zero-length maps are not portable).
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len();
        let map = if len == 0 {
            None
        } else {
            Some(Arc::new(unsafe { Mmap::map(&file)? }))
        };
        Ok(Self { map, len, pos: 0 })
    }

    /// A new independent cursor over the same mapping.
    pub fn share(&self) -> Self {
        Self {
            map: self.map.clone(),
            len: self.len,
            pos: 0,
        }
    }

    fn bytes(&self) -> io::Result<&[u8]> {
        match &self.map {
            Some(map) => Ok(&map[..]),
            None if self.len == 0 => Ok(&[]),
            None => Err(closed_error()),
        }
    }
}

impl DataAccess for MmapAccess {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.len)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let data = self.bytes()?;
        let start = self.pos as usize;
        let end = start.checked_add(buf.len()).ok_or_else(eof_error)?;
        if end > data.len() {
            return Err(eof_error());
        }
        buf.copy_from_slice(&data[start..end]);
        self.pos = end as u64;
        Ok(())
    }

    fn done(&mut self) {
        self.map = None;
        // len stays: a zero-length source remains readable-as-empty,
        // a closed non-empty one errors via bytes().
    }

    fn as_slice(&self) -> Option<&[u8]> {
        self.map.as_deref().map(|m| &m[..])
    }
}
