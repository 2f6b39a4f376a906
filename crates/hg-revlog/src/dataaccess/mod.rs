//! Seekable, length-bounded byte sources for revlog parsing.
//!
//! All binary parsing in this crate goes through the [`DataAccess`]
//! trait rather than raw file handles. Implementations cover an
//! in-memory buffer, a memory-mapped file, a buffered file window, a
//! windowed slice of another source, and an inflate-on-read decorator
//! for zlib chunks. Instances carry their own cursor and are not
//! shareable; concurrent readers each open their own.

mod file;
mod inflate;
mod memory;
mod mmap;
mod window;

pub use file::BufFileAccess;
pub use inflate::InflateAccess;
pub use memory::MemoryAccess;
pub use mmap::MmapAccess;
pub use window::WindowAccess;

use std::io;

/// A seekable byte source with a private cursor.
///
/// Reads past the available length fail with
/// [`io::ErrorKind::UnexpectedEof`]; the revlog codec treats that as a
/// hard corruption signal, never a recoverable condition.
pub trait DataAccess {
    /// Total number of readable bytes.
    ///
    /// May be expensive on the first call for decompressing sources,
    /// which must inflate everything once to learn their length.
    fn len(&mut self) -> io::Result<u64>;

    /// Whether the cursor is at or past the end of the data.
    fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.position() >= self.len()?)
    }

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Move the cursor to an absolute offset.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Move the cursor relative to its current position. Negative
    /// deltas rewind; rewinding a decompressing source forces a full
    /// reset and forward re-read.
    fn skip(&mut self, delta: i64) -> io::Result<()> {
        let pos = self.position();
        let target = pos
            .checked_add_signed(delta)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "skip before start"))?;
        self.seek(target)
    }

    /// Read exactly one byte.
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Fill `buf` completely or fail with `UnexpectedEof`.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Read a big-endian u32.
    fn read_u32_be(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Read a big-endian u64.
    fn read_u64_be(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Return the cursor to the start of the data.
    fn reset(&mut self) -> io::Result<()> {
        self.seek(0)
    }

    /// Release underlying resources (file handles, mapped regions).
    /// Idempotent; reads after `done` fail.
    fn done(&mut self);

    /// Zero-copy escape hatch: the full underlying buffer, when the
    /// source is memory-backed. Structured parsers use this to extract
    /// fields without copying.
    fn as_slice(&self) -> Option<&[u8]> {
        None
    }

    /// Read all bytes from the current position to the end.
    fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            if self.is_empty()? {
                return Ok(out);
            }
            let remaining = self.len()? - self.position();
            let take = remaining.min(buf.len() as u64) as usize;
            self.read_exact(&mut buf[..take])?;
            out.extend_from_slice(&buf[..take]);
        }
    }
}

/// The error used for any read past the end of a source.
pub(crate) fn eof_error() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of data")
}

/// The error used for reads on a source after `done()`.
pub(crate) fn closed_error() -> io::Error {
    io::Error::other("data access already closed")
}
