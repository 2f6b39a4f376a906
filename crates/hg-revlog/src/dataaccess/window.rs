use std::io;

use super::{eof_error, DataAccess};

/// DataAccess exposing `[offset, offset + len)` of another source as a
/// virtual `[0, len)`.
///
/// This is how the codec carves one underlying stream holding
/// concatenated per-revision blocks into per-chunk sources: `seek(0)`
/// on the window translates to `seek(offset)` on the delegate.
pub struct WindowAccess<'a> {
    inner: Box<dyn DataAccess + 'a>,
    offset: u64,
    len: u64,
    pos: u64,
}

impl<'a> WindowAccess<'a> {
    /// Window `inner` down to `len` bytes starting at `offset`.
    ///
    /// Fails if the window extends past the end of the delegate.
    pub fn new(mut inner: Box<dyn DataAccess + 'a>, offset: u64, len: u64) -> io::Result<Self> {
        let inner_len = inner.len()?;
        if offset.checked_add(len).map_or(true, |end| end > inner_len) {
            return Err(eof_error());
        }
        Ok(Self {
            inner,
            offset,
            len,
            pos: 0,
        })
    }
}

impl DataAccess for WindowAccess<'_> {
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
        let end = self.pos.checked_add(buf.len() as u64).ok_or_else(eof_error)?;
        if end > self.len {
            return Err(eof_error());
        }
        // Re-seek the delegate every read: the window never assumes it
        // is the delegate's only user.
        self.inner.seek(self.offset + self.pos)?;
        self.inner.read_exact(buf)?;
        self.pos = end;
        Ok(())
    }

    fn done(&mut self) {
        self.inner.done();
    }

    fn as_slice(&self) -> Option<&[u8]> {
        let start = self.offset as usize;
        let end = (self.offset + self.len) as usize;
        self.inner.as_slice().map(|s| &s[start..end])
    }
}
