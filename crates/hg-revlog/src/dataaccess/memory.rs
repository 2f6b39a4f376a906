use std::io;

use super::{closed_error, eof_error, DataAccess};

/// DataAccess over an owned or borrowed byte buffer.
///
/// The cheapest variant: bounds checks and a cursor. `as_slice` exposes
/// the whole buffer for zero-copy field extraction.
pub struct MemoryAccess<T: AsRef<[u8]> = Vec<u8>> {
    data: T,
    pos: u64,
    closed: bool,
}

impl<T: AsRef<[u8]>> MemoryAccess<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            pos: 0,
            closed: false,
        }
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl<T: AsRef<[u8]>> DataAccess for MemoryAccess<T> {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.bytes().len() as u64)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.pos = offset;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        let data = self.data.as_ref();
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
        // Nothing to release for a memory buffer, but reads stop working
        // so the contract matches the file-backed variants.
        self.closed = true;
    }

    fn as_slice(&self) -> Option<&[u8]> {
        if self.closed {
            None
        } else {
            Some(self.bytes())
        }
    }
}
