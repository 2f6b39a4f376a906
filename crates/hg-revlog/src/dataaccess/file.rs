use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::{closed_error, eof_error, DataAccess};

/// Default buffer window size.
const DEFAULT_BUF_SIZE: usize = 64 * 1024;

/// DataAccess over a file through a fixed-size buffer window.
///
/// A `seek` landing inside the current window just repositions; landing
/// outside invalidates it. The window is refilled lazily from
/// `read_exact` when exhausted, never eagerly on seek.
pub struct BufFileAccess {
    file: Option<File>,
    file_len: u64,
    /// Logical read position.
    pos: u64,
    buf: Vec<u8>,
    /// File offset of `buf[0]`.
    buf_start: u64,
    /// Number of valid bytes in `buf`.
    buf_valid: usize,
}

impl BufFileAccess {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_buffer_size(path, DEFAULT_BUF_SIZE)
    }

    pub fn with_buffer_size(path: impl AsRef<Path>, buf_size: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            file: Some(file),
            file_len,
            pos: 0,
            buf: vec![0u8; buf_size.max(1)],
            buf_start: 0,
            buf_valid: 0,
        })
    }

    /// Refill the window starting at the current logical position.
    fn refill(&mut self) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(closed_error)?;
        file.seek(SeekFrom::Start(self.pos))?;
        let mut filled = 0;
        while filled < self.buf.len() {
            match file.read(&mut self.buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        self.buf_start = self.pos;
        self.buf_valid = filled;
        Ok(())
    }

    /// Bytes of the window available at the current position.
    fn window_remaining(&self) -> usize {
        if self.pos >= self.buf_start && self.pos < self.buf_start + self.buf_valid as u64 {
            (self.buf_start + self.buf_valid as u64 - self.pos) as usize
        } else {
            0
        }
    }
}

impl DataAccess for BufFileAccess {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.file_len)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        // Window validity is re-checked on the next read; out-of-window
        // positions simply find window_remaining() == 0 and refill.
        self.pos = offset;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if self.pos + buf.len() as u64 > self.file_len {
            return Err(eof_error());
        }
        let mut written = 0;
        while written < buf.len() {
            let avail = self.window_remaining();
            if avail == 0 {
                self.refill()?;
                if self.window_remaining() == 0 {
                    return Err(eof_error());
                }
                continue;
            }
            let take = avail.min(buf.len() - written);
            let start = (self.pos - self.buf_start) as usize;
            buf[written..written + take].copy_from_slice(&self.buf[start..start + take]);
            written += take;
            self.pos += take as u64;
        }
        Ok(())
    }

    fn done(&mut self) {
        self.file = None;
        self.buf_valid = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_across_window_boundary() {
        let data: Vec<u8> = (0..100u8).collect();
        let f = write_temp(&data);
        // Tiny window forces several refills.
        let mut a = BufFileAccess::with_buffer_size(f.path(), 16).unwrap();
        let mut out = vec![0u8; 100];
        a.read_exact(&mut out).unwrap();
        assert_eq!(out, data);
        assert!(a.is_empty().unwrap());
    }

    #[test]
    fn seek_within_window_is_cheap() {
        let data: Vec<u8> = (0..64u8).collect();
        let f = write_temp(&data);
        let mut a = BufFileAccess::with_buffer_size(f.path(), 32).unwrap();
        assert_eq!(a.read_u8().unwrap(), 0);
        // Still inside the filled window.
        a.seek(10).unwrap();
        assert_eq!(a.read_u8().unwrap(), 10);
        // Rewind inside the window.
        a.skip(-5).unwrap();
        assert_eq!(a.read_u8().unwrap(), 6);
    }

    #[test]
    fn seek_outside_window_refills() {
        let data: Vec<u8> = (0..=255u8).collect();
        let f = write_temp(&data);
        let mut a = BufFileAccess::with_buffer_size(f.path(), 16).unwrap();
        assert_eq!(a.read_u8().unwrap(), 0);
        a.seek(200).unwrap();
        assert_eq!(a.read_u8().unwrap(), 200);
        a.seek(3).unwrap();
        assert_eq!(a.read_u8().unwrap(), 3);
    }

    #[test]
    fn read_past_end_is_eof() {
        let f = write_temp(b"abc");
        let mut a = BufFileAccess::open(f.path()).unwrap();
        a.seek(2).unwrap();
        let mut buf = [0u8; 2];
        let err = a.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn done_closes_handle() {
        let f = write_temp(b"abc");
        let mut a = BufFileAccess::open(f.path()).unwrap();
        a.done();
        a.done();
        assert!(a.read_u8().is_err());
    }
}
