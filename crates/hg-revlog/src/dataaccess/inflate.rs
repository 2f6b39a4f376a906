use std::io::{self, Read};

use flate2::read::ZlibDecoder;

use super::{closed_error, DataAccess};

/// Adapter giving `std::io::Read` over a boxed DataAccess so it can
/// feed a streaming zlib decoder.
struct SourceReader<'a> {
    inner: Box<dyn DataAccess + 'a>,
}

impl Read for SourceReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.inner.len()?.saturating_sub(self.inner.position());
        let take = remaining.min(buf.len() as u64) as usize;
        if take == 0 {
            return Ok(0);
        }
        self.inner.read_exact(&mut buf[..take])?;
        Ok(take)
    }
}

/// Inflate-on-read decorator over a compressed source.
///
/// Positions and lengths are in decompressed bytes. `len()` is
/// expensive the first time: the compressed size says nothing about the
/// decompressed size, so the whole stream is inflated once, the result
/// cached, and the cursor restored. Negative skips rebuild the decoder
/// and re-read forward, since inflate is not randomly seekable.
pub struct InflateAccess<'a> {
    decoder: Option<ZlibDecoder<SourceReader<'a>>>,
    /// Decompressed bytes handed to the caller so far.
    pos: u64,
    /// One byte read ahead by `is_empty`, not yet delivered.
    peeked: Option<u8>,
    /// Total decompressed length, once known.
    total_len: Option<u64>,
}

impl<'a> InflateAccess<'a> {
    pub fn new(compressed: Box<dyn DataAccess + 'a>) -> Self {
        Self {
            decoder: Some(ZlibDecoder::new(SourceReader { inner: compressed })),
            pos: 0,
            peeked: None,
            total_len: None,
        }
    }

    fn decoder_mut(&mut self) -> io::Result<&mut ZlibDecoder<SourceReader<'a>>> {
        self.decoder.as_mut().ok_or_else(closed_error)
    }

    /// Restart decompression from the beginning of the compressed data.
    fn rebuild(&mut self) -> io::Result<()> {
        let decoder = self.decoder.take().ok_or_else(closed_error)?;
        let mut source = decoder.into_inner();
        source.inner.reset()?;
        self.decoder = Some(ZlibDecoder::new(source));
        self.pos = 0;
        self.peeked = None;
        Ok(())
    }

    /// Read and drop `n` decompressed bytes.
    fn discard(&mut self, mut n: u64) -> io::Result<()> {
        let mut scratch = [0u8; 8192];
        while n > 0 {
            let take = n.min(scratch.len() as u64) as usize;
            self.read_exact(&mut scratch[..take])?;
            n -= take as u64;
        }
        Ok(())
    }
}

impl DataAccess for InflateAccess<'_> {
    fn len(&mut self) -> io::Result<u64> {
        if let Some(len) = self.total_len {
            return Ok(len);
        }
        let restore = self.pos;
        let mut total = self.pos + if self.peeked.is_some() { 1 } else { 0 };
        let decoder = self.decoder_mut()?;
        let mut scratch = [0u8; 8192];
        loop {
            match decoder.read(&mut scratch)? {
                0 => break,
                n => total += n as u64,
            }
        }
        self.total_len = Some(total);
        // Rewind to where the caller was.
        self.rebuild()?;
        self.discard(restore)?;
        Ok(total)
    }

    fn is_empty(&mut self) -> io::Result<bool> {
        if self.peeked.is_some() {
            return Ok(false);
        }
        if let Some(len) = self.total_len {
            return Ok(self.pos >= len);
        }
        // Empty only once the compressed input is exhausted and the
        // inflater reports the stream finished; probing with a one-byte
        // read establishes exactly that.
        let mut one = [0u8; 1];
        match self.decoder_mut()?.read(&mut one)? {
            0 => {
                self.total_len = Some(self.pos);
                Ok(true)
            }
            _ => {
                self.peeked = Some(one[0]);
                Ok(false)
            }
        }
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        if offset < self.pos {
            self.rebuild()?;
        }
        let forward = offset - self.pos;
        self.discard(forward)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let mut start = 0;
        if let Some(b) = self.peeked.take() {
            buf[0] = b;
            self.pos += 1;
            start = 1;
        }
        if start < buf.len() {
            self.decoder_mut()?.read_exact(&mut buf[start..])?;
            self.pos += (buf.len() - start) as u64;
        }
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        self.rebuild()
    }

    fn done(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.into_inner().inner.done();
        }
    }

    fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        if let Some(b) = self.peeked.take() {
            out.push(b);
            self.pos += 1;
        }
        let pos_before = self.pos;
        let decoder = self.decoder_mut()?;
        let read = decoder.read_to_end(&mut out)? as u64;
        self.pos = pos_before + read;
        self.total_len = Some(self.pos);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataaccess::MemoryAccess;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn access_over(data: &[u8]) -> InflateAccess<'static> {
        InflateAccess::new(Box::new(MemoryAccess::new(deflate(data))))
    }

    #[test]
    fn inflates_on_read() {
        let mut a = access_over(b"hello zlib world");
        let mut buf = [0u8; 5];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(a.read_to_end().unwrap(), b" zlib world");
    }

    #[test]
    fn len_is_decompressed_length_and_preserves_position() {
        let payload: Vec<u8> = (0..200).map(|i| (i % 251) as u8).collect();
        let mut a = access_over(&payload);
        let mut buf = [0u8; 10];
        a.read_exact(&mut buf).unwrap();

        assert_eq!(a.len().unwrap(), 200);
        // Position survives the full inflate + rewind.
        assert_eq!(a.position(), 10);
        let mut next = [0u8; 10];
        a.read_exact(&mut next).unwrap();
        assert_eq!(&next[..], &payload[10..20]);
        // Second call hits the cache.
        assert_eq!(a.len().unwrap(), 200);
    }

    #[test]
    fn reset_then_reread_is_identical() {
        let payload = b"idempotent decompression check".repeat(50);
        let mut a = access_over(&payload);
        let first = a.read_to_end().unwrap();
        a.reset().unwrap();
        let second = a.read_to_end().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, payload);
    }

    #[test]
    fn negative_skip_rewinds_via_reset() {
        let payload: Vec<u8> = (0..=255u8).collect();
        let mut a = access_over(&payload);
        let mut buf = [0u8; 100];
        a.read_exact(&mut buf).unwrap();
        a.skip(-60).unwrap();
        assert_eq!(a.position(), 40);
        assert_eq!(a.read_u8().unwrap(), 40);
    }

    #[test]
    fn is_empty_tracks_stream_end() {
        let mut a = access_over(b"xy");
        assert!(!a.is_empty().unwrap());
        let mut buf = [0u8; 2];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"xy");
        assert!(a.is_empty().unwrap());
        assert!(a.is_empty().unwrap());
    }

    #[test]
    fn empty_payload_is_empty() {
        let mut a = access_over(b"");
        assert!(a.is_empty().unwrap());
        assert_eq!(a.len().unwrap(), 0);
    }

    #[test]
    fn truncated_stream_fails() {
        let mut compressed = deflate(b"some payload that will be cut short");
        compressed.truncate(compressed.len() / 2);
        let mut a = InflateAccess::new(Box::new(MemoryAccess::new(compressed)));
        assert!(a.read_to_end().is_err());
    }

    #[test]
    fn done_is_idempotent() {
        let mut a = access_over(b"data");
        a.done();
        a.done();
        assert!(a.read_u8().is_err());
    }
}
