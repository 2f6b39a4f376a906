//! Length-framed chunk codec.
//!
//! Every logical record in a bundle is one chunk: a big-endian u32
//! length that counts itself, followed by the payload. A length of four
//! or less is a terminator ending the current group.

use hg_revlog::dataaccess::DataAccess;

use crate::BundleError;

/// Read one chunk. `None` means a terminator was read.
pub fn read_chunk(src: &mut dyn DataAccess) -> Result<Option<Vec<u8>>, BundleError> {
    let offset = src.position();
    let declared = src.read_u32_be().map_err(|e| BundleError::Malformed {
        offset,
        reason: format!("chunk length: {e}"),
    })?;
    if declared <= 4 {
        return Ok(None);
    }
    let mut payload = vec![0u8; declared as usize - 4];
    src.read_exact(&mut payload)
        .map_err(|e| BundleError::Malformed {
            offset,
            reason: format!("chunk of {declared} bytes truncated: {e}"),
        })?;
    Ok(Some(payload))
}

/// Frame `payload` as one chunk.
pub fn write_chunk(out: &mut Vec<u8>, payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32 + 4).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Write a group terminator.
pub fn write_terminator(out: &mut Vec<u8>) {
    out.extend_from_slice(&0u32.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_revlog::dataaccess::MemoryAccess;

    #[test]
    fn chunk_roundtrip() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"payload bytes");
        write_chunk(&mut buf, b"");
        write_terminator(&mut buf);

        let mut src = MemoryAccess::new(buf);
        assert_eq!(read_chunk(&mut src).unwrap().unwrap(), b"payload bytes");
        // A zero-length payload is framed as length 4, which reads back
        // as a terminator; producers never emit it as data.
        assert!(read_chunk(&mut src).unwrap().is_none());
        assert!(read_chunk(&mut src).unwrap().is_none());
    }

    #[test]
    fn truncated_chunk_is_malformed() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"will be cut");
        buf.truncate(buf.len() - 3);
        let mut src = MemoryAccess::new(buf);
        let err = read_chunk(&mut src).unwrap_err();
        assert!(matches!(err, BundleError::Malformed { offset: 0, .. }));
    }

    #[test]
    fn missing_length_is_malformed() {
        let mut src = MemoryAccess::new(vec![0u8, 0]);
        assert!(read_chunk(&mut src).is_err());
    }
}
