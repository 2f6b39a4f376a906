//! Store filename encoding.
//!
//! Store files must survive case-insensitive filesystems and shells
//! hostile to control characters, so tracked paths are rewritten before
//! they name revlogs under `.hg/store/data`:
//!
//! - uppercase ASCII is folded to `_` + lowercase (`Makefile` becomes
//!   `_makefile`),
//! - a literal `_` doubles to `__` so folding stays reversible,
//! - control bytes, high bytes, and characters Windows rejects are
//!   hex-escaped as `~xx`.

/// Bytes Windows filesystems refuse in names.
const RESERVED: &[u8] = b"\\:*?\"<>|";

fn needs_hex_escape(b: u8) -> bool {
    b < 0x20 || b >= 0x7f || RESERVED.contains(&b)
}

/// Encode one tracked path for use as a store filename.
pub fn encode_filename(path: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(path.len());
    for &b in path {
        match b {
            b'A'..=b'Z' => {
                out.push(b'_');
                out.push(b.to_ascii_lowercase());
            }
            b'_' => out.extend_from_slice(b"__"),
            _ if needs_hex_escape(b) => {
                out.push(b'~');
                out.extend_from_slice(format!("{b:02x}").as_bytes());
            }
            _ => out.push(b),
        }
    }
    out
}

/// Decode a store filename back to the tracked path. Returns `None`
/// for names that are not valid encodings.
pub fn decode_filename(encoded: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len());
    let mut iter = encoded.iter();
    while let Some(&b) = iter.next() {
        match b {
            b'_' => match iter.next()? {
                b'_' => out.push(b'_'),
                &c @ b'a'..=b'z' => out.push(c.to_ascii_uppercase()),
                _ => return None,
            },
            b'~' => {
                let hi = hex_value(*iter.next()?)?;
                let lo = hex_value(*iter.next()?)?;
                out.push(hi << 4 | lo);
            }
            _ => out.push(b),
        }
    }
    Some(out)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercase_is_folded() {
        assert_eq!(encode_filename(b"Makefile"), b"_makefile");
        assert_eq!(encode_filename(b"README.TXT"), b"_r_e_a_d_m_e._t_x_t");
    }

    #[test]
    fn underscore_doubles() {
        assert_eq!(encode_filename(b"foo_bar"), b"foo__bar");
        assert_eq!(encode_filename(b"_Leading"), b"___leading");
    }

    #[test]
    fn reserved_bytes_are_hex_escaped() {
        assert_eq!(encode_filename(b"a:b"), b"a~3ab");
        assert_eq!(encode_filename(b"q?"), b"q~3f");
        assert_eq!(encode_filename(b"tab\there"), b"tab~09here");
        assert_eq!(encode_filename(b"caf\xe9"), b"caf~e9");
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(encode_filename(b"src/main.rs"), b"src/main.rs");
    }

    #[test]
    fn roundtrip() {
        let cases: &[&[u8]] = &[
            b"src/main.rs",
            b"Makefile",
            b"foo_bar_BAZ",
            b"weird:\\name?",
            b"caf\xe9/_Und_er",
        ];
        for case in cases {
            let encoded = encode_filename(case);
            assert_eq!(decode_filename(&encoded).unwrap(), *case, "case {case:?}");
        }
    }

    #[test]
    fn invalid_encodings_decode_to_none() {
        assert!(decode_filename(b"_1bad").is_none());
        assert!(decode_filename(b"trail_").is_none());
        assert!(decode_filename(b"~zz").is_none());
    }
}
