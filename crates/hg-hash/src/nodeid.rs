use std::fmt;
use std::str::FromStr;

use digest::Digest;
use sha1::Sha1;

use crate::hex::{hex_decode, hex_to_string};
use crate::HashError;

/// Length of a nodeid in bytes.
pub const NODE_LEN: usize = 20;

/// Length of a hex-encoded nodeid.
pub const NODE_HEX_LEN: usize = 40;

/// A Mercurial nodeid — the SHA-1 hash identifying one revision.
///
/// The hash covers the revision's two parent nodeids (concatenated in
/// sorted byte order) followed by the final reconstructed content. It is
/// never a hash of the stored delta, so a nodeid is reproducible from
/// content and parents alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; NODE_LEN]);

impl NodeId {
    /// The null nodeid (all zeros), standing in for a missing parent.
    pub const NULL: Self = Self([0u8; NODE_LEN]);

    /// Create a NodeId from exactly 20 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != NODE_LEN {
            return Err(HashError::InvalidNodeLength {
                expected: NODE_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; NODE_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Create a NodeId from a 40-character hex string (bytes accepted).
    pub fn from_hex(hex: &[u8]) -> Result<Self, HashError> {
        let mut bytes = [0u8; NODE_LEN];
        hex_decode(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Compute the nodeid for a revision from its parents and content.
    ///
    /// The two parent nodeids are fed to SHA-1 in sorted byte order (the
    /// smaller first), then the full reconstructed content. This matches
    /// the on-disk hashing rule of the original tool bit for bit; when
    /// one parent is null the sort puts it first.
    pub fn for_content(p1: &NodeId, p2: &NodeId, content: &[u8]) -> Self {
        let (lo, hi) = if p1.0 <= p2.0 { (p1, p2) } else { (p2, p1) };
        let mut h = Sha1::new();
        h.update(lo.0);
        h.update(hi.0);
        h.update(content);
        let digest = h.finalize();
        let mut arr = [0u8; NODE_LEN];
        arr.copy_from_slice(&digest);
        Self(arr)
    }

    /// Get the raw bytes of the nodeid.
    pub fn as_bytes(&self) -> &[u8; NODE_LEN] {
        &self.0
    }

    /// Check if this is the null (all-zeros) nodeid.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Get the hex string representation (lowercase).
    pub fn to_hex(&self) -> String {
        hex_to_string(&self.0)
    }

    /// The conventional 12-character short form used in user output.
    pub fn short_hex(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", &self.to_hex()[..8])
    }
}

impl FromStr for NodeId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE_HEX: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn from_hex_roundtrip() {
        let node = NodeId::from_hex(SAMPLE_HEX.as_bytes()).unwrap();
        assert_eq!(node.to_hex(), SAMPLE_HEX);
        let parsed: NodeId = SAMPLE_HEX.parse().unwrap();
        assert_eq!(parsed, node);
    }

    #[test]
    fn debug_shows_short_hash() {
        let node = NodeId::from_hex(SAMPLE_HEX.as_bytes()).unwrap();
        assert_eq!(format!("{:?}", node), "NodeId(da39a3ee)");
    }

    #[test]
    fn short_hex_is_twelve_chars() {
        let node = NodeId::from_hex(SAMPLE_HEX.as_bytes()).unwrap();
        assert_eq!(node.short_hex(), &SAMPLE_HEX[..12]);
    }

    #[test]
    fn null_node() {
        assert!(NodeId::NULL.is_null());
        let non_null = NodeId::from_hex(SAMPLE_HEX.as_bytes()).unwrap();
        assert!(!non_null.is_null());
    }

    #[test]
    fn from_bytes_wrong_length() {
        let err = NodeId::from_bytes(&[0; 10]).unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidNodeLength { expected: 20, actual: 10 }
        ));
    }

    #[test]
    fn invalid_hex_chars() {
        let err = NodeId::from_hex(b"zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").unwrap_err();
        assert!(matches!(err, HashError::InvalidHex { .. }));
    }

    #[test]
    fn hashmap_key() {
        let node = NodeId::from_hex(SAMPLE_HEX.as_bytes()).unwrap();
        let mut map = HashMap::new();
        map.insert(node, "value");
        assert_eq!(map.get(&node), Some(&"value"));
    }

    #[test]
    fn content_hash_is_parent_order_independent() {
        let a = NodeId::from_hex(b"0000000000000000000000000000000000000001").unwrap();
        let b = NodeId::from_hex(b"0000000000000000000000000000000000000002").unwrap();
        let forward = NodeId::for_content(&a, &b, b"data");
        let reverse = NodeId::for_content(&b, &a, b"data");
        assert_eq!(forward, reverse);
    }

    #[test]
    fn content_hash_depends_on_content_and_parents() {
        let p = NodeId::from_hex(b"0000000000000000000000000000000000000001").unwrap();
        let base = NodeId::for_content(&p, &NodeId::NULL, b"data");
        assert_ne!(base, NodeId::for_content(&p, &NodeId::NULL, b"other"));
        assert_ne!(base, NodeId::for_content(&NodeId::NULL, &NodeId::NULL, b"data"));
    }

    #[test]
    fn root_revision_hash_matches_known_value() {
        // SHA-1 of 40 zero bytes followed by empty content.
        let node = NodeId::for_content(&NodeId::NULL, &NodeId::NULL, b"");
        assert_eq!(node.to_hex(), sha1_of_40_zeros_hex());
    }

    fn sha1_of_40_zeros_hex() -> String {
        use digest::Digest;
        let mut h = sha1::Sha1::new();
        h.update([0u8; 40]);
        crate::hex::hex_to_string(&h.finalize())
    }
}
