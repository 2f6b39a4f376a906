//! Round-trip tests: append revisions, reopen from disk, reconstruct
//! and verify everything.

use hg_hash::NodeId;
use hg_revlog::revlog::Revlog;
use hg_revlog::{RevisionGraph, RevlogError, ENTRY_SIZE};
use proptest::prelude::*;

#[test]
fn linear_history_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("file.i");

    let mut versions: Vec<Vec<u8>> = Vec::new();
    {
        let mut revlog = Revlog::open(&path).unwrap();
        let mut parent = NodeId::NULL;
        for i in 0..20u32 {
            let body = format!(
                "line one stays stable\nline two stays stable\nrevision counter {i}\n"
            )
            .repeat(8)
            .into_bytes();
            let (rev, node) = revlog.append(&body, &parent, &NodeId::NULL, i).unwrap();
            assert_eq!(rev, i);
            versions.push(body);
            parent = node;
        }
        revlog.verify(None, None).unwrap();
    }

    let mut reopened = Revlog::open(&path).unwrap();
    assert_eq!(reopened.len(), 20);
    for (rev, expected) in versions.iter().enumerate() {
        let rev = rev as u32;
        assert_eq!(*reopened.content(rev).unwrap(), *expected);
        assert_eq!(reopened.link_rev(rev).unwrap(), rev);
        reopened.verify_node(rev).unwrap();
    }
    let (tip_rev, tip_node) = reopened.tip().unwrap();
    assert_eq!(tip_rev, 19);
    assert_eq!(reopened.rev_of_node(&tip_node).unwrap(), 19);
}

#[test]
fn branching_history_and_graph() {
    let dir = tempfile::tempdir().unwrap();
    let mut revlog = Revlog::open(dir.path().join("branch.i")).unwrap();

    let (_, root) = revlog
        .append(b"common root content\n", &NodeId::NULL, &NodeId::NULL, 0)
        .unwrap();
    let (_, left) = revlog
        .append(b"common root content\nleft branch\n", &root, &NodeId::NULL, 1)
        .unwrap();
    let (_, right) = revlog
        .append(b"common root content\nright branch\n", &root, &NodeId::NULL, 2)
        .unwrap();
    let (merge_rev, _) = revlog
        .append(b"common root content\nmerged\n", &left, &right, 3)
        .unwrap();

    assert_eq!(revlog.parents(merge_rev).unwrap(), (Some(1), Some(2)));
    revlog.verify(None, None).unwrap();

    let graph = RevisionGraph::build(&revlog, None).unwrap();
    assert_eq!(graph.direct_children(0).unwrap(), &[1, 2]);
    assert_eq!(graph.heads(), vec![3]);
    assert!(graph.is_descendant(0, 3).unwrap());
    assert!(!graph.is_descendant(1, 2).unwrap());
    let ancestors: Vec<u32> = graph.ancestors(3).unwrap().collect();
    assert_eq!(ancestors, vec![2, 1, 0]);
}

/// A revision whose base points at a non-adjacent older revision must
/// replay through every link of the chain, not just its parent.
#[test]
fn delta_base_chain_replays_transitively() {
    let dir = tempfile::tempdir().unwrap();
    let mut revlog = Revlog::open(dir.path().join("chain.i")).unwrap();

    // Interleave two lineages so bases skip over unrelated revisions.
    let stem: Vec<u8> = b"padding padding padding padding\n".repeat(30).to_vec();
    let mut line_a = NodeId::NULL;
    let mut line_b = NodeId::NULL;
    let mut expected = Vec::new();
    for i in 0..6u32 {
        let (parent, tag) = if i % 2 == 0 {
            (&mut line_a, "a")
        } else {
            (&mut line_b, "b")
        };
        let mut body = stem.clone();
        body.extend_from_slice(format!("lineage {tag} step {i}\n").as_bytes());
        let (_, node) = revlog.append(&body, parent, &NodeId::NULL, i).unwrap();
        *parent = node;
        expected.push(body);
    }

    // Revision 4's parent (and delta base) is 2, whose base is 0.
    let entry4 = *revlog.entry(4).unwrap();
    assert_eq!(entry4.base_rev, Some(2));
    assert_eq!(revlog.entry(2).unwrap().base_rev, Some(0));

    let mut reopened = Revlog::open(revlog.index_path()).unwrap();
    for (rev, body) in expected.iter().enumerate() {
        assert_eq!(*reopened.content(rev as u32).unwrap(), *body);
    }
    reopened.verify(None, None).unwrap();
}

/// Damage inside a mid-chain revision's stored chunk must break the
/// reconstruction of every later chain member, not just its own.
#[test]
fn corrupt_mid_chain_chunk_fails_later_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("damaged.i");

    let stem: Vec<u8> = b"repeated filler line for compressibility\n".repeat(40).to_vec();
    let (mid_offset, mid_len) = {
        let mut revlog = Revlog::open(&path).unwrap();
        let mut parent = NodeId::NULL;
        for i in 0..3u32 {
            let mut body = stem.clone();
            // A sizeable per-revision segment keeps each stored delta
            // big enough that zlib beats the stored form.
            body.extend_from_slice(format!("appended segment {i}\n").repeat(30).as_bytes());
            let (_, node) = revlog.append(&body, &parent, &NodeId::NULL, i).unwrap();
            parent = node;
        }
        assert_eq!(revlog.entry(1).unwrap().base_rev, Some(0));
        assert_eq!(revlog.entry(2).unwrap().base_rev, Some(1));
        let mid = revlog.entry(1).unwrap();
        (mid.data_offset, mid.compressed_len as usize)
    };

    // Flip a byte in the middle of revision 1's inline zlib chunk.
    let mut bytes = std::fs::read(&path).unwrap();
    let chunk_start = ENTRY_SIZE * 2 + mid_offset as usize;
    assert_eq!(bytes[chunk_start], b'x');
    bytes[chunk_start + mid_len / 2] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let mut reopened = Revlog::open(&path).unwrap();
    assert!(reopened.content(2).is_err());
    assert!(reopened.content(1).is_err());
    // The snapshot before the damage is untouched.
    assert!(reopened.content(0).is_ok());
}

#[test]
fn truncated_index_reports_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trunc.i");
    {
        let mut revlog = Revlog::open(&path).unwrap();
        revlog
            .append(b"some revision content", &NodeId::NULL, &NodeId::NULL, 0)
            .unwrap();
    }
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

    match Revlog::open(&path) {
        Err(RevlogError::Corrupt { .. }) => {}
        other => panic!("expected corruption, got {:?}", other.map(|r| r.len())),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Arbitrary version sequences survive append plus reopen.
    #[test]
    fn arbitrary_histories_roundtrip(
        versions in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..600),
            1..12,
        )
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prop.i");
        let mut appended = Vec::new();
        {
            let mut revlog = Revlog::open(&path).unwrap();
            let mut parent = NodeId::NULL;
            for (i, body) in versions.iter().enumerate() {
                let (rev, node) = revlog
                    .append(body, &parent, &NodeId::NULL, i as u32)
                    .unwrap();
                appended.push((rev, body.clone()));
                parent = node;
            }
        }
        let mut reopened = Revlog::open(&path).unwrap();
        for (rev, body) in appended {
            prop_assert_eq!(&*reopened.content(rev).unwrap(), &body);
            reopened.verify_node(rev).unwrap();
        }
    }
}
