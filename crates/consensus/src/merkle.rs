//! Merkle inclusion proofs for the spectrum and universe trees

use lrv_wire::{Crypto, Digest};

/// Recompute the root of a tree from a leaf, its index and the sibling path.
///
/// At every level the index parity decides whether the running digest is the
/// left (even) or right (odd) child.
pub fn merkle_root(crypto: &dyn Crypto, leaf: &[u8], index: u32, siblings: &[Digest]) -> Digest {
    let mut root = crypto.digest(leaf);
    let mut index = index;
    let mut pair = [0u8; 64];

    for sibling in siblings {
        if index & 1 == 1 {
            pair[..32].copy_from_slice(sibling);
            pair[32..].copy_from_slice(&root);
        } else {
            pair[..32].copy_from_slice(&root);
            pair[32..].copy_from_slice(sibling);
        }
        root = crypto.digest(&pair);
        index >>= 1;
    }

    root
}

/// Check a proof against a confirmed root. An all-zero sibling path is a
/// placeholder from a node that has no proof and never verifies.
pub fn verify_inclusion(
    crypto: &dyn Crypto,
    leaf: &[u8],
    index: u32,
    siblings: &[Digest],
    expected_root: &Digest,
) -> bool {
    if siblings.iter().all(|s| *s == [0u8; 32]) {
        return false;
    }
    merkle_root(crypto, leaf, index, siblings) == *expected_root
}
