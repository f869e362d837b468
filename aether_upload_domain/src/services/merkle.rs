// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Merkle Tree (RFC 9162)
//!
//! Merkle tree construction over the ordered per-chunk leaf hashes,
//! byte-identical to the reference client implementation:
//!
//! - Leaf hash: `SHA-256(0x00 || chunk_data_bytes)`
//! - Internal node: `SHA-256(0x01 || left || right)`
//! - Odd-node rule: the unpaired last node on any level is promoted
//!   unchanged to the next level (not re-hashed)
//! - Empty tree root: 32 zero bytes (a sentinel, not `SHA-256("")`)
//!
//! The 0x00/0x01 prefixes are the RFC 9162 second-preimage defense: a leaf
//! hash can never be reinterpreted as an internal node, so an attacker
//! cannot splice subtrees.
//!
//! The level-by-level list builder is O(N) memory. At the contract maximum
//! of 200 chunks that is under 7 KiB of 32-byte hashes, so a streaming
//! stack-based builder is not warranted at this cap.

use sha2::{Digest, Sha256};

/// Domain prefix for leaf hashes.
const LEAF_PREFIX: u8 = 0x00;

/// Domain prefix for internal-node hashes.
const NODE_PREFIX: u8 = 0x01;

/// Root of the empty tree.
pub const EMPTY_ROOT: [u8; 32] = [0u8; 32];

/// Computes an RFC 9162 leaf hash: `SHA-256(0x00 || data)`.
pub fn leaf_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = LeafHasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Incremental RFC 9162 leaf hasher for single-pass streaming.
///
/// Equivalent to [`leaf_hash`] over the concatenation of all `update`
/// calls; the assembler uses it to emit leaves without buffering a chunk.
pub struct LeafHasher(Sha256);

impl LeafHasher {
    pub fn new() -> Self {
        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        Self(hasher)
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

impl Default for LeafHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes an RFC 9162 internal-node hash: `SHA-256(0x01 || left || right)`.
pub fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Builds the merkle root over an ordered leaf-hash vector.
///
/// Leaves must already be leaf hashes (the caller applies [`leaf_hash`] to
/// chunk data); this function only folds levels. A single leaf is its own
/// root, not re-hashed.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return EMPTY_ROOT;
    }

    let mut level: Vec<[u8; 32]> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut pairs = level.chunks_exact(2);
        for pair in pairs.by_ref() {
            next.push(node_hash(&pair[0], &pair[1]));
        }
        // Unpaired last node is promoted unchanged.
        if let [odd] = pairs.remainder() {
            next.push(*odd);
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_tree_root_is_zero_sentinel() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);
        // Explicitly not SHA-256 of the empty string.
        let sha_empty: [u8; 32] = Sha256::digest(b"").into();
        assert_ne!(merkle_root(&[]), sha_empty);
    }

    #[test]
    fn test_single_leaf_is_its_own_root() {
        let leaf = leaf_hash(b"chunk0");
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn test_three_leaves_promote_the_odd_node() {
        let l0 = leaf_hash(b"chunk0");
        let l1 = leaf_hash(b"chunk1");
        let l2 = leaf_hash(b"chunk2");
        let expected = node_hash(&node_hash(&l0, &l1), &l2);
        assert_eq!(merkle_root(&[l0, l1, l2]), expected);
    }

    #[test]
    fn test_published_reference_vectors() {
        // Fixed vectors shared with the client-side verifier; any drift
        // here breaks cross-platform interoperability.
        assert_eq!(
            hex::encode(leaf_hash(b"chunk0")),
            "7ef4669c6176c37d30cf30c2eba2a31bd9e48a1830e3cbfe3fc21d3a203715da"
        );
        let leaves = [leaf_hash(b"chunk0"), leaf_hash(b"chunk1"), leaf_hash(b"chunk2")];
        assert_eq!(
            hex::encode(merkle_root(&leaves)),
            "1b7f1b00466cd795f93eed6d9eba814e2036a6aa00043d3f0ce780ca7a1777e7"
        );
    }

    #[test]
    fn test_leaf_and_node_domains_are_separated() {
        // A 64-byte data blob equal to two concatenated hashes must not
        // collide with the internal node over those hashes.
        let l = leaf_hash(b"left");
        let r = leaf_hash(b"right");
        let mut concat = Vec::with_capacity(64);
        concat.extend_from_slice(&l);
        concat.extend_from_slice(&r);
        assert_ne!(leaf_hash(&concat), node_hash(&l, &r));
    }

    #[test]
    fn test_streaming_leaf_hasher_matches_one_shot() {
        let mut hasher = LeafHasher::new();
        hasher.update(b"chu");
        hasher.update(b"nk0");
        assert_eq!(hasher.finalize(), leaf_hash(b"chunk0"));
    }

    #[test]
    fn test_five_leaves_layering() {
        // 5 leaves: ((01)(23))(4) with 4 promoted across two levels.
        let leaves: Vec<[u8; 32]> = (0u8..5).map(|i| leaf_hash(&[i])).collect();
        let n01 = node_hash(&leaves[0], &leaves[1]);
        let n23 = node_hash(&leaves[2], &leaves[3]);
        let n0123 = node_hash(&n01, &n23);
        let expected = node_hash(&n0123, &leaves[4]);
        assert_eq!(merkle_root(&leaves), expected);
    }

    proptest! {
        #[test]
        fn prop_root_is_deterministic(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..32)) {
            let leaves: Vec<[u8; 32]> = chunks.iter().map(|c| leaf_hash(c)).collect();
            prop_assert_eq!(merkle_root(&leaves), merkle_root(&leaves));
        }

        #[test]
        fn prop_any_leaf_change_moves_the_root(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..32),
            victim in any::<prop::sample::Index>(),
        ) {
            let leaves: Vec<[u8; 32]> = chunks.iter().map(|c| leaf_hash(c)).collect();
            let before = merkle_root(&leaves);

            let idx = victim.index(leaves.len());
            let mut mutated = leaves.clone();
            mutated[idx][0] ^= 0xff;
            prop_assert_ne!(before, merkle_root(&mutated));
        }
    }
}
