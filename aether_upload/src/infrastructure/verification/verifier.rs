// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Five-Layer Progressive Verifier
//!
//! Runs after assembly and before job publication, cheapest layer first,
//! fail-fast:
//!
//! - **L5 Structural** (O(1)): declared bundle size vs measured, declared
//!   chunk count vs record count. Zero I/O; values were captured during
//!   assembly.
//! - **L1 Whole-file**: constant-time compare of the assembly digest
//!   against the client-declared bundle hash.
//! - **L2 Chunk chain**: the leaf vector length must equal the chunk
//!   count. Per-chunk digest equality was already enforced inline during
//!   assembly; L2 is the external restatement of that contract.
//! - **L3 Merkle (RFC 9162)**: re-reads chunk files and recomputes leaf
//!   hashes independently of the assembly pass. Full mode re-reads every
//!   chunk and refolds the tree; probabilistic mode (>= 100 chunks)
//!   re-reads a uniform sample of `k = ceil(N(1 - delta^(1/N)))` leaves
//!   and compares each against the assembly-time leaf vector. A subset
//!   root is never computed: the receipt always reports the full-tree root
//!   over the assembly-time leaves.
//! - **L4 Manifest** (reserved): domain-separated manifest rehash;
//!   pass-through in this release, still reported in the receipt for
//!   forward compatibility.
//!
//! Layer failures are logged with the tripping layer; the external
//! response never carries that detail.

use std::sync::Arc;
use std::time::Instant;

use aether_upload_domain::contract::{CONTRACT_VERSION, PROBABILISTIC_DELTA, PROBABILISTIC_MIN_CHUNKS};
use aether_upload_domain::services::merkle::{self, LeafHasher};
use aether_upload_domain::services::verification::{sample_indices, sample_size};
use aether_upload_domain::{
    ChunkRecord, EngineError, UploadSession, VerificationLayer, VerificationMode, VerificationReceipt,
};
use chrono::Utc;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::infrastructure::assembly::{digests_equal, AssemblyResult};
use crate::infrastructure::storage::UploadRoot;

/// Progressive integrity verifier over a freshly assembled bundle.
pub struct IntegrityVerifier {
    root: Arc<UploadRoot>,
}

impl IntegrityVerifier {
    pub fn new(root: Arc<UploadRoot>) -> Self {
        Self { root }
    }

    /// Verifies the assembled bundle against the session contract.
    ///
    /// # Errors
    /// `SizeMismatch` or `IndexGap` from L5, `HashVerificationFailed` from
    /// L1/L2, `MerkleVerificationFailed` from L3, `ChunkReadFailed` when a
    /// sampled chunk cannot be re-read.
    pub async fn verify(
        &self,
        session: &UploadSession,
        assembly: &AssemblyResult,
        chunk_records: &[ChunkRecord],
    ) -> Result<VerificationReceipt, EngineError> {
        let started = Instant::now();
        let chunk_count = session.chunk_count().get();
        let mut layers_passed = Vec::with_capacity(5);

        // L5: structural, zero I/O.
        if assembly.total_bytes != session.bundle_size() {
            return Err(self.fail(
                VerificationLayer::Structural,
                EngineError::SizeMismatch(format!(
                    "measured {} bytes, declared {}",
                    assembly.total_bytes,
                    session.bundle_size()
                )),
            ));
        }
        if chunk_records.len() as u32 != chunk_count {
            return Err(self.fail(
                VerificationLayer::Structural,
                EngineError::IndexGap(format!(
                    "{} chunk records, declared {}",
                    chunk_records.len(),
                    chunk_count
                )),
            ));
        }
        layers_passed.push(VerificationLayer::Structural);

        // L1: whole-file digest, constant time.
        if !digests_equal(assembly.sha256.as_bytes(), session.bundle_hash().as_bytes()) {
            return Err(self.fail(
                VerificationLayer::WholeFile,
                EngineError::HashVerificationFailed("bundle digest does not match the declared hash".to_string()),
            ));
        }
        layers_passed.push(VerificationLayer::WholeFile);

        // L2: chunk chain restatement.
        if assembly.chunk_leaf_hashes.len() as u32 != chunk_count {
            return Err(self.fail(
                VerificationLayer::ChunkChain,
                EngineError::HashVerificationFailed(format!(
                    "{} chunk leaves, declared {}",
                    assembly.chunk_leaf_hashes.len(),
                    chunk_count
                )),
            ));
        }
        layers_passed.push(VerificationLayer::ChunkChain);

        // L3: merkle over independently recomputed leaves. L5 and L1 are
        // always full; only the leaf re-read is sampled.
        let full_root = merkle::merkle_root(&assembly.chunk_leaf_hashes);
        let (mode, sample) = if chunk_count >= PROBABILISTIC_MIN_CHUNKS {
            let k = sample_size(chunk_count, PROBABILISTIC_DELTA);
            let mut rng = rand::rng();
            (VerificationMode::Probabilistic, Some(sample_indices(&mut rng, chunk_count, k)))
        } else {
            (VerificationMode::Full, None)
        };

        match &sample {
            None => {
                let recomputed = self.recompute_leaves(session, chunk_records, None).await?;
                let recomputed_root = merkle::merkle_root(&recomputed);
                if !digests_equal(&recomputed_root, &full_root) {
                    return Err(self.fail(
                        VerificationLayer::MerkleRoot,
                        EngineError::MerkleVerificationFailed(
                            "recomputed merkle root diverges from the assembly-time root".to_string(),
                        ),
                    ));
                }
            }
            Some(indices) => {
                let recomputed = self.recompute_leaves(session, chunk_records, Some(indices)).await?;
                for (leaf, &index) in recomputed.iter().zip(indices) {
                    if !digests_equal(leaf, &assembly.chunk_leaf_hashes[index as usize]) {
                        return Err(self.fail(
                            VerificationLayer::MerkleRoot,
                            EngineError::MerkleVerificationFailed(format!(
                                "sampled leaf {} diverges from the assembly-time leaf",
                                index
                            )),
                        ));
                    }
                }
            }
        }
        layers_passed.push(VerificationLayer::MerkleRoot);

        // L4: reserved manifest layer; pass-through, still reported.
        debug!("manifest layer pass-through");
        layers_passed.push(VerificationLayer::Manifest);

        let elapsed = started.elapsed();
        let receipt = VerificationReceipt {
            bundle_hash: session.bundle_hash().to_hex(),
            verified_at: Utc::now(),
            mode,
            layers_passed,
            merkle_root: hex::encode(full_root),
            chunk_count,
            total_bytes: assembly.total_bytes,
            elapsed_ms: elapsed.as_millis() as u64,
            contract_version: CONTRACT_VERSION.to_string(),
            sample_size: sample.as_ref().map(|s| s.len()),
        };
        info!(
            bundle = %receipt.bundle_hash,
            mode = ?receipt.mode,
            chunk_count,
            elapsed_ms = receipt.elapsed_ms,
            "verification passed"
        );
        Ok(receipt)
    }

    /// Recomputes leaf hashes by re-reading chunk files from disk.
    ///
    /// With `indices = None` every chunk is re-read in order; otherwise
    /// only the sampled indices, returned in the same order as `indices`.
    async fn recompute_leaves(
        &self,
        session: &UploadSession,
        chunk_records: &[ChunkRecord],
        indices: Option<&Vec<u32>>,
    ) -> Result<Vec<[u8; 32]>, EngineError> {
        let selected: Vec<&ChunkRecord> = match indices {
            None => chunk_records.iter().collect(),
            Some(indices) => indices.iter().map(|&i| &chunk_records[i as usize]).collect(),
        };

        let mut leaves = Vec::with_capacity(selected.len());
        let mut buf = vec![0u8; aether_upload_domain::contract::HASH_STREAM_CHUNK_BYTES];
        for record in selected {
            let path = self.root.chunk_file(session.id(), record.chunk_index());
            let mut file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| EngineError::ChunkReadFailed(format!("cannot re-read chunk for verification: {}", e)))?;
            let mut hasher = LeafHasher::new();
            loop {
                let n = file
                    .read(&mut buf)
                    .await
                    .map_err(|e| EngineError::ChunkReadFailed(format!("verification read failed: {}", e)))?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            leaves.push(hasher.finalize());
        }
        Ok(leaves)
    }

    /// Logs the tripping layer and passes the error through unchanged.
    fn fail(&self, layer: VerificationLayer, err: EngineError) -> EngineError {
        warn!(layer = ?layer, kind = err.category(), "verification layer failed: {}", err);
        err
    }
}
