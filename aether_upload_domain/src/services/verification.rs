// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Verification Model
//!
//! Value types and pure math for the five-layer progressive verifier. The
//! verifier itself lives in the infrastructure layer (it touches disk and
//! records); what belongs to the domain is the contract: layer identities,
//! the receipt shape emitted on success, and the sampling formula for
//! probabilistic mode.
//!
//! ## Sampling formula (normative)
//!
//! For a bundle of `N` chunks and acceptable miss probability `delta`, the
//! sample size is `k = ceil(N * (1 - delta^(1/N)))`, which guarantees
//! detection probability at least `1 - delta` against a single corrupted
//! chunk under uniform sampling without replacement.

use chrono::{DateTime, Utc};
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How the verifier covered the chunk chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMode {
    Full,
    Probabilistic,
}

/// The five verification layers, in execution order (cheapest first).
///
/// Layer numbering follows the contract: L5 structural runs first because
/// it is O(1), then L1 whole-file, L2 chunk chain, L3 merkle, L4 manifest
/// (reserved pass-through in this release, still reported in the receipt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLayer {
    Structural,
    WholeFile,
    ChunkChain,
    MerkleRoot,
    Manifest,
}

impl VerificationLayer {
    /// Execution order, cheapest first.
    pub fn execution_order() -> [VerificationLayer; 5] {
        [
            VerificationLayer::Structural,
            VerificationLayer::WholeFile,
            VerificationLayer::ChunkChain,
            VerificationLayer::MerkleRoot,
            VerificationLayer::Manifest,
        ]
    }
}

/// Audit receipt emitted when all layers pass.
///
/// The receipt is for logging and audit only. The external response must
/// not expose per-layer information; callers log the receipt and return the
/// collapsed success shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReceipt {
    pub bundle_hash: String,
    pub verified_at: DateTime<Utc>,
    pub mode: VerificationMode,
    pub layers_passed: Vec<VerificationLayer>,
    pub merkle_root: String,
    pub chunk_count: u32,
    pub total_bytes: u64,
    pub elapsed_ms: u64,
    pub contract_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<usize>,
}

/// Computes the normative sample size `ceil(N * (1 - delta^(1/N)))`.
///
/// Reference point: `N = 1000, delta = 1e-3` gives `k = 7`. Returns 0 for
/// an empty bundle (nothing to sample).
pub fn sample_size(chunk_count: u32, delta: f64) -> usize {
    if chunk_count == 0 {
        return 0;
    }
    let n = f64::from(chunk_count);
    let k = (n * (1.0 - delta.powf(1.0 / n))).ceil() as usize;
    // Sampling more leaves than exist degenerates to full coverage.
    k.min(chunk_count as usize)
}

/// Draws `k` distinct chunk indices uniformly without replacement.
pub fn sample_indices<R: Rng + ?Sized>(rng: &mut R, chunk_count: u32, k: usize) -> Vec<u32> {
    let mut picked: Vec<u32> = sample(rng, chunk_count as usize, k.min(chunk_count as usize))
        .into_iter()
        .map(|i| i as u32)
        .collect();
    picked.sort_unstable();
    picked
}
