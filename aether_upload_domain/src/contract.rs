// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Contract Constants
//!
//! Single source of truth for the normative byte layouts, thresholds, and
//! domain-separation tags of the upload engine. These values are part of the
//! wire and on-disk contract shared with client-side verification code and
//! must not change without a contract version bump.
//!
//! ## Overview
//!
//! Three families of constants live here:
//!
//! - **Upload limits**: chunk payload size, bundle size, chunk count, and
//!   session expiry, enforced by the orchestrator before any byte touches
//!   disk
//! - **Pipeline tuning**: read and write-coalescing buffer sizes and the
//!   disk-usage thresholds consulted by every mutating operation
//! - **Domain-separation tags**: NUL-terminated byte strings prefixed to
//!   hashed material so that no digest computed in one context can be
//!   replayed in another
//!
//! The tag byte sequences are normative and reproduced bit-exactly by the
//! reference client; changing them breaks cross-platform verification.

use sha2::{Digest, Sha256};

/// Contract version reported in verification receipts.
pub const CONTRACT_VERSION: &str = "PR3-API-2.0";

// === Upload limits ===

/// Maximum chunk payload accepted by `upload_chunk` (5 MiB).
pub const CHUNK_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Maximum declared bundle size (500 MiB).
pub const MAX_BUNDLE_SIZE_BYTES: u64 = 500 * 1024 * 1024;

/// Maximum number of chunks per bundle.
pub const MAX_CHUNK_COUNT: u32 = 200;

/// Upload session hard expiry.
pub const UPLOAD_EXPIRY_HOURS: i64 = 24;

/// Per-user cap on concurrently in-progress upload sessions.
pub const MAX_ACTIVE_UPLOADS_PER_USER: u32 = 1;

/// The only capture source accepted by `create_session`.
pub const CAPTURE_SOURCE_CAMERA: &str = "aether_camera";

// === Assembly pipeline tuning ===

/// Read/hash buffer used by the single-pass assembler (256 KiB).
///
/// Sized to keep hardware SHA-256 saturated without measurable syscall
/// overhead per buffer.
pub const HASH_STREAM_CHUNK_BYTES: usize = 256 * 1024;

/// Write-coalescing buffer flushed to the bundle descriptor (1 MiB).
pub const ASSEMBLY_BUFFER_BYTES: usize = 1024 * 1024;

/// Alarm threshold for a single bundle assembly (60x nominal).
pub const ASSEMBLY_STAGE_TIMEOUT_SECS: u64 = 60;

// === Cleanup retention ===

/// Orphan directories older than this are reaped by the global sweep.
/// Twice the session expiry so an expired-but-unswept session is never
/// racing its own cleanup.
pub const ORPHAN_RETENTION_HOURS: i64 = 48;

/// Residual `.assembling` staging files older than this are deleted.
pub const ASSEMBLING_MAX_AGE_HOURS: i64 = 2;

// === Disk quota thresholds ===

/// Reject new writes when used/total reaches this ratio.
pub const DISK_USAGE_REJECT_THRESHOLD: f64 = 0.85;

/// Refuse everything but reads (including cleanup temp space) at this ratio.
pub const DISK_USAGE_EMERGENCY_THRESHOLD: f64 = 0.95;

// === Probabilistic verification ===

/// Minimum chunk count before sampled verification is considered.
pub const PROBABILISTIC_MIN_CHUNKS: u32 = 100;

/// Acceptable miss probability for sampled verification (99.9% detection).
pub const PROBABILISTIC_DELTA: f64 = 0.001;

// === On-disk layout ===

/// Final chunk file extension.
pub const CHUNK_FILE_SUFFIX: &str = ".chunk";

/// Transient chunk file extension; must never be observed by readers.
pub const CHUNK_TMP_SUFFIX: &str = ".chunk.tmp";

/// Final content-addressed bundle extension.
pub const BUNDLE_FILE_SUFFIX: &str = ".bundle";

/// Transient assembly staging extension.
pub const BUNDLE_ASSEMBLING_SUFFIX: &str = ".bundle.assembling";

// === Domain separation ===
//
// Each tag is NUL-terminated so no tag is a prefix of another.

/// Tag for whole-bundle digests (22 bytes).
pub const DOMAIN_TAG_BUNDLE: &[u8] = b"aether.bundle.hash.v1\0";

/// Tag for manifest digests (26 bytes).
pub const DOMAIN_TAG_MANIFEST: &[u8] = b"aether.bundle.manifest.v1\0";

/// Tag for context digests (25 bytes).
pub const DOMAIN_TAG_CONTEXT: &[u8] = b"aether.bundle.context.v1\0";

/// Computes `SHA-256(tag || data)`.
pub fn tagged_digest(tag: &[u8], data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    hasher.update(data);
    hasher.finalize().into()
}
