// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Single-Pass Bundle Assembler
//!
//! Materializes a session's chunks into one content-addressed bundle file
//! in a single streaming pass that simultaneously:
//!
//! - (a) updates the whole-bundle SHA-256
//! - (b) updates a per-chunk SHA-256 re-verified against the database
//!   record, plus the RFC 9162 leaf hash emitted for the verifier
//! - (c) coalesces writes into a buffer flushed to the bundle descriptor
//!   once it reaches `ASSEMBLY_BUFFER_BYTES`
//!
//! Memory footprint is O(buffer sizes), independent of bundle size. The
//! read buffer (`HASH_STREAM_CHUNK_BYTES`, 256 KiB) keeps hardware SHA-256
//! saturated; the 1 MiB coalescing buffer batches write syscalls by about
//! 4x without memory pressure.
//!
//! ## Staging isolation
//!
//! The in-flight file lives at
//! `<upload_root>/<upload_id>/assembly/<hash>.bundle.assembling`, never in
//! the content-addressed directory, so the root only ever holds complete,
//! verified bundles. Commit is rename + parent-directory fsync; on failure
//! the staging file is simply left behind for the cleanup sweeps.
//!
//! ## State machine
//!
//! `PENDING → ASSEMBLING → {HASHING → {COMPLETED, FAILED}, FAILED}`, with
//! `FAILED → RECOVERED → ASSEMBLING` driven by a client retry of
//! completion. The state is implicit in on-disk artifacts (`*.assembling`
//! in flight, `*.bundle` committed) and is not persisted separately.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use aether_upload_bootstrap::Platform;
use aether_upload_domain::contract::{ASSEMBLY_BUFFER_BYTES, ASSEMBLY_STAGE_TIMEOUT_SECS, HASH_STREAM_CHUNK_BYTES};
use aether_upload_domain::services::merkle::LeafHasher;
use aether_upload_domain::value_objects::BundleHash;
use aether_upload_domain::{ChunkRecord, EngineError, UploadSession};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::chunk_writer::digests_equal;
use crate::infrastructure::storage::{DiskQuotaGate, UploadRoot};

/// Implicit assembly lifecycle, readable off the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// No staging artifact yet.
    Pending,
    /// Streaming chunks into the staging file.
    Assembling,
    /// Digest finalization and commit rename.
    Hashing,
    /// Bundle file committed; terminal.
    Completed,
    /// Staging left behind; swept by cleanup.
    Failed,
    /// A retry observed stale staging and restarts the stream.
    Recovered,
}

/// Outcome of a successful assembly pass.
#[derive(Debug, Clone)]
pub struct AssemblyResult {
    pub bundle_path: PathBuf,
    pub sha256: BundleHash,
    pub total_bytes: u64,
    pub chunk_leaf_hashes: Vec<[u8; 32]>,
    pub elapsed: Duration,
}

/// Streams session chunks into a durable content-addressed bundle.
pub struct BundleAssembler {
    root: Arc<UploadRoot>,
    platform: Arc<dyn Platform>,
    quota: Arc<DiskQuotaGate>,
}

impl BundleAssembler {
    pub fn new(root: Arc<UploadRoot>, platform: Arc<dyn Platform>, quota: Arc<DiskQuotaGate>) -> Self {
        Self { root, platform, quota }
    }

    /// Assembles the session's chunks into `<upload_root>/<hash>.bundle`.
    ///
    /// `chunk_records` must be the full set from the database ordered by
    /// `chunk_index`; contiguity and count are re-checked here regardless.
    ///
    /// # Errors
    /// `IndexGap`, `SizeMismatch`, `ChunkMissing`, `ChunkHashMismatch`,
    /// `AssemblyIo`, `DiskQuotaExceeded`, `PathEscape`.
    pub async fn assemble(
        &self,
        session: &UploadSession,
        chunk_records: &[ChunkRecord],
    ) -> Result<AssemblyResult, EngineError> {
        let started = Instant::now();
        self.quota.check_write_allowed()?;
        self.verify_contiguity(session, chunk_records)?;

        let staging_path = self.root.staging_file(session.id(), session.bundle_hash());
        let bundle_path = self.root.bundle_file(session.bundle_hash());
        if !self.root.contains(&staging_path) || !self.root.contains(&bundle_path) {
            return Err(EngineError::path_escape(format!("assembly paths for {}", session.id())));
        }

        // A leftover staging file from a failed attempt is restarted from
        // scratch; O_TRUNC below makes the recovery implicit.
        if tokio::fs::try_exists(&staging_path).await.unwrap_or(false) {
            debug!(state = ?AssemblyState::Recovered, upload_id = %session.id(), "restarting over stale staging");
        }

        let assembly_dir = self.root.assembly_dir(session.id());
        tokio::fs::create_dir_all(&assembly_dir)
            .await
            .map_err(|e| EngineError::AssemblyIo(format!("cannot create assembly dir: {}", e)))?;

        debug!(state = ?AssemblyState::Assembling, upload_id = %session.id(), chunks = chunk_records.len(), "assembly started");

        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging_path)
            .await
            .map_err(|e| EngineError::AssemblyIo(format!("cannot open staging file: {}", e)))?;

        let mut bundle_hasher = Sha256::new();
        let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(chunk_records.len());
        let mut write_buf: Vec<u8> = Vec::with_capacity(ASSEMBLY_BUFFER_BYTES);
        let mut read_buf = vec![0u8; HASH_STREAM_CHUNK_BYTES];
        let mut total_bytes: u64 = 0;

        for record in chunk_records {
            let chunk_path = self.root.chunk_file(session.id(), record.chunk_index());
            let mut chunk_file = match tokio::fs::File::open(&chunk_path).await {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(EngineError::ChunkMissing(format!(
                        "chunk file {} is absent",
                        record.chunk_index().file_stem()
                    )));
                }
                Err(e) => {
                    return Err(EngineError::ChunkReadFailed(format!(
                        "cannot open chunk {}: {}",
                        record.chunk_index().file_stem(),
                        e
                    )));
                }
            };

            let mut chunk_hasher = Sha256::new();
            let mut leaf_hasher = LeafHasher::new();
            let mut chunk_bytes: u64 = 0;

            loop {
                let n = chunk_file
                    .read(&mut read_buf)
                    .await
                    .map_err(|e| EngineError::ChunkReadFailed(format!("read failed: {}", e)))?;
                if n == 0 {
                    break;
                }
                let slice = &read_buf[..n];
                bundle_hasher.update(slice);
                chunk_hasher.update(slice);
                leaf_hasher.update(slice);
                chunk_bytes += n as u64;

                write_buf.extend_from_slice(slice);
                if write_buf.len() >= ASSEMBLY_BUFFER_BYTES {
                    out.write_all(&write_buf)
                        .await
                        .map_err(|e| EngineError::AssemblyIo(format!("bundle write failed: {}", e)))?;
                    write_buf.clear();
                }
            }

            if chunk_bytes != record.size_bytes() {
                return Err(EngineError::SizeMismatch(format!(
                    "chunk {} is {} bytes on disk, {} in the record",
                    record.chunk_index().file_stem(),
                    chunk_bytes,
                    record.size_bytes()
                )));
            }

            let digest: [u8; 32] = chunk_hasher.finalize().into();
            if !digests_equal(&digest, record.chunk_hash().as_bytes()) {
                return Err(EngineError::ChunkHashMismatch(format!(
                    "chunk {} diverged from its recorded hash during assembly",
                    record.chunk_index().file_stem()
                )));
            }
            leaves.push(leaf_hasher.finalize());
            total_bytes += chunk_bytes;
        }

        debug!(state = ?AssemblyState::Hashing, upload_id = %session.id(), "finalizing digests and committing");

        if !write_buf.is_empty() {
            out.write_all(&write_buf)
                .await
                .map_err(|e| EngineError::AssemblyIo(format!("bundle write failed: {}", e)))?;
        }
        if total_bytes != session.bundle_size() {
            return Err(EngineError::SizeMismatch(format!(
                "assembled {} bytes, session declared {}",
                total_bytes,
                session.bundle_size()
            )));
        }

        self.platform
            .sync_file(&out)
            .await
            .map_err(|e| EngineError::AssemblyIo(format!("bundle fsync failed: {}", e)))?;
        drop(out);

        tokio::fs::rename(&staging_path, &bundle_path)
            .await
            .map_err(|e| EngineError::AssemblyIo(format!("bundle commit rename failed: {}", e)))?;
        self.platform
            .sync_dir(self.root.path())
            .await
            .map_err(|e| EngineError::AssemblyIo(format!("bundle dir fsync failed: {}", e)))?;

        let sha256 = BundleHash::from_digest(bundle_hasher.finalize().into());
        let elapsed = started.elapsed();
        if elapsed.as_secs() >= ASSEMBLY_STAGE_TIMEOUT_SECS {
            // Alarm, not a guarantee: flag pathologically slow storage
            // without masking a hung process behind a hard kill.
            warn!(
                upload_id = %session.id(),
                elapsed_ms = elapsed.as_millis() as u64,
                "assembly exceeded the stage alarm threshold"
            );
        }
        info!(
            state = ?AssemblyState::Completed,
            upload_id = %session.id(),
            bundle = %sha256,
            bytes = total_bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "bundle assembled"
        );

        Ok(AssemblyResult {
            bundle_path,
            sha256,
            total_bytes,
            chunk_leaf_hashes: leaves,
            elapsed,
        })
    }

    /// Re-checks contiguity, count, and declared size closure.
    fn verify_contiguity(&self, session: &UploadSession, records: &[ChunkRecord]) -> Result<(), EngineError> {
        let expected = session.chunk_count().get();
        if records.len() as u32 != expected {
            return Err(EngineError::IndexGap(format!(
                "{} chunk records for a {}-chunk session",
                records.len(),
                expected
            )));
        }
        for (i, record) in records.iter().enumerate() {
            if record.chunk_index().get() != i as u32 {
                return Err(EngineError::IndexGap(format!(
                    "expected index {} at position {}, found {}",
                    i,
                    i,
                    record.chunk_index()
                )));
            }
        }
        let declared_sum: u64 = records.iter().map(|r| r.size_bytes()).sum();
        if declared_sum != session.bundle_size() {
            return Err(EngineError::SizeMismatch(format!(
                "chunk records sum to {} bytes, session declared {}",
                declared_sum,
                session.bundle_size()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_upload_bootstrap::create_platform;
    use aether_upload_domain::services::merkle;
    use aether_upload_domain::value_objects::{ChunkCount, ChunkIndex, UserId};
    use chrono::Utc;

    struct Fixture {
        _guard: tempfile::TempDir,
        root: Arc<UploadRoot>,
        assembler: BundleAssembler,
    }

    async fn fixture() -> Fixture {
        let guard = tempfile::tempdir().unwrap();
        let root = Arc::new(UploadRoot::open(guard.path()).await.unwrap());
        let platform: Arc<dyn Platform> = Arc::from(create_platform());
        let quota = Arc::new(DiskQuotaGate::new(
            platform.clone(),
            root.path().to_path_buf(),
            1.01,
            1.01,
        ));
        let assembler = BundleAssembler::new(root.clone(), platform, quota);
        Fixture {
            _guard: guard,
            root,
            assembler,
        }
    }

    async fn seed_session(root: &UploadRoot, chunks: &[&[u8]]) -> (UploadSession, Vec<ChunkRecord>) {
        let count = ChunkCount::new(chunks.len() as u32).unwrap();
        let bundle_bytes: Vec<u8> = chunks.concat();
        let session = UploadSession::new(
            UserId::new("tester").unwrap(),
            "capture".to_string(),
            BundleHash::digest(&bundle_bytes),
            bundle_bytes.len() as u64,
            count,
            Utc::now(),
        );

        let chunks_dir = root.chunks_dir(session.id());
        tokio::fs::create_dir_all(&chunks_dir).await.unwrap();

        let mut records = Vec::new();
        for (i, data) in chunks.iter().enumerate() {
            let index = ChunkIndex::new(i as u32, count).unwrap();
            tokio::fs::write(root.chunk_file(session.id(), index), data).await.unwrap();
            records.push(ChunkRecord::new(
                session.id().clone(),
                index,
                BundleHash::digest(data),
                data.len() as u64,
                Utc::now(),
            ));
        }
        (session, records)
    }

    #[tokio::test]
    async fn test_assembles_bundle_with_matching_digest_and_leaves() {
        let fx = fixture().await;
        let chunks: Vec<&[u8]> = vec![b"chunk0", b"chunk1", b"chunk2"];
        let (session, records) = seed_session(&fx.root, &chunks).await;

        let result = fx.assembler.assemble(&session, &records).await.unwrap();

        assert_eq!(&result.sha256, session.bundle_hash());
        assert_eq!(result.total_bytes, session.bundle_size());
        assert_eq!(result.bundle_path, fx.root.bundle_file(session.bundle_hash()));
        let on_disk = tokio::fs::read(&result.bundle_path).await.unwrap();
        assert_eq!(on_disk, chunks.concat());

        // Leaves match the one-shot definition, in index order.
        let expected: Vec<[u8; 32]> = chunks.iter().map(|c| merkle::leaf_hash(c)).collect();
        assert_eq!(result.chunk_leaf_hashes, expected);

        // No staging residue after commit.
        assert!(!fx.root.staging_file(session.id(), session.bundle_hash()).exists());
    }

    #[tokio::test]
    async fn test_index_gap_detected() {
        let fx = fixture().await;
        let (session, mut records) = seed_session(&fx.root, &[b"aaaa", b"bbbb", b"cccc"]).await;
        records.remove(1);

        let err = fx.assembler.assemble(&session, &records).await.unwrap_err();
        assert!(matches!(err, EngineError::IndexGap(_)));
    }

    #[tokio::test]
    async fn test_missing_chunk_file_detected() {
        let fx = fixture().await;
        let (session, records) = seed_session(&fx.root, &[b"aaaa", b"bbbb"]).await;
        tokio::fs::remove_file(fx.root.chunk_file(session.id(), records[1].chunk_index()))
            .await
            .unwrap();

        let err = fx.assembler.assemble(&session, &records).await.unwrap_err();
        assert!(matches!(err, EngineError::ChunkMissing(_)));
    }

    #[tokio::test]
    async fn test_tampered_chunk_detected_and_no_bundle_committed() {
        let fx = fixture().await;
        let (session, records) = seed_session(&fx.root, &[b"aaaa", b"bbbb"]).await;
        tokio::fs::write(fx.root.chunk_file(session.id(), records[1].chunk_index()), b"BBBB")
            .await
            .unwrap();

        let err = fx.assembler.assemble(&session, &records).await.unwrap_err();
        assert!(matches!(err, EngineError::ChunkHashMismatch(_)));
        assert!(!fx.root.bundle_file(session.bundle_hash()).exists());
    }

    #[tokio::test]
    async fn test_size_mismatch_against_declared_bundle_size() {
        let fx = fixture().await;
        let (session, records) = seed_session(&fx.root, &[b"aaaa", b"bbbb"]).await;
        // Grow chunk 0 on disk; record and declared size stay stale.
        tokio::fs::write(
            fx.root.chunk_file(session.id(), records[0].chunk_index()),
            b"aaaa-grown",
        )
        .await
        .unwrap();

        let err = fx.assembler.assemble(&session, &records).await.unwrap_err();
        assert!(matches!(err, EngineError::SizeMismatch(_)));
    }
}
