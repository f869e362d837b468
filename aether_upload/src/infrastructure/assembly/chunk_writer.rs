// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Atomic Chunk Writer
//!
//! Persists one chunk payload with the only provably durable pattern on
//! POSIX:
//!
//! 1. open `O_WRONLY|O_CREAT|O_TRUNC` on `<stem>.chunk.tmp`
//! 2. write the payload
//! 3. data fsync (`F_FULLFSYNC` on macOS via the platform layer)
//! 4. close
//! 5. compare written size to declared size; unlink the tmp on mismatch
//! 6. rename tmp → `<stem>.chunk` (atomic on the same filesystem)
//! 7. fsync the containing directory to persist the rename
//!
//! Steps 3 and 7 are non-optional: omitting either admits durable partial
//! state after power loss. Clients can never observe a `*.tmp` as a chunk;
//! readers only ever look for the final name.
//!
//! The declared hash is verified against the payload before any byte
//! touches disk, with a constant-time comparison.

use std::path::PathBuf;
use std::sync::Arc;

use aether_upload_bootstrap::Platform;
use aether_upload_domain::value_objects::{BundleHash, ChunkIndex, UploadId};
use aether_upload_domain::EngineError;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::infrastructure::storage::{DiskQuotaGate, UploadRoot};

/// Constant-time digest equality via ring.
pub(crate) fn digests_equal(a: &[u8; 32], b: &[u8; 32]) -> bool {
    ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}

/// Writes chunk payloads durably under the upload root.
pub struct ChunkWriter {
    root: Arc<UploadRoot>,
    platform: Arc<dyn Platform>,
    quota: Arc<DiskQuotaGate>,
}

impl ChunkWriter {
    pub fn new(root: Arc<UploadRoot>, platform: Arc<dyn Platform>, quota: Arc<DiskQuotaGate>) -> Self {
        Self { root, platform, quota }
    }

    /// Persists one chunk with the atomic write protocol.
    ///
    /// On success the final chunk file exists and is durable on device.
    ///
    /// # Errors
    /// - `ChunkHashMismatch` when the payload does not hash to
    ///   `expected_hash`
    /// - `DiskQuotaExceeded` when the quota gate rejects the write
    /// - `ChunkWriteFailed` when the post-write size check or any write
    ///   step fails
    /// - `PathEscape` when the resolved target leaves the upload root
    pub async fn persist_chunk(
        &self,
        upload_id: &UploadId,
        chunk_index: ChunkIndex,
        payload: &[u8],
        expected_hash: &BundleHash,
    ) -> Result<PathBuf, EngineError> {
        // Reject before any disk mutation.
        let actual = BundleHash::digest(payload);
        if !digests_equal(actual.as_bytes(), expected_hash.as_bytes()) {
            return Err(EngineError::ChunkHashMismatch(format!(
                "chunk {} payload does not match its declared hash",
                chunk_index
            )));
        }

        self.quota.check_write_allowed()?;

        let chunks_dir = self.root.chunks_dir(upload_id);
        let tmp_path = self.root.chunk_tmp_file(upload_id, chunk_index);
        let final_path = self.root.chunk_file(upload_id, chunk_index);
        if !self.root.contains(&final_path) || !self.root.contains(&tmp_path) {
            return Err(EngineError::path_escape(format!(
                "chunk path for session {} index {}",
                upload_id, chunk_index
            )));
        }

        tokio::fs::create_dir_all(&chunks_dir)
            .await
            .map_err(|e| EngineError::ChunkWriteFailed(format!("cannot create chunks dir: {}", e)))?;

        // Steps 1-4: tmp write, data fsync, close.
        {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .await
                .map_err(|e| EngineError::ChunkWriteFailed(format!("cannot open tmp file: {}", e)))?;
            file.write_all(payload)
                .await
                .map_err(|e| EngineError::ChunkWriteFailed(format!("write failed: {}", e)))?;
            self.platform
                .sync_file(&file)
                .await
                .map_err(|e| EngineError::ChunkWriteFailed(format!("fsync failed: {}", e)))?;
        }

        // Step 5: post-write size check.
        let written = tokio::fs::metadata(&tmp_path)
            .await
            .map_err(|e| EngineError::ChunkWriteFailed(format!("cannot stat tmp file: {}", e)))?
            .len();
        if written != payload.len() as u64 {
            if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
                warn!("failed to remove short tmp file {}: {}", tmp_path.display(), e);
            }
            return Err(EngineError::ChunkWriteFailed(format!(
                "short write: {} of {} bytes",
                written,
                payload.len()
            )));
        }

        // Steps 6-7: atomic rename, directory fsync.
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| EngineError::ChunkWriteFailed(format!("rename failed: {}", e)))?;
        self.platform
            .sync_dir(&chunks_dir)
            .await
            .map_err(|e| EngineError::ChunkWriteFailed(format!("dir fsync failed: {}", e)))?;

        debug!(
            upload_id = %upload_id,
            chunk_index = %chunk_index,
            bytes = payload.len(),
            "chunk persisted"
        );
        Ok(final_path)
    }
}
