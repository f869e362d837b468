// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Record Entity
//!
//! One received chunk of an upload session, unique on
//! `(upload_id, chunk_index)`. The record is created only after the chunk's
//! file has been durably renamed into place; the database row is therefore a
//! promise that the bytes exist on disk and matched their declared hash at
//! ingestion time. Assembly re-verifies the hash anyway before the bytes
//! enter the bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{BundleHash, ChunkIndex, UploadId};

/// Persistent record of one received chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    id: String,
    upload_id: UploadId,
    chunk_index: ChunkIndex,
    chunk_hash: BundleHash,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ChunkRecord {
    /// Creates a record for a freshly persisted chunk file.
    pub fn new(
        upload_id: UploadId,
        chunk_index: ChunkIndex,
        chunk_hash: BundleHash,
        size_bytes: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            upload_id,
            chunk_index,
            chunk_hash,
            size_bytes,
            created_at: now,
        }
    }

    /// Reconstitutes a record from persisted fields.
    pub fn from_parts(
        id: String,
        upload_id: UploadId,
        chunk_index: ChunkIndex,
        chunk_hash: BundleHash,
        size_bytes: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            upload_id,
            chunk_index,
            chunk_hash,
            size_bytes,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn upload_id(&self) -> &UploadId {
        &self.upload_id
    }

    pub fn chunk_index(&self) -> ChunkIndex {
        self.chunk_index
    }

    pub fn chunk_hash(&self) -> &BundleHash {
        &self.chunk_hash
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ChunkCount;

    #[test]
    fn test_new_record_mints_id() {
        let count = ChunkCount::new(2).unwrap();
        let a = ChunkRecord::new(
            UploadId::new_v4(),
            ChunkIndex::new(0, count).unwrap(),
            BundleHash::digest(b"a"),
            1024,
            Utc::now(),
        );
        let b = ChunkRecord::new(
            UploadId::new_v4(),
            ChunkIndex::new(1, count).unwrap(),
            BundleHash::digest(b"b"),
            1024,
            Utc::now(),
        );
        assert_ne!(a.id(), b.id());
        assert_eq!(a.size_bytes(), 1024);
    }
}
