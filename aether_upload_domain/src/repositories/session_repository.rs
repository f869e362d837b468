// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Session Repository Port
//!
//! Persistence contract for upload sessions and their chunk records. The
//! database mediates all cross-request state with `READ COMMITTED`
//! semantics; handlers never share in-memory session state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{ChunkRecord, SessionStatus, UploadSession};
use crate::error::EngineError;
use crate::value_objects::{UploadId, UserId};

/// Persistence port for upload sessions and chunks.
///
/// Implementations must enforce the `(upload_id, chunk_index)` uniqueness
/// constraint at the storage level; the single-writer-per-session assumption
/// is backed by that constraint, not by application locks.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persists a new session.
    async fn save_session(&self, session: &UploadSession) -> Result<(), EngineError>;

    /// Loads a session by id regardless of owner. Cleanup-tier use only;
    /// request handlers must use the ownership-scoped query.
    async fn find_session(&self, id: &UploadId) -> Result<Option<UploadSession>, EngineError>;

    /// Loads a session only if owned by `user_id`.
    ///
    /// Returning `None` for both "absent" and "not yours" is what lets the
    /// orchestrator produce the unified 404.
    async fn find_session_for_user(
        &self,
        id: &UploadId,
        user_id: &UserId,
    ) -> Result<Option<UploadSession>, EngineError>;

    /// Counts the user's in-progress sessions.
    async fn count_active_for_user(&self, user_id: &UserId) -> Result<u32, EngineError>;

    /// In-progress sessions of `user_id` whose expiry has passed (Tier-2 scan).
    async fn find_expired_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<UploadSession>, EngineError>;

    /// All in-progress sessions whose expiry has passed (Tier-3 scan).
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<UploadSession>, EngineError>;

    /// Updates a session's status. Implementations must commit before
    /// returning: cleanup relies on DB-before-file ordering.
    async fn update_status(&self, id: &UploadId, status: SessionStatus) -> Result<(), EngineError>;

    /// Ids of every session row, any status. Used by the orphan sweep to
    /// decide which directories are accounted for.
    async fn all_session_ids(&self) -> Result<Vec<UploadId>, EngineError>;

    /// Inserts a chunk record. Fails on `(upload_id, chunk_index)` conflict.
    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<(), EngineError>;

    /// Loads one chunk record.
    async fn find_chunk(&self, upload_id: &UploadId, chunk_index: u32) -> Result<Option<ChunkRecord>, EngineError>;

    /// All chunk records of a session, ordered by `chunk_index` ascending.
    async fn chunks_for_upload(&self, upload_id: &UploadId) -> Result<Vec<ChunkRecord>, EngineError>;

    /// Fast count of a session's chunk records.
    async fn chunk_count_for_upload(&self, upload_id: &UploadId) -> Result<u32, EngineError>;
}
