// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Session Repository
//!
//! `SessionRepository` implementation over a pooled SQLite database. All
//! statements are parameterized; identifiers and digests loaded back from
//! rows are re-validated through the value-object constructors before they
//! can reach a path join (defense in depth against a hand-edited row).
//!
//! Timestamps are stored as RFC 3339 TEXT through sqlx's chrono support.
//! Status updates commit before returning; the cleanup tiers rely on the
//! DB-before-file ordering this gives them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use aether_upload_domain::repositories::SessionRepository;
use aether_upload_domain::value_objects::{BundleHash, ChunkCount, ChunkIndex, UploadId, UserId};
use aether_upload_domain::{ChunkRecord, EngineError, SessionStatus, UploadSession};

/// SQLite-backed session and chunk persistence.
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn db_err(context: &str, e: sqlx::Error) -> EngineError {
        EngineError::DatabaseError(format!("{}: {}", context, e))
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<UploadSession, EngineError> {
        let id = UploadId::parse(row.get::<&str, _>("id"))?;
        let user_id = UserId::new(row.get::<String, _>("user_id"))?;
        let bundle_hash = BundleHash::parse(row.get::<&str, _>("bundle_hash"))?;
        let chunk_count = ChunkCount::new(row.get::<i64, _>("chunk_count") as u32)?;
        let status = SessionStatus::parse(row.get::<&str, _>("status"))?;
        Ok(UploadSession::from_parts(
            id,
            user_id,
            row.get::<String, _>("capture_session_id"),
            bundle_hash,
            row.get::<i64, _>("bundle_size") as u64,
            chunk_count,
            status,
            row.get::<DateTime<Utc>, _>("expires_at"),
            row.get::<DateTime<Utc>, _>("created_at"),
        ))
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<ChunkRecord, EngineError> {
        let upload_id = UploadId::parse(row.get::<&str, _>("upload_id"))?;
        let chunk_hash = BundleHash::parse(row.get::<&str, _>("chunk_hash"))?;
        // Index bounds were validated at insert; reconstitution only needs
        // the raw position, so borrow the widest legal count.
        let index = ChunkIndex::new(
            row.get::<i64, _>("chunk_index") as u32,
            ChunkCount::new(aether_upload_domain::contract::MAX_CHUNK_COUNT)?,
        )?;
        Ok(ChunkRecord::from_parts(
            row.get::<String, _>("id"),
            upload_id,
            index,
            chunk_hash,
            row.get::<i64, _>("size_bytes") as u64,
            row.get::<DateTime<Utc>, _>("created_at"),
        ))
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn save_session(&self, session: &UploadSession) -> Result<(), EngineError> {
        sqlx::query(
            r#"INSERT INTO upload_sessions
               (id, user_id, capture_session_id, bundle_hash, bundle_size, chunk_count, status, expires_at, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id().as_str())
        .bind(session.user_id().as_str())
        .bind(session.capture_session_id())
        .bind(session.bundle_hash().to_hex())
        .bind(session.bundle_size() as i64)
        .bind(session.chunk_count().get() as i64)
        .bind(session.status().as_str())
        .bind(session.expires_at())
        .bind(session.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("saving session", e))?;
        Ok(())
    }

    async fn find_session(&self, id: &UploadId) -> Result<Option<UploadSession>, EngineError> {
        let row = sqlx::query("SELECT * FROM upload_sessions WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::db_err("loading session", e))?;
        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn find_session_for_user(
        &self,
        id: &UploadId,
        user_id: &UserId,
    ) -> Result<Option<UploadSession>, EngineError> {
        let row = sqlx::query("SELECT * FROM upload_sessions WHERE id = ? AND user_id = ?")
            .bind(id.as_str())
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::db_err("loading session for user", e))?;
        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn count_active_for_user(&self, user_id: &UserId) -> Result<u32, EngineError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM upload_sessions WHERE user_id = ? AND status = 'in_progress'")
                .bind(user_id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Self::db_err("counting active sessions", e))?;
        Ok(count as u32)
    }

    async fn find_expired_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<UploadSession>, EngineError> {
        let rows = sqlx::query(
            "SELECT * FROM upload_sessions WHERE user_id = ? AND status = 'in_progress' AND expires_at < ?",
        )
        .bind(user_id.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::db_err("querying expired sessions for user", e))?;
        rows.iter().map(Self::row_to_session).collect()
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<UploadSession>, EngineError> {
        let rows = sqlx::query("SELECT * FROM upload_sessions WHERE status = 'in_progress' AND expires_at < ?")
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::db_err("querying expired sessions", e))?;
        rows.iter().map(Self::row_to_session).collect()
    }

    async fn update_status(&self, id: &UploadId, status: SessionStatus) -> Result<(), EngineError> {
        sqlx::query("UPDATE upload_sessions SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| Self::db_err("updating session status", e))?;
        Ok(())
    }

    async fn all_session_ids(&self) -> Result<Vec<UploadId>, EngineError> {
        let rows = sqlx::query("SELECT id FROM upload_sessions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::db_err("listing session ids", e))?;
        rows.iter().map(|row| UploadId::parse(row.get::<&str, _>("id"))).collect()
    }

    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<(), EngineError> {
        let result = sqlx::query(
            r#"INSERT INTO chunks (id, upload_id, chunk_index, chunk_hash, size_bytes, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id())
        .bind(record.upload_id().as_str())
        .bind(record.chunk_index().get() as i64)
        .bind(record.chunk_hash().to_hex())
        .bind(record.size_bytes() as i64)
        .bind(record.created_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("UNIQUE") => Err(EngineError::StateConflict(format!(
                "chunk {} already recorded for session {}",
                record.chunk_index(),
                record.upload_id()
            ))),
            Err(e) => Err(Self::db_err("inserting chunk", e)),
        }
    }

    async fn find_chunk(&self, upload_id: &UploadId, chunk_index: u32) -> Result<Option<ChunkRecord>, EngineError> {
        let row = sqlx::query("SELECT * FROM chunks WHERE upload_id = ? AND chunk_index = ?")
            .bind(upload_id.as_str())
            .bind(chunk_index as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::db_err("loading chunk", e))?;
        row.as_ref().map(Self::row_to_chunk).transpose()
    }

    async fn chunks_for_upload(&self, upload_id: &UploadId) -> Result<Vec<ChunkRecord>, EngineError> {
        let rows = sqlx::query("SELECT * FROM chunks WHERE upload_id = ? ORDER BY chunk_index ASC")
            .bind(upload_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::db_err("listing chunks", e))?;
        rows.iter().map(Self::row_to_chunk).collect()
    }

    async fn chunk_count_for_upload(&self, upload_id: &UploadId) -> Result<u32, EngineError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE upload_id = ?")
            .bind(upload_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::db_err("counting chunks", e))?;
        Ok(count as u32)
    }
}
