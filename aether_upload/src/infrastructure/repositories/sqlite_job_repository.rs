// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite Job Repository
//!
//! `JobRepository` implementation. The publication path is the one place
//! the engine uses a multi-statement transaction: session completion, job
//! insertion, and the initial timeline event commit together or not at
//! all. Assembly never holds a transaction; only this short commit does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use aether_upload_domain::repositories::JobRepository;
use aether_upload_domain::value_objects::{BundleHash, UploadId, UserId};
use aether_upload_domain::{EngineError, Job, JobState, SessionStatus, TimelineEvent};

/// SQLite-backed job and timeline persistence.
pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn db_err(context: &str, e: sqlx::Error) -> EngineError {
        EngineError::DatabaseError(format!("{}: {}", context, e))
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job, EngineError> {
        Ok(Job::from_parts(
            row.get::<String, _>("id"),
            UserId::new(row.get::<String, _>("user_id"))?,
            BundleHash::parse(row.get::<&str, _>("bundle_hash"))?,
            JobState::parse(row.get::<&str, _>("state"))?,
            row.get::<DateTime<Utc>, _>("created_at"),
        ))
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn find_live_duplicate(
        &self,
        bundle_hash: &BundleHash,
        user_id: &UserId,
    ) -> Result<Option<Job>, EngineError> {
        // The live-duplicate state set is closed; keep it literal in the
        // query so the privacy- and state-scoping is auditable in one
        // place.
        let row = sqlx::query(
            r#"SELECT * FROM jobs
               WHERE bundle_hash = ? AND user_id = ? AND state IN ('completed', 'queued', 'processing')
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(bundle_hash.to_hex())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("querying live duplicate", e))?;
        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn publish_completion(
        &self,
        session_id: &UploadId,
        job: &Job,
        event: &TimelineEvent,
    ) -> Result<(), EngineError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::db_err("opening publication transaction", e))?;

        sqlx::query("UPDATE upload_sessions SET status = ? WHERE id = ?")
            .bind(SessionStatus::Completed.as_str())
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::db_err("marking session completed", e))?;

        sqlx::query("INSERT INTO jobs (id, user_id, bundle_hash, state, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(job.id())
            .bind(job.user_id().as_str())
            .bind(job.bundle_hash().to_hex())
            .bind(job.state().as_str())
            .bind(job.created_at())
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::db_err("inserting job", e))?;

        sqlx::query(
            r#"INSERT INTO timeline_events (id, job_id, timestamp, from_state, to_state, "trigger")
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(event.id())
        .bind(event.job_id())
        .bind(event.timestamp())
        .bind(event.from_state().map(|s| s.as_str()))
        .bind(event.to_state().as_str())
        .bind(event.trigger())
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::db_err("inserting timeline event", e))?;

        tx.commit()
            .await
            .map_err(|e| Self::db_err("committing publication", e))?;
        Ok(())
    }

    async fn find_job(&self, id: &str) -> Result<Option<Job>, EngineError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::db_err("loading job", e))?;
        row.as_ref().map(Self::row_to_job).transpose()
    }
}
