// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Persistent Schema
//!
//! DDL for the engine's five tables. The engine writes `upload_sessions`,
//! `chunks`, `jobs`, and `timeline_events`; `artifacts` is created here for
//! schema completeness but written only by the downstream pipeline.
//!
//! The `chunks` unique constraint on `(upload_id, chunk_index)` is the
//! storage-level backstop for the single-writer-per-session assumption:
//! concurrent duplicate chunk uploads resolve through this constraint, not
//! through application locks.
//!
//! `timeline_events.trigger` is quoted throughout because TRIGGER is a
//! SQLite keyword.

use aether_upload_domain::EngineError;
use sqlx::SqlitePool;

/// Upload session rows, keyed by the path-safe upload id.
pub const CREATE_UPLOAD_SESSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS upload_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    capture_session_id TEXT NOT NULL,
    bundle_hash TEXT NOT NULL,
    bundle_size INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    status TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

pub const CREATE_UPLOAD_SESSIONS_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_upload_sessions_user_status ON upload_sessions(user_id, status);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_expiry ON upload_sessions(status, expires_at);
"#;

/// Chunk rows; unique on `(upload_id, chunk_index)`.
pub const CREATE_CHUNKS: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    upload_id TEXT NOT NULL REFERENCES upload_sessions(id),
    chunk_index INTEGER NOT NULL,
    chunk_hash TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(upload_id, chunk_index)
);
"#;

/// Job rows; state machine owned downstream.
pub const CREATE_JOBS: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    bundle_hash TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

pub const CREATE_JOBS_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_dedup ON jobs(bundle_hash, user_id, state);
"#;

/// Timeline event rows for job-state audit.
pub const CREATE_TIMELINE_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS timeline_events (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL REFERENCES jobs(id),
    timestamp TEXT NOT NULL,
    from_state TEXT,
    to_state TEXT NOT NULL,
    "trigger" TEXT NOT NULL
);
"#;

/// Artifact rows, written by the downstream pipeline only.
pub const CREATE_ARTIFACTS: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL REFERENCES jobs(id),
    kind TEXT NOT NULL,
    path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Creates every table and index if absent. Idempotent.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), EngineError> {
    for ddl in [
        CREATE_UPLOAD_SESSIONS,
        CREATE_UPLOAD_SESSIONS_INDEXES,
        CREATE_CHUNKS,
        CREATE_JOBS,
        CREATE_JOBS_INDEXES,
        CREATE_TIMELINE_EVENTS,
        CREATE_ARTIFACTS,
    ] {
        sqlx::raw_sql(ddl)
            .execute(pool)
            .await
            .map_err(|e| EngineError::DatabaseError(format!("schema creation failed: {}", e)))?;
    }
    Ok(())
}
