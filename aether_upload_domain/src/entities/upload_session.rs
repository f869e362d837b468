// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Session Entity
//!
//! The transient state allowing a client to upload the chunks of one bundle.
//! A session exclusively owns the directory subtree `<upload_root>/<id>/`
//! from creation until deletion; no file path is ever shared across
//! sessions.
//!
//! ## Lifecycle
//!
//! ```text
//! InProgress ──mark_completed()──▶ Completed   (terminal)
//!     │
//!     └──────mark_expired()──────▶ Expired     (terminal)
//! ```
//!
//! Both terminal transitions are one-way; attempting to leave a terminal
//! state is a `StateConflict`. Expiry is decided against a caller-supplied
//! `now` so the cleanup tiers and tests share one clock discipline.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::UPLOAD_EXPIRY_HOURS;
use crate::error::EngineError;
use crate::value_objects::{BundleHash, ChunkCount, UploadId, UserId};

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Expired,
}

impl SessionStatus {
    /// Canonical database / wire rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
        }
    }

    /// Parses the database rendering.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        match raw {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "expired" => Ok(SessionStatus::Expired),
            other => Err(EngineError::SerializationError(format!(
                "unknown session status '{}'",
                other
            ))),
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Expired)
    }
}

/// Upload session entity.
///
/// Identity is the `UploadId`; all other fields are the declared bundle
/// contract the client committed to at creation time. The declared
/// `bundle_hash`, `bundle_size`, and `chunk_count` are re-verified against
/// reality during assembly and verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    id: UploadId,
    user_id: UserId,
    capture_session_id: String,
    bundle_hash: BundleHash,
    bundle_size: u64,
    chunk_count: ChunkCount,
    status: SessionStatus,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl UploadSession {
    /// Creates a new in-progress session expiring after the contract window.
    pub fn new(
        user_id: UserId,
        capture_session_id: String,
        bundle_hash: BundleHash,
        bundle_size: u64,
        chunk_count: ChunkCount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UploadId::new_v4(),
            user_id,
            capture_session_id,
            bundle_hash,
            bundle_size,
            chunk_count,
            status: SessionStatus::InProgress,
            expires_at: now + Duration::hours(UPLOAD_EXPIRY_HOURS),
            created_at: now,
        }
    }

    /// Reconstitutes a session from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: UploadId,
        user_id: UserId,
        capture_session_id: String,
        bundle_hash: BundleHash,
        bundle_size: u64,
        chunk_count: ChunkCount,
        status: SessionStatus,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            capture_session_id,
            bundle_hash,
            bundle_size,
            chunk_count,
            status,
            expires_at,
            created_at,
        }
    }

    pub fn id(&self) -> &UploadId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn capture_session_id(&self) -> &str {
        &self.capture_session_id
    }

    pub fn bundle_hash(&self) -> &BundleHash {
        &self.bundle_hash
    }

    pub fn bundle_size(&self) -> u64 {
        self.bundle_size
    }

    pub fn chunk_count(&self) -> ChunkCount {
        self.chunk_count
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// True when the hard-expiry deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True when the session still accepts chunk uploads.
    pub fn accepts_chunks(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::InProgress && !self.is_expired(now)
    }

    /// Transitions to `Completed`.
    ///
    /// # Errors
    /// `StateConflict` when the session is already terminal.
    pub fn mark_completed(&mut self) -> Result<(), EngineError> {
        if self.status.is_terminal() {
            return Err(EngineError::StateConflict(format!(
                "session {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = SessionStatus::Completed;
        Ok(())
    }

    /// Transitions to `Expired`.
    ///
    /// # Errors
    /// `StateConflict` when the session is already terminal.
    pub fn mark_expired(&mut self) -> Result<(), EngineError> {
        if self.status.is_terminal() {
            return Err(EngineError::StateConflict(format!(
                "session {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.status = SessionStatus::Expired;
        Ok(())
    }
}
