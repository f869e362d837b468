// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Error System
//!
//! This module provides the hierarchical error system for the upload engine
//! domain. Internal failures are modeled as a tagged sum propagated explicitly
//! through `Result` types; the external response surface is a closed set of
//! seven business codes into which every internal kind collapses at the
//! boundary.
//!
//! ## Error Architecture
//!
//! ### Internal taxonomy
//!
//! - **Assembly**: `ChunkWriteFailed`, `ChunkReadFailed`, `ChunkMissing`,
//!   `ChunkHashMismatch`, `AssemblyIo`, `SizeMismatch`, `IndexGap`,
//!   `DiskQuotaExceeded`
//! - **Verification**: `HashVerificationFailed`, `MerkleVerificationFailed`
//! - **Security**: `PathTraversal`, `PathEscape`
//! - **Request/state**: `SessionNotFound`, `StateConflict`, `InvalidRequest`,
//!   `PayloadTooLarge`, `MissingChunks`
//! - **Infrastructure**: `DatabaseError`, `SerializationError`,
//!   `InternalError`, `TimeoutError`, `Cancelled`
//!
//! ### Retryability
//!
//! Each kind carries an `is_retryable()` property used by callers to
//! distinguish transient resource issues (disk, I/O, database, timeout) from
//! durable rejections (integrity, security, validation). Security violations
//! are never retryable and are logged at an elevated level by the
//! infrastructure layer.
//!
//! ### Anti-enumeration collapse
//!
//! The collapse in [`EngineError::to_response`] is deliberately lossy: every
//! integrity failure surfaces as a single `STATE_CONFLICT` with message
//! `HASH_MISMATCH`, and a session that exists but belongs to another user is
//! indistinguishable from one that does not exist. The one structured
//! exception is `MissingChunks`, which returns the machine-readable missing
//! index set so clients can resume.
//!
//! `DiskQuotaExceeded` maps to `RATE_LIMITED` because the external code set
//! is closed; the internal kind is preserved in logs so operators can tell
//! the two apart.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-specific errors for the upload engine.
///
/// Each variant includes a descriptive message. Variants map 1:1 onto the
/// internal taxonomy; the external seven-code surface is derived via
/// [`EngineError::to_response`] and never exposes which internal kind
/// tripped.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    // === Assembly ===
    #[error("Chunk write failed: {0}")]
    ChunkWriteFailed(String),

    #[error("Chunk read failed: {0}")]
    ChunkReadFailed(String),

    #[error("Chunk missing: {0}")]
    ChunkMissing(String),

    #[error("Chunk hash mismatch: {0}")]
    ChunkHashMismatch(String),

    #[error("Assembly IO error: {0}")]
    AssemblyIo(String),

    #[error("Size mismatch: {0}")]
    SizeMismatch(String),

    #[error("Index gap: {0}")]
    IndexGap(String),

    #[error("Disk quota exceeded: {0}")]
    DiskQuotaExceeded(String),

    // === Verification ===
    #[error("Hash verification failed: {0}")]
    HashVerificationFailed(String),

    #[error("Merkle verification failed: {0}")]
    MerkleVerificationFailed(String),

    // === Security ===
    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("Path escapes upload root: {0}")]
    PathEscape(String),

    // === Request / state ===
    #[error("Upload session not found: {0}")]
    SessionNotFound(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Completion was attempted with chunks absent; carries the sorted
    /// missing index set for the client.
    #[error("Missing chunks: {0:?}")]
    MissingChunks(Vec<u32>),

    // === Infrastructure ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl EngineError {
    /// Creates a new invalid-request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a new state-conflict error
    pub fn state_conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }

    /// Creates a new chunk-write error
    pub fn chunk_write_failed(msg: impl Into<String>) -> Self {
        Self::ChunkWriteFailed(msg.into())
    }

    /// Creates a new assembly IO error
    pub fn assembly_io(msg: impl Into<String>) -> Self {
        Self::AssemblyIo(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Creates a new path-escape error
    pub fn path_escape(msg: impl Into<String>) -> Self {
        Self::PathEscape(msg.into())
    }

    /// Checks if the error indicates a transient condition worth retrying.
    ///
    /// Integrity and security failures are durable rejections; disk, I/O,
    /// database, and timeout failures may clear on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::DiskQuotaExceeded(_)
                | EngineError::ChunkWriteFailed(_)
                | EngineError::ChunkReadFailed(_)
                | EngineError::AssemblyIo(_)
                | EngineError::DatabaseError(_)
                | EngineError::TimeoutError(_)
        )
    }

    /// Checks if the error is a security-related error
    pub fn is_security_error(&self) -> bool {
        matches!(self, EngineError::PathTraversal(_) | EngineError::PathEscape(_))
    }

    /// Checks if the error is an integrity failure (hash or merkle layer).
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            EngineError::ChunkHashMismatch(_)
                | EngineError::HashVerificationFailed(_)
                | EngineError::MerkleVerificationFailed(_)
                | EngineError::SizeMismatch(_)
                | EngineError::IndexGap(_)
                | EngineError::ChunkMissing(_)
        )
    }

    /// Gets the error category for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::ChunkWriteFailed(_)
            | EngineError::ChunkReadFailed(_)
            | EngineError::ChunkMissing(_)
            | EngineError::ChunkHashMismatch(_)
            | EngineError::AssemblyIo(_)
            | EngineError::SizeMismatch(_)
            | EngineError::IndexGap(_) => "assembly",
            EngineError::DiskQuotaExceeded(_) => "quota",
            EngineError::HashVerificationFailed(_) | EngineError::MerkleVerificationFailed(_) => "verification",
            EngineError::PathTraversal(_) | EngineError::PathEscape(_) => "security",
            EngineError::SessionNotFound(_) => "not_found",
            EngineError::StateConflict(_) | EngineError::MissingChunks(_) => "state",
            EngineError::InvalidRequest(_) | EngineError::PayloadTooLarge(_) => "validation",
            EngineError::DatabaseError(_) => "database",
            EngineError::SerializationError(_) => "serialization",
            EngineError::TimeoutError(_) => "timeout",
            EngineError::Cancelled(_) => "cancellation",
            EngineError::InternalError(_) => "internal",
        }
    }

    /// Collapses the internal kind into the external response contract.
    ///
    /// This is the anti-enumeration boundary: callers must send exactly what
    /// this returns and nothing from the internal variant.
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            EngineError::MissingChunks(missing) => ErrorResponse {
                code: ApiErrorCode::InvalidRequest,
                http_status: 400,
                message: "Missing chunks".to_string(),
                details: Some(serde_json::json!({ "missing": missing })),
            },
            e if e.is_integrity_error() => ErrorResponse {
                code: ApiErrorCode::StateConflict,
                http_status: 409,
                message: "HASH_MISMATCH".to_string(),
                details: None,
            },
            EngineError::SessionNotFound(_) => ErrorResponse {
                code: ApiErrorCode::ResourceNotFound,
                http_status: 404,
                message: "Upload session not found".to_string(),
                details: None,
            },
            EngineError::StateConflict(msg) => ErrorResponse {
                code: ApiErrorCode::StateConflict,
                http_status: 409,
                message: msg.clone(),
                details: None,
            },
            EngineError::InvalidRequest(msg) => ErrorResponse {
                code: ApiErrorCode::InvalidRequest,
                http_status: 400,
                message: msg.clone(),
                details: None,
            },
            EngineError::PayloadTooLarge(msg) => ErrorResponse {
                code: ApiErrorCode::PayloadTooLarge,
                http_status: 413,
                message: msg.clone(),
                details: None,
            },
            // The external code set is closed; quota pressure shares the
            // retry-later signal with rate limiting. Logs preserve the
            // internal kind.
            EngineError::DiskQuotaExceeded(_) => ErrorResponse {
                code: ApiErrorCode::RateLimited,
                http_status: 429,
                message: "Retry later".to_string(),
                details: None,
            },
            // Security violations masquerade as generic invalid requests.
            e if e.is_security_error() => ErrorResponse {
                code: ApiErrorCode::InvalidRequest,
                http_status: 400,
                message: "Invalid request".to_string(),
                details: None,
            },
            _ => ErrorResponse {
                code: ApiErrorCode::InternalError,
                http_status: 500,
                message: "Internal server error".to_string(),
                details: None,
            },
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::AssemblyIo(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}

/// Closed set of seven business error codes exposed externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InvalidRequest,
    AuthFailed,
    ResourceNotFound,
    StateConflict,
    PayloadTooLarge,
    RateLimited,
    InternalError,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidRequest => "INVALID_REQUEST",
            ApiErrorCode::AuthFailed => "AUTH_FAILED",
            ApiErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ApiErrorCode::StateConflict => "STATE_CONFLICT",
            ApiErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiErrorCode::RateLimited => "RATE_LIMITED",
            ApiErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// The externally visible rendering of a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ApiErrorCode,
    pub http_status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_errors_collapse_to_hash_mismatch() {
        let kinds = [
            EngineError::ChunkHashMismatch("chunk 3".into()),
            EngineError::HashVerificationFailed("whole file".into()),
            EngineError::MerkleVerificationFailed("root".into()),
            EngineError::SizeMismatch("2048 != 2049".into()),
            EngineError::IndexGap("missing 1".into()),
            EngineError::ChunkMissing("000001.chunk".into()),
        ];
        for kind in kinds {
            let resp = kind.to_response();
            assert_eq!(resp.code, ApiErrorCode::StateConflict);
            assert_eq!(resp.http_status, 409);
            assert_eq!(resp.message, "HASH_MISMATCH");
            assert!(resp.details.is_none());
        }
    }

    #[test]
    fn test_missing_chunks_keeps_index_set() {
        let resp = EngineError::MissingChunks(vec![1, 4]).to_response();
        assert_eq!(resp.code, ApiErrorCode::InvalidRequest);
        assert_eq!(resp.http_status, 400);
        assert_eq!(resp.details.unwrap()["missing"], serde_json::json!([1, 4]));
    }

    #[test]
    fn test_quota_maps_to_rate_limited() {
        let resp = EngineError::DiskQuotaExceeded("87%".into()).to_response();
        assert_eq!(resp.code, ApiErrorCode::RateLimited);
        assert_eq!(resp.http_status, 429);
    }

    #[test]
    fn test_security_errors_are_never_retryable() {
        assert!(!EngineError::PathEscape("..".into()).is_retryable());
        assert!(!EngineError::PathTraversal("..".into()).is_retryable());
        assert!(EngineError::PathEscape("..".into()).is_security_error());
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(EngineError::DiskQuotaExceeded("x".into()).is_retryable());
        assert!(EngineError::DatabaseError("x".into()).is_retryable());
        assert!(EngineError::TimeoutError("x".into()).is_retryable());
        assert!(!EngineError::ChunkHashMismatch("x".into()).is_retryable());
        assert!(!EngineError::HashVerificationFailed("x".into()).is_retryable());
    }

    #[test]
    fn test_not_found_is_unified() {
        // Cross-user access produces the same response as a missing session.
        let resp = EngineError::SessionNotFound("someone else's".into()).to_response();
        assert_eq!(resp.http_status, 404);
        assert_eq!(resp.message, "Upload session not found");
    }

    #[test]
    fn test_api_error_code_wire_names() {
        assert_eq!(ApiErrorCode::StateConflict.as_str(), "STATE_CONFLICT");
        let json = serde_json::to_string(&ApiErrorCode::PayloadTooLarge).unwrap();
        assert_eq!(json, "\"PAYLOAD_TOO_LARGE\"");
    }
}
