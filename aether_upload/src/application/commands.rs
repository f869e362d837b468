// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Commands
//!
//! Closed request and response values for the three mutating operations
//! plus the chunk listing. The HTTP transport (framing, auth, rate
//! limiting, idempotency cache) is an external collaborator; these types
//! are the contract it marshals into.
//!
//! Schemas are closed: unknown fields fail deserialization rather than
//! being silently dropped. Forward compatibility goes through the optional
//! `schema_version` field instead of reopening the schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /uploads` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSessionRequest {
    pub capture_source: String,
    pub bundle_hash: String,
    pub bundle_size: u64,
    pub chunk_count: u32,
    pub capture_session_id: String,
    #[serde(default)]
    pub device_info: Option<serde_json::Value>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub schema_version: Option<String>,
}

/// `POST /uploads` response.
///
/// Two shapes share the struct: a fresh session carries `upload_url`,
/// `chunk_size`, and `expires_at`; an instant upload carries the sentinel
/// id `"instant"`, status `completed`, and the existing `job_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub upload_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// Headers of `PATCH /uploads/{id}/chunks`, as received.
///
/// Fields are optional raw strings: presence and well-formedness are the
/// orchestrator's validation responsibility, so the transport stays dumb.
#[derive(Debug, Clone, Default)]
pub struct ChunkUploadHeaders {
    pub content_length: Option<String>,
    pub chunk_index: Option<String>,
    pub chunk_hash: Option<String>,
}

/// Idempotency outcome of a chunk upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Stored,
    AlreadyPresent,
}

/// `PATCH /uploads/{id}/chunks` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkUploadResponse {
    pub chunk_index: u32,
    pub chunk_status: ChunkStatus,
    pub received_size: u64,
    pub total_received: u32,
    pub total_chunks: u32,
}

/// `GET /uploads/{id}/chunks` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkListing {
    pub upload_id: String,
    pub received_chunks: Vec<u32>,
    pub missing_chunks: Vec<u32>,
    pub total_chunks: u32,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

/// `POST /uploads/{id}/complete` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteSessionRequest {
    pub bundle_hash: String,
    #[serde(default)]
    pub schema_version: Option<String>,
}

/// `POST /uploads/{id}/complete` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteSessionResponse {
    pub upload_id: String,
    pub bundle_hash: String,
    pub status: String,
    pub job_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_rejects_unknown_fields() {
        let json = r#"{
            "capture_source": "aether_camera",
            "bundle_hash": "ab",
            "bundle_size": 10,
            "chunk_count": 1,
            "capture_session_id": "c1",
            "surprise": true
        }"#;
        assert!(serde_json::from_str::<CreateSessionRequest>(json).is_err());
    }

    #[test]
    fn test_create_request_optional_fields_default() {
        let json = r#"{
            "capture_source": "aether_camera",
            "bundle_hash": "ab",
            "bundle_size": 10,
            "chunk_count": 1,
            "capture_session_id": "c1"
        }"#;
        let req: CreateSessionRequest = serde_json::from_str(json).unwrap();
        assert!(req.device_info.is_none());
        assert!(req.idempotency_key.is_none());
        assert!(req.schema_version.is_none());
    }

    #[test]
    fn test_instant_upload_response_shape() {
        let resp = CreateSessionResponse {
            upload_id: "instant".to_string(),
            status: "completed".to_string(),
            upload_url: None,
            chunk_size: None,
            expires_at: None,
            job_id: Some("job-1".to_string()),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["upload_id"], "instant");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["job_id"], "job-1");
        assert!(json.get("upload_url").is_none());
    }

    #[test]
    fn test_chunk_status_wire_names() {
        assert_eq!(serde_json::to_string(&ChunkStatus::Stored).unwrap(), "\"stored\"");
        assert_eq!(
            serde_json::to_string(&ChunkStatus::AlreadyPresent).unwrap(),
            "\"already_present\""
        );
    }
}
