// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Orchestrator
//!
//! Binds the assembly pipeline, verifier, deduplicator, and cleanup engine
//! behind the three mutating operations (`create_session`, `upload_chunk`,
//! `complete_session`) plus the chunk listing. Each operation executes
//! synchronously under one request; every boundary crossing in the control
//! flow
//!
//! `create_session → N x upload_chunk → complete_session → assemble →
//! verify → dedup → publish → cleanup`
//!
//! is an external request.
//!
//! ## Ownership and anti-enumeration
//!
//! Session lookups are ownership-scoped at the query: a session that
//! exists but belongs to another user produces the same unified 404 as one
//! that never existed. Internal failure kinds are logged with full context
//! here and collapsed at the response boundary.
//!
//! ## Ordering guarantees
//!
//! - Chunk visibility within a session is total-ordered: file rename
//!   completes before the database row is inserted. A crash between the
//!   two leaves an orphan file that Tier-3 reaps; the reverse order would
//!   advertise a chunk whose bytes may not survive.
//! - Dedup runs both before upload (path 1) and after assembly (path 2),
//!   closing the window where two clients race identical content.
//! - Job, timeline event, and session completion commit in one
//!   transaction.

use std::sync::Arc;

use aether_upload_domain::contract::{CAPTURE_SOURCE_CAMERA, CHUNK_SIZE_BYTES, MAX_ACTIVE_UPLOADS_PER_USER, MAX_BUNDLE_SIZE_BYTES};
use aether_upload_domain::repositories::{JobRepository, SessionRepository};
use aether_upload_domain::value_objects::{BundleHash, ChunkCount, ChunkIndex, UploadId, UserId};
use aether_upload_domain::{ChunkRecord, DedupDecision, EngineError, Job, SessionStatus, TimelineEvent, UploadSession};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::application::commands::{
    ChunkListing, ChunkStatus, ChunkUploadHeaders, ChunkUploadResponse, CompleteSessionRequest,
    CompleteSessionResponse, CreateSessionRequest, CreateSessionResponse,
};
use crate::infrastructure::assembly::{BundleAssembler, ChunkWriter};
use crate::infrastructure::cleanup::CleanupEngine;
use crate::infrastructure::dedup::Deduplicator;
use crate::infrastructure::storage::{DiskQuotaGate, UploadRoot};
use crate::infrastructure::verification::IntegrityVerifier;

/// The engine's session-lifecycle service.
pub struct UploadOrchestrator {
    sessions: Arc<dyn SessionRepository>,
    jobs: Arc<dyn JobRepository>,
    root: Arc<UploadRoot>,
    chunk_writer: ChunkWriter,
    assembler: BundleAssembler,
    verifier: IntegrityVerifier,
    deduplicator: Deduplicator,
    cleanup: Arc<CleanupEngine>,
    quota: Arc<DiskQuotaGate>,
}

impl UploadOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        jobs: Arc<dyn JobRepository>,
        root: Arc<UploadRoot>,
        chunk_writer: ChunkWriter,
        assembler: BundleAssembler,
        verifier: IntegrityVerifier,
        deduplicator: Deduplicator,
        cleanup: Arc<CleanupEngine>,
        quota: Arc<DiskQuotaGate>,
    ) -> Self {
        Self {
            sessions,
            jobs,
            root,
            chunk_writer,
            assembler,
            verifier,
            deduplicator,
            cleanup,
            quota,
        }
    }

    /// Creates an upload session (or short-circuits to instant upload).
    pub async fn create_session(
        &self,
        user_id: &UserId,
        req: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, EngineError> {
        if req.capture_source != CAPTURE_SOURCE_CAMERA {
            return Err(EngineError::InvalidRequest(
                "Only aether_camera capture is allowed".to_string(),
            ));
        }
        let bundle_hash = BundleHash::parse(&req.bundle_hash)?;
        if req.bundle_size == 0 {
            return Err(EngineError::InvalidRequest("Bundle size must be positive".to_string()));
        }
        if req.bundle_size > MAX_BUNDLE_SIZE_BYTES {
            return Err(EngineError::InvalidRequest("Bundle size exceeds 500MB limit".to_string()));
        }
        let chunk_count = ChunkCount::new(req.chunk_count)?;

        let now = Utc::now();

        // Tier-2: expire this user's overdue sessions before they can
        // block the active-session cap.
        let tier2 = self.cleanup.tier2_expire_user_sessions(user_id, now).await;
        if !tier2.errors.is_empty() {
            debug!(errors = tier2.errors.len(), "tier-2 cleanup finished with errors");
        }

        // Dedup path 1: pre-upload.
        let dedup = self.deduplicator.check_pre_upload(&bundle_hash, user_id).await?;
        if dedup.decision() == DedupDecision::InstantUpload {
            let job_id = dedup
                .existing_job_id()
                .ok_or_else(|| EngineError::internal_error("instant-upload outcome without a job id"))?;
            return Ok(CreateSessionResponse {
                upload_id: "instant".to_string(),
                status: "completed".to_string(),
                upload_url: None,
                chunk_size: None,
                expires_at: None,
                job_id: Some(job_id.to_string()),
            });
        }

        let active = self.sessions.count_active_for_user(user_id).await?;
        if active >= MAX_ACTIVE_UPLOADS_PER_USER {
            // A concurrent in-progress session for the same key is legal
            // to observe; it is logged, never a blocker, by dedup. The cap
            // is what blocks.
            return Err(EngineError::StateConflict(
                "Already has active upload session".to_string(),
            ));
        }

        self.quota.check_write_allowed()?;

        let session = UploadSession::new(
            user_id.clone(),
            req.capture_session_id,
            bundle_hash,
            req.bundle_size,
            chunk_count,
            now,
        );
        self.sessions.save_session(&session).await?;
        info!(
            upload_id = %session.id(),
            bundle = %session.bundle_hash(),
            chunk_count = session.chunk_count().get(),
            "upload session created"
        );

        Ok(CreateSessionResponse {
            upload_id: session.id().to_string(),
            status: SessionStatus::InProgress.as_str().to_string(),
            upload_url: Some(format!("/v1/uploads/{}/chunks", session.id())),
            chunk_size: Some(CHUNK_SIZE_BYTES),
            expires_at: Some(session.expires_at()),
            job_id: None,
        })
    }

    /// Ingests one chunk, idempotently.
    pub async fn upload_chunk(
        &self,
        user_id: &UserId,
        upload_id: &str,
        headers: &ChunkUploadHeaders,
        body: &[u8],
    ) -> Result<ChunkUploadResponse, EngineError> {
        let upload_id = UploadId::parse(upload_id)?;
        let session = self
            .sessions
            .find_session_for_user(&upload_id, user_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(upload_id.to_string()))?;

        let now = Utc::now();
        if !session.accepts_chunks(now) {
            return Err(EngineError::StateConflict(
                "Upload session is not accepting chunks".to_string(),
            ));
        }

        // Header validation runs before the body is considered at all;
        // an oversized declaration is rejected without reading a byte.
        let content_length: u64 = headers
            .content_length
            .as_deref()
            .ok_or_else(|| EngineError::InvalidRequest("Missing Content-Length".to_string()))?
            .parse()
            .map_err(|_| EngineError::InvalidRequest("Invalid Content-Length".to_string()))?;
        if content_length < 1 {
            return Err(EngineError::InvalidRequest("Empty chunk body".to_string()));
        }
        if content_length > CHUNK_SIZE_BYTES {
            return Err(EngineError::PayloadTooLarge("Chunk size exceeds 5MB limit".to_string()));
        }
        if body.len() as u64 != content_length {
            return Err(EngineError::InvalidRequest("Content-Length mismatch".to_string()));
        }

        let index_raw: u32 = headers
            .chunk_index
            .as_deref()
            .ok_or_else(|| EngineError::InvalidRequest("Missing X-Chunk-Index".to_string()))?
            .parse()
            .map_err(|_| EngineError::InvalidRequest("Invalid X-Chunk-Index".to_string()))?;
        let chunk_index = ChunkIndex::new(index_raw, session.chunk_count())?;

        let declared_hash = BundleHash::parse(
            headers
                .chunk_hash
                .as_deref()
                .ok_or_else(|| EngineError::InvalidRequest("Missing X-Chunk-Hash".to_string()))?,
        )?;

        // Idempotent duplicate handling by declared hash.
        if let Some(existing) = self.sessions.find_chunk(&upload_id, chunk_index.get()).await? {
            if existing.chunk_hash() == &declared_hash {
                let total_received = self.sessions.chunk_count_for_upload(&upload_id).await?;
                return Ok(ChunkUploadResponse {
                    chunk_index: chunk_index.get(),
                    chunk_status: ChunkStatus::AlreadyPresent,
                    received_size: body.len() as u64,
                    total_received,
                    total_chunks: session.chunk_count().get(),
                });
            }
            return Err(EngineError::StateConflict(
                "Chunk already exists with different hash".to_string(),
            ));
        }

        // File first (fsync-then-rename), database row second. The writer
        // verifies the payload digest before any disk mutation; at this
        // boundary a mismatch is a malformed request, not an assembly
        // fault.
        match self
            .chunk_writer
            .persist_chunk(&upload_id, chunk_index, body, &declared_hash)
            .await
        {
            Ok(_) => {}
            Err(EngineError::ChunkHashMismatch(detail)) => {
                warn!(upload_id = %upload_id, chunk_index = %chunk_index, "{}", detail);
                return Err(EngineError::InvalidRequest("Chunk hash mismatch".to_string()));
            }
            Err(e) => return Err(e),
        }

        let record = ChunkRecord::new(upload_id.clone(), chunk_index, declared_hash, body.len() as u64, now);
        match self.sessions.insert_chunk(&record).await {
            Ok(()) => {}
            Err(EngineError::StateConflict(_)) => {
                // Lost a duplicate-upload race on the unique constraint.
                // Both writers verified the same declared hash, so the
                // surviving row either matches (idempotent success) or the
                // conflict is real.
                let existing = self.sessions.find_chunk(&upload_id, chunk_index.get()).await?;
                match existing {
                    Some(existing) if existing.chunk_hash() == &declared_hash => {
                        let total_received = self.sessions.chunk_count_for_upload(&upload_id).await?;
                        return Ok(ChunkUploadResponse {
                            chunk_index: chunk_index.get(),
                            chunk_status: ChunkStatus::AlreadyPresent,
                            received_size: body.len() as u64,
                            total_received,
                            total_chunks: session.chunk_count().get(),
                        });
                    }
                    _ => {
                        return Err(EngineError::StateConflict(
                            "Chunk already exists with different hash".to_string(),
                        ));
                    }
                }
            }
            Err(e) => return Err(e),
        }

        let total_received = self.sessions.chunk_count_for_upload(&upload_id).await?;
        Ok(ChunkUploadResponse {
            chunk_index: chunk_index.get(),
            chunk_status: ChunkStatus::Stored,
            received_size: body.len() as u64,
            total_received,
            total_chunks: session.chunk_count().get(),
        })
    }

    /// Lists received and missing chunk indices.
    pub async fn list_chunks(&self, user_id: &UserId, upload_id: &str) -> Result<ChunkListing, EngineError> {
        let upload_id = UploadId::parse(upload_id)?;
        let session = self
            .sessions
            .find_session_for_user(&upload_id, user_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(upload_id.to_string()))?;

        let chunks = self.sessions.chunks_for_upload(&upload_id).await?;
        let received: Vec<u32> = chunks.iter().map(|c| c.chunk_index().get()).collect();
        let missing = missing_indices(&received, session.chunk_count());

        Ok(ChunkListing {
            upload_id: upload_id.to_string(),
            received_chunks: received,
            missing_chunks: missing,
            total_chunks: session.chunk_count().get(),
            status: session.status().as_str().to_string(),
            expires_at: session.expires_at(),
        })
    }

    /// Completes the session: assemble, verify, dedup, publish, clean up.
    pub async fn complete_session(
        &self,
        user_id: &UserId,
        upload_id: &str,
        req: CompleteSessionRequest,
    ) -> Result<CompleteSessionResponse, EngineError> {
        let upload_id = UploadId::parse(upload_id)?;
        let session = self
            .sessions
            .find_session_for_user(&upload_id, user_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(upload_id.to_string()))?;

        if session.status().is_terminal() {
            return Err(EngineError::StateConflict(format!(
                "Upload session is already {}",
                session.status().as_str()
            )));
        }

        let declared = BundleHash::parse(&req.bundle_hash)?;
        if &declared != session.bundle_hash() {
            return Err(EngineError::StateConflict("Bundle hash mismatch".to_string()));
        }

        // Fast count first; the slow path loads the index set only to name
        // the gaps for the client.
        let count = self.sessions.chunk_count_for_upload(&upload_id).await?;
        if count != session.chunk_count().get() {
            let chunks = self.sessions.chunks_for_upload(&upload_id).await?;
            let received: Vec<u32> = chunks.iter().map(|c| c.chunk_index().get()).collect();
            return Err(EngineError::MissingChunks(missing_indices(&received, session.chunk_count())));
        }

        let records = self.sessions.chunks_for_upload(&upload_id).await?;

        // Everything from assembly onward shares Tier-1 cleanup: chunks
        // and staging are removed whether materialization succeeded or
        // failed. Pre-assembly rejections above keep the chunks so the
        // client can resume.
        let outcome = self.materialize_and_publish(&session, &records).await;
        let tier1 = self.cleanup.tier1_post_assembly(session.id()).await;
        debug!(
            upload_id = %session.id(),
            chunks_deleted = tier1.chunks_deleted,
            dirs_deleted = tier1.dirs_deleted,
            "tier-1 cleanup after completion"
        );

        let job_id = outcome?;
        Ok(CompleteSessionResponse {
            upload_id: upload_id.to_string(),
            bundle_hash: session.bundle_hash().to_hex(),
            status: SessionStatus::Completed.as_str().to_string(),
            job_id,
        })
    }

    /// Assembly → verification → dedup path 2 → atomic publication.
    async fn materialize_and_publish(
        &self,
        session: &UploadSession,
        records: &[ChunkRecord],
    ) -> Result<String, EngineError> {
        let assembly = self.assembler.assemble(session, records).await?;

        match self.verifier.verify(session, &assembly, records).await {
            Ok(receipt) => {
                // The receipt is audit/log surface only; responses never
                // carry per-layer detail.
                match serde_json::to_string(&receipt) {
                    Ok(json) => info!(receipt = %json, "verification receipt"),
                    Err(e) => warn!("failed to serialize verification receipt: {}", e),
                }
            }
            Err(e) => {
                self.discard_bundle(session.bundle_hash()).await;
                return Err(e);
            }
        }

        // Dedup path 2: the race-safe checkpoint. A concurrent identical
        // upload that published while this one was assembling wins; the
        // fresh bundle is discarded in favor of its job.
        let dedup = self
            .deduplicator
            .check_post_assembly(session.bundle_hash(), session.user_id())
            .await?;
        if dedup.decision() == DedupDecision::ReuseBundle {
            let job_id = dedup
                .existing_job_id()
                .ok_or_else(|| EngineError::internal_error("reuse-bundle outcome without a job id"))?
                .to_string();
            self.sessions
                .update_status(session.id(), SessionStatus::Completed)
                .await?;
            return Ok(job_id);
        }

        let now = Utc::now();
        let job = Job::queued(session.user_id().clone(), *session.bundle_hash(), now);
        let event = TimelineEvent::job_created(job.id(), now);
        if let Err(e) = self.jobs.publish_completion(session.id(), &job, &event).await {
            // Fail closed on publication: the bundle must not outlive a
            // rolled-back job row.
            self.discard_bundle(session.bundle_hash()).await;
            return Err(e);
        }

        info!(
            upload_id = %session.id(),
            job_id = job.id(),
            bundle = %session.bundle_hash(),
            "job published"
        );
        Ok(job.id().to_string())
    }

    /// Fail-open removal of a bundle that must not be served.
    async fn discard_bundle(&self, hash: &BundleHash) {
        let path = self.root.bundle_file(hash);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(bundle = %hash, "failed to discard bundle (cleanup will sweep): {}", e);
            }
        }
    }
}

/// Complement of the received index set within `0..chunk_count`, sorted.
fn missing_indices(received: &[u32], chunk_count: ChunkCount) -> Vec<u32> {
    let received: std::collections::HashSet<u32> = received.iter().copied().collect();
    chunk_count.indices().filter(|i| !received.contains(i)).collect()
}
