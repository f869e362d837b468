// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Three-Path Deduplicator
//!
//! Deduplicates identical bundles across sessions against the job store,
//! always scoped to `(bundle_hash, user_id)`:
//!
//! - **Path 1, pre-upload**: checked on `create_session`. A live duplicate
//!   means the client need not upload at all (instant upload).
//! - **Path 2, post-assembly**: checked after the verifier passes and
//!   before job publication. This is the race-safe checkpoint: it closes
//!   the window where two clients concurrently uploaded identical content
//!   while the first was still assembling. On a match the freshly
//!   assembled bundle file is deleted and the existing job reused.
//! - **Path 3, cross-user**: reserved. Returns `Proceed` unconditionally
//!   in this release; the interface is preserved for future
//!   content-addressed shared storage.
//!
//! The live-duplicate state set is closed (`completed`, `queued`,
//! `processing`); failed and cancelled jobs never block a re-upload.

use std::sync::Arc;

use aether_upload_domain::repositories::JobRepository;
use aether_upload_domain::value_objects::{BundleHash, UserId};
use aether_upload_domain::{DedupOutcome, EngineError};
use tracing::{info, warn};

use crate::infrastructure::storage::UploadRoot;

/// Dedup engine over the job store.
pub struct Deduplicator {
    jobs: Arc<dyn JobRepository>,
    root: Arc<UploadRoot>,
}

impl Deduplicator {
    pub fn new(jobs: Arc<dyn JobRepository>, root: Arc<UploadRoot>) -> Self {
        Self { jobs, root }
    }

    /// Path 1: pre-upload check on session creation.
    pub async fn check_pre_upload(&self, bundle_hash: &BundleHash, user_id: &UserId) -> Result<DedupOutcome, EngineError> {
        match self.jobs.find_live_duplicate(bundle_hash, user_id).await? {
            Some(job) => {
                info!(
                    bundle = %bundle_hash,
                    existing_job = job.id(),
                    "instant upload: live duplicate found pre-upload"
                );
                Ok(DedupOutcome::instant_upload(job.id()))
            }
            None => Ok(DedupOutcome::proceed()),
        }
    }

    /// Path 2: post-assembly check before publication.
    ///
    /// On a match the freshly assembled bundle file is deleted (fail-open:
    /// a failed delete is logged and left to the cleanup sweeps) and the
    /// existing job is returned for reuse.
    pub async fn check_post_assembly(
        &self,
        bundle_hash: &BundleHash,
        user_id: &UserId,
    ) -> Result<DedupOutcome, EngineError> {
        match self.jobs.find_live_duplicate(bundle_hash, user_id).await? {
            Some(job) => {
                info!(
                    bundle = %bundle_hash,
                    existing_job = job.id(),
                    "reuse bundle: concurrent identical upload detected post-assembly"
                );
                let bundle_path = self.root.bundle_file(bundle_hash);
                if let Err(e) = tokio::fs::remove_file(&bundle_path).await {
                    warn!(
                        bundle = %bundle_hash,
                        "failed to delete duplicate bundle file (cleanup will sweep): {}",
                        e
                    );
                }
                Ok(DedupOutcome::reuse_bundle(job.id()))
            }
            None => Ok(DedupOutcome::proceed()),
        }
    }

    /// Path 3: reserved cross-user dedup. Unconditional `Proceed`.
    pub fn check_cross_user(&self) -> DedupOutcome {
        DedupOutcome::proceed()
    }
}
