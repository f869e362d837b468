// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Repository Port
//!
//! Persistence contract for job creation and dedup queries. The job state
//! machine is owned downstream; this port only supports what the engine
//! needs: atomic publication and user-scoped live-duplicate lookup.

use async_trait::async_trait;

use crate::entities::{Job, TimelineEvent};
use crate::error::EngineError;
use crate::value_objects::{BundleHash, UploadId, UserId};

/// Persistence port for jobs and timeline events.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Finds a job for `(bundle_hash, user_id)` whose state is in the
    /// closed live-duplicate set `{completed, queued, processing}`.
    ///
    /// The query is user-scoped by contract: identical content owned by
    /// another user must not match.
    async fn find_live_duplicate(
        &self,
        bundle_hash: &BundleHash,
        user_id: &UserId,
    ) -> Result<Option<Job>, EngineError>;

    /// Atomically publishes a completed upload: marks the session
    /// completed, inserts the job, and inserts the initial timeline event
    /// in one transaction. Either all three are visible or none is.
    async fn publish_completion(
        &self,
        session_id: &UploadId,
        job: &Job,
        event: &TimelineEvent,
    ) -> Result<(), EngineError>;

    /// Loads a job by id (test and audit support).
    async fn find_job(&self, id: &str) -> Result<Option<Job>, EngineError>;
}
