// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job and Timeline Entities
//!
//! The downstream 3D processing pipeline owns the job state machine; this
//! engine only creates jobs in the `Queued` state (together with the initial
//! timeline event) and queries them for deduplication. No code here ever
//! advances a job's state.
//!
//! ## Live duplicates
//!
//! The set of states that block a re-upload of identical content is closed:
//! `{Completed, Queued, Processing}`. A job that failed, was cancelled, or
//! is stuck in a pre-queue state explicitly does not block re-upload, so a
//! client can recover from a downstream failure by uploading again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::value_objects::{BundleHash, UserId};

/// Downstream job state machine (external; consumed as a black box).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Uploading,
    Packaging,
    Queued,
    Processing,
    CapacitySaturated,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Canonical database / wire rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Uploading => "uploading",
            JobState::Packaging => "packaging",
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::CapacitySaturated => "capacity_saturated",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Parses the database rendering.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        match raw {
            "pending" => Ok(JobState::Pending),
            "uploading" => Ok(JobState::Uploading),
            "packaging" => Ok(JobState::Packaging),
            "queued" => Ok(JobState::Queued),
            "processing" => Ok(JobState::Processing),
            "capacity_saturated" => Ok(JobState::CapacitySaturated),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "cancelled" => Ok(JobState::Cancelled),
            other => Err(EngineError::SerializationError(format!("unknown job state '{}'", other))),
        }
    }

    /// True when a job in this state blocks re-upload of identical content.
    pub fn is_live_duplicate(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Queued | JobState::Processing)
    }
}

/// Downstream processing unit, created exactly once per distinct live
/// `(bundle_hash, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    id: String,
    user_id: UserId,
    bundle_hash: BundleHash,
    state: JobState,
    created_at: DateTime<Utc>,
}

impl Job {
    /// Creates a new queued job for a freshly published bundle.
    pub fn queued(user_id: UserId, bundle_hash: BundleHash, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            bundle_hash,
            state: JobState::Queued,
            created_at: now,
        }
    }

    /// Reconstitutes a job from persisted fields.
    pub fn from_parts(
        id: String,
        user_id: UserId,
        bundle_hash: BundleHash,
        state: JobState,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            bundle_hash,
            state,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn bundle_hash(&self) -> &BundleHash {
        &self.bundle_hash
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Audit record of a job state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    id: String,
    job_id: String,
    timestamp: DateTime<Utc>,
    from_state: Option<JobState>,
    to_state: JobState,
    trigger: String,
}

impl TimelineEvent {
    /// The initial event the engine writes alongside job creation.
    pub fn job_created(job_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            job_id: job_id.to_string(),
            timestamp: now,
            from_state: None,
            to_state: JobState::Queued,
            trigger: "job_created".to_string(),
        }
    }

    /// Reconstitutes an event from persisted fields.
    pub fn from_parts(
        id: String,
        job_id: String,
        timestamp: DateTime<Utc>,
        from_state: Option<JobState>,
        to_state: JobState,
        trigger: String,
    ) -> Self {
        Self {
            id,
            job_id,
            timestamp,
            from_state,
            to_state,
            trigger,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn from_state(&self) -> Option<JobState> {
        self.from_state
    }

    pub fn to_state(&self) -> JobState {
        self.to_state
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_duplicate_set_is_closed() {
        let live = [JobState::Completed, JobState::Queued, JobState::Processing];
        let not_live = [
            JobState::Pending,
            JobState::Uploading,
            JobState::Packaging,
            JobState::CapacitySaturated,
            JobState::Failed,
            JobState::Cancelled,
        ];
        for state in live {
            assert!(state.is_live_duplicate(), "{:?} must block re-upload", state);
        }
        for state in not_live {
            assert!(!state.is_live_duplicate(), "{:?} must not block re-upload", state);
        }
    }

    #[test]
    fn test_state_roundtrip() {
        for raw in [
            "pending",
            "uploading",
            "packaging",
            "queued",
            "processing",
            "capacity_saturated",
            "completed",
            "failed",
            "cancelled",
        ] {
            assert_eq!(JobState::parse(raw).unwrap().as_str(), raw);
        }
        assert!(JobState::parse("unknown").is_err());
    }

    #[test]
    fn test_engine_creates_jobs_queued() {
        let now = Utc::now();
        let job = Job::queued(UserId::new("u").unwrap(), BundleHash::digest(b"b"), now);
        assert_eq!(job.state(), JobState::Queued);

        let event = TimelineEvent::job_created(job.id(), now);
        assert_eq!(event.from_state(), None);
        assert_eq!(event.to_state(), JobState::Queued);
        assert_eq!(event.trigger(), "job_created");
        assert_eq!(event.job_id(), job.id());
    }
}
