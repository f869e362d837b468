// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Entities
//!
//! Objects with identity that persist through state changes. In-memory
//! entity values are snapshots loaded per operation; the database is the
//! authority and no entity holds back-pointers to another.
//!
//! - [`UploadSession`]: The transient state allowing one client to upload
//!   the chunks of one bundle; owns its on-disk subtree
//! - [`ChunkRecord`]: One received chunk of a session, unique on
//!   `(upload_id, chunk_index)`
//! - [`Job`]: Downstream processing unit created exactly once per distinct
//!   live `(bundle_hash, user_id)`; the engine creates it and never mutates
//!   its state afterward
//! - [`TimelineEvent`]: Audit record of a job state transition; the initial
//!   `job_created` event is the engine's responsibility

mod chunk_record;
mod job;
mod upload_session;

pub use chunk_record::ChunkRecord;
pub use job::{Job, JobState, TimelineEvent};
pub use upload_session::{SessionStatus, UploadSession};
