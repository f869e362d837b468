// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Aether Upload Domain
//!
//! The upload domain holds the core business rules of the chunked upload
//! reception and content-addressed bundle materialization engine. It is
//! completely independent of external concerns: no filesystem, no database,
//! no HTTP, no async runtime.
//!
//! ## Module Structure
//!
//! - `contract`: normative constants and domain-separation tags shared
//!   with the reference client
//! - `entities`: `UploadSession`, `ChunkRecord`, `Job`, `TimelineEvent`
//! - `value_objects`: path-safe identifiers and validated quantities
//! - `services`: merkle tree (RFC 9162), verification model and sampling
//!   math, dedup decision values
//! - `repositories`: async persistence ports implemented by the
//!   infrastructure layer
//! - `error`: the internal failure taxonomy and its collapse into the
//!   closed external seven-code surface
//!
//! ## Business Rules and Invariants
//!
//! The domain layer enforces the contract-level invariants:
//!
//! ### Session Rules
//! - A session declares its bundle hash, size, and chunk count up front and
//!   cannot change them
//! - Terminal statuses (`completed`, `expired`) accept no transitions
//! - Expiry is a fixed 24-hour window from creation
//!
//! ### Content Addressing Rules
//! - Every digest on the wire is 64 lowercase hex characters
//! - Chunk indices are contiguous `0..chunk_count` and render as six-digit
//!   zero-padded file stems
//! - Path-derived identifiers are validated at every construction site,
//!   including rows loaded back from the database
//!
//! ### Dedup Rules
//! - The lookup key is `(bundle_hash, user_id)`; never cross-user
//! - Only `{completed, queued, processing}` jobs block re-upload

pub mod contract;
pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
// These exports provide a clean API surface for consumers of the domain layer
pub use entities::{ChunkRecord, Job, JobState, SessionStatus, TimelineEvent, UploadSession};
pub use error::{ApiErrorCode, EngineError, ErrorResponse};
pub use services::{DedupDecision, DedupOutcome, VerificationLayer, VerificationMode, VerificationReceipt};
pub use value_objects::{BundleHash, ChunkCount, ChunkIndex, UploadId, UserId};
