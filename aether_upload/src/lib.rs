// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Aether Upload Engine
//!
//! Server-side chunked upload reception and content-addressed bundle
//! materialization for the Aether 3D reconstruction service. Untrusted
//! clients split media bundles (up to 500 MiB) into at most 200 fixed-size
//! chunks; the engine materializes them on durable storage under strong
//! integrity guarantees, deduplicates identical bundles per user, and
//! publishes a processing job atomically with the materialized bundle.
//!
//! ## Architecture Overview
//!
//! Clean Architecture with the domain crate at the center:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer                          │
//! │  (UploadOrchestrator, request/response commands)            │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! │  (aether-upload-domain: entities, value objects, merkle,    │
//! │   verification model, dedup decisions, repository ports)    │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Infrastructure Layer                         │
//! │  (assembly pipeline, verifier, deduplicator, cleanup,       │
//! │   SQLite repositories, sandbox, quota gate, config)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Subsystems
//!
//! - **Assembly pipeline**: atomic chunk persistence (tmp → fsync →
//!   rename → dir fsync) and a three-way single-pass materializer that
//!   reads, hashes, and writes in one streaming sweep
//! - **Integrity verifier**: five progressive layers, cheapest first, with
//!   RFC 9162 merkle parity against the reference client and a sampled
//!   mode for large bundles
//! - **Deduplicator**: pre-upload and post-assembly paths over the job
//!   store, user-scoped by privacy contract
//! - **Cleanup engine**: three fail-open tiers with strict DB-before-file
//!   ordering

pub mod application;
pub mod infrastructure;

pub use application::commands::{
    ChunkListing, ChunkStatus, ChunkUploadHeaders, ChunkUploadResponse, CompleteSessionRequest,
    CompleteSessionResponse, CreateSessionRequest, CreateSessionResponse,
};
pub use application::UploadOrchestrator;
pub use infrastructure::config::EngineConfig;
