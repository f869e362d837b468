// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Logging
//!
//! Tracing subscriber initialization for the daemon. Structured fields are
//! used throughout the engine (`upload_id`, `bundle`, `quota`,
//! `cleanup_error`, verification receipts) so operators can filter without
//! parsing prose. Internal error kinds appear only here, never in external
//! responses.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// `filter` is an `EnvFilter` directive such as `info` or
/// `aether_upload=debug,sqlx=warn`; the `RUST_LOG` environment variable
/// wins when set. Idempotent: a second call is a no-op so tests can call
/// it freely.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
