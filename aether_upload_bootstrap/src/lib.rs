// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Bootstrap Module
//!
//! The bootstrap module sits **outside** the enterprise application layers
//! (domain, application, infrastructure) and provides:
//!
//! - **Entry point** - CLI parsing and validation for the daemon
//! - **Platform abstraction** - fsync semantics (incl. macOS
//!   `F_FULLFSYNC`), directory fsync, and filesystem capacity for the
//!   disk-quota gate
//! - **Signal handling** - graceful shutdown (SIGTERM, SIGINT, SIGHUP)
//! - **Shutdown coordination** - cancellation tokens and grace period
//! - **Exit codes** - Unix `sysexits` mapping for supervisors
//!
//! ## Architecture Position
//!
//! Bootstrap can see every layer; no enterprise layer may depend on
//! bootstrap types except through the traits re-exported here
//! (`Platform`, `CancellationToken`).
//!
//! ## Key Design Principles
//!
//! 1. **Platform abstraction** - OS specifics behind a trait with
//!    compile-time selection and cross-compilation stubs
//! 2. **Graceful shutdown** - tokens propagate to the cleanup scheduler and
//!    in-flight assembly; interrupted work leaves only staging artifacts
//!    that the next startup sweep reaps
//! 3. **Security first** - CLI path arguments are validated before they can
//!    reach a path join

// Re-export modules
pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod platform;
pub mod shutdown;
pub mod signals;

// Re-export commonly used types
pub use cli::{parse_and_validate, Commands, ParseError, ValidatedCli};
pub use exit_code::{result_to_exit_code, ExitCode};
pub use logger::{BootstrapLogger, ConsoleLogger, NoOpLogger};
pub use platform::{create_platform, DiskUsage, Platform, PlatformError};
pub use shutdown::{CancellationToken, ShutdownCoordinator};
pub use signals::install_signal_handlers;

/// Bootstrap and parse CLI arguments
///
/// Entry point for the bootstrap layer: parses with clap, applies security
/// validation, and hands the validated configuration to the caller. The
/// caller runs the application and maps its result through
/// [`result_to_exit_code`].
///
/// # Errors
///
/// Returns `cli::ParseError` if CLI parsing or validation fails. Clap
/// handles `--help` and `--version` itself.
pub fn bootstrap_cli() -> Result<ValidatedCli, ParseError> {
    cli::parse_and_validate()
}
