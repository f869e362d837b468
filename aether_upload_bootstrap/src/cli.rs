// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parse_cli()                     │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```
//!
//! Path arguments are rejected when they contain NUL bytes or control
//! characters; the deeper upload-root sandbox checks belong to the app
//! crate, which canonicalizes against the configured root.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

/// CLI parse/validation errors
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    #[error("Invalid path argument: {0}")]
    InvalidPath(String),
}

/// Raw CLI structure parsed by clap.
#[derive(Parser, Debug)]
#[command(name = "aether-uploadd", version, about = "Aether upload engine daemon")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the upload root directory
    #[arg(long, global = true)]
    pub upload_root: Option<PathBuf>,

    /// Override the database URL
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Log filter, e.g. `info` or `aether_upload=debug`
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the engine with the periodic cleanup scheduler
    Serve,
    /// Run one global cleanup pass and exit
    Cleanup,
}

/// Validated CLI configuration
///
/// All string arguments are checked for NUL bytes and control characters
/// before they can reach a path join or a connection string.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: Commands,
    pub config: Option<PathBuf>,
    pub upload_root: Option<PathBuf>,
    pub database_url: Option<String>,
    pub log_level: String,
}

/// Parse CLI arguments from the process environment.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse and validate CLI arguments
///
/// Clap handles `--help` and `--version` and exits the process itself.
///
/// # Errors
///
/// Returns `ParseError` if any validation fails.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(parse_cli())
}

/// Validate parsed CLI arguments.
pub fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    if let Some(ref path) = cli.config {
        validate_path_argument("config", path)?;
    }
    if let Some(ref path) = cli.upload_root {
        validate_path_argument("upload-root", path)?;
    }

    if let Some(ref url) = cli.database_url {
        if url.is_empty() || url.chars().any(|c| c.is_control()) {
            return Err(ParseError::InvalidValue {
                arg: "database-url".to_string(),
                reason: "must be non-empty printable text".to_string(),
            });
        }
    }

    if cli.log_level.is_empty() || cli.log_level.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ParseError::InvalidValue {
            arg: "log-level".to_string(),
            reason: "must be a non-empty filter directive".to_string(),
        });
    }

    Ok(ValidatedCli {
        command: cli.command,
        config: cli.config,
        upload_root: cli.upload_root,
        database_url: cli.database_url,
        log_level: cli.log_level,
    })
}

fn validate_path_argument(arg: &str, path: &PathBuf) -> Result<(), ParseError> {
    let raw = path.to_string_lossy();
    if raw.is_empty() {
        return Err(ParseError::InvalidValue {
            arg: arg.to_string(),
            reason: "path must not be empty".to_string(),
        });
    }
    if raw.chars().any(|c| c == '\0' || (c.is_control() && c != '\t')) {
        return Err(ParseError::InvalidPath(format!(
            "--{} contains control characters",
            arg
        )));
    }
    Ok(())
}
