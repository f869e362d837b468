// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Mapping
//!
//! Unix `sysexits`-style exit codes for the daemon binary so supervisors
//! and scripts can distinguish configuration mistakes from runtime faults.

use std::fmt::Display;

/// Unix exit codes used by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Successful termination
    Success = 0,
    /// Malformed input data or arguments (EX_DATAERR)
    DataErr = 65,
    /// A required service is unavailable (EX_UNAVAILABLE)
    Unavailable = 69,
    /// Internal software error (EX_SOFTWARE)
    Software = 70,
    /// Filesystem I/O error (EX_IOERR)
    IoErr = 74,
    /// Configuration error (EX_CONFIG)
    Config = 78,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

/// Maps a result to an exit code, logging the error on failure.
///
/// Classification is keyword-based over the error display; the app crate
/// keeps its internal taxonomy, and only the coarse class matters to a
/// supervisor. Convert with `.into()` at the `main` boundary.
pub fn result_to_exit_code<E: Display>(result: Result<(), E>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            let rendered = e.to_string();
            eprintln!("error: {}", rendered);
            classify(&rendered)
        }
    }
}

fn classify(message: &str) -> ExitCode {
    let lower = message.to_lowercase();
    if lower.contains("config") {
        ExitCode::Config
    } else if lower.contains("database") || lower.contains("unavailable") {
        ExitCode::Unavailable
    } else if lower.contains("io error") || lower.contains("i/o") || lower.contains("disk") {
        ExitCode::IoErr
    } else if lower.contains("invalid") {
        ExitCode::DataErr
    } else {
        ExitCode::Software
    }
}
