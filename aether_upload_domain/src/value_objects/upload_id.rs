// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Session Identifier
//!
//! Type-safe, path-safe identifier for upload sessions. The identifier names
//! the session's on-disk subtree under the upload root, so the character set
//! is restricted to `[A-Za-z0-9_-]` with a 1..=128 length bound. This is the
//! first of the two sandbox layers; the resolved-path prefix check in the
//! infrastructure layer is the second.
//!
//! Identifiers loaded back from the database are re-validated through the
//! same constructor (defense in depth: a corrupted or hand-edited row must
//! not become a path component).

use std::fmt::{self, Display};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

static UPLOAD_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("upload id pattern is valid"));

/// Opaque, path-safe upload session identifier.
///
/// Two layers of the engine depend on its guarantees:
///
/// - the storage sandbox uses it directly as a directory name
/// - the database uses it as the `upload_sessions` primary key
///
/// Equality is by value. The canonical generated form is a UUID v4 in simple
/// (dashless) rendering, but any string matching the contract pattern is
/// accepted, so ids minted by other services interoperate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UploadId(String);

impl UploadId {
    /// Generates a new random identifier (UUID v4, simple form).
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parses and validates an identifier from an untrusted string.
    ///
    /// # Errors
    /// Returns `EngineError::PathTraversal` when the string contains any
    /// character outside `[A-Za-z0-9_-]` or violates the length bound. The
    /// security kind is deliberate: a failed id validation is an attempted
    /// sandbox escape, not a malformed field.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        if UPLOAD_ID_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(EngineError::PathTraversal(format!(
                "upload id does not match path-component contract (len {})",
                raw.len()
            )))
        }
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for UploadId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UploadId> for String {
    fn from(id: UploadId) -> Self {
        id.0
    }
}

impl AsRef<str> for UploadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
