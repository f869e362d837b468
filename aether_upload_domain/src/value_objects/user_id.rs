// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # User Identifier
//!
//! Identifier of the authenticated principal that owns sessions and jobs.
//! The engine treats it as opaque: it is produced by the authentication
//! middleware (out of scope) and consumed only for ownership scoping and the
//! dedup privacy contract. It is never used as a path component.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Maximum accepted length for a user identifier.
const MAX_USER_ID_LEN: usize = 255;

/// Opaque authenticated-principal identifier.
///
/// Dedup lookups are keyed `(bundle_hash, user_id)` and must never cross
/// user boundaries, so this type exists to make "which user" explicit in
/// every signature that touches the job store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validates and wraps a user identifier.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRequest` when empty, longer than 255
    /// characters, or containing control characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, EngineError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(EngineError::InvalidRequest("user id cannot be empty".to_string()));
        }
        if raw.len() > MAX_USER_ID_LEN {
            return Err(EngineError::InvalidRequest(format!(
                "user id exceeds {} characters",
                MAX_USER_ID_LEN
            )));
        }
        if raw.chars().any(|c| c.is_control()) {
            return Err(EngineError::InvalidRequest(
                "user id contains control characters".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
