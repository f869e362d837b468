// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bundle Hash Value Object
//!
//! Content address of a bundle or chunk: a SHA-256 digest carried as 32 raw
//! bytes and rendered as 64 lower-hex characters on the wire and on disk.
//!
//! ## Overview
//!
//! The same value object addresses both whole bundles and individual chunks;
//! both are content-addressed with plain (untagged) SHA-256 per the upload
//! contract. Domain-separated digests (manifest, context) go through
//! [`crate::contract::tagged_digest`] instead and never through this type's
//! `digest` constructor.
//!
//! Because the hex rendering becomes a path component
//! (`<upload_root>/<hash>.bundle`), parsing enforces lowercase hex strictly.
//! Uppercase input is rejected rather than normalized so that a database row
//! and the file it names can never disagree about case.
//!
//! Equality on this type is ordinary `Eq` and is used for set membership and
//! database keys. Integrity decisions must use the infrastructure layer's
//! constant-time comparison; short-circuiting equality leaks hash-prefix
//! similarity to a timing observer.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EngineError;

/// A SHA-256 content address (64 lower-hex on the wire, 32 bytes in memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BundleHash([u8; 32]);

impl BundleHash {
    /// Wraps a finalized digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Hashes `data` and returns its content address.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Parses a 64-character lower-hex digest from an untrusted string.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRequest` for anything that is not
    /// exactly 64 lowercase hex characters.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        if raw.len() != 64 || !raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(EngineError::InvalidRequest(
                "hash must be 64 lowercase hex characters".to_string(),
            ));
        }
        let mut out = [0u8; 32];
        hex::decode_to_slice(raw, &mut out)
            .map_err(|e| EngineError::InvalidRequest(format!("invalid hex digest: {}", e)))?;
        Ok(Self(out))
    }

    /// Returns the raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the canonical lower-hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for BundleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for BundleHash {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BundleHash> for String {
    fn from(hash: BundleHash) -> Self {
        hash.to_hex()
    }
}
