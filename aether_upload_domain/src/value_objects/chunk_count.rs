// /////////////////////////////////////////////////////////////////////////////
// Aether Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Count Value Object
//!
//! Declared number of chunks in a bundle, validated at session creation.
//! The upper bound (200) is a contract constant chosen so that the merkle
//! leaf vector stays small enough for the level-by-level builder.

use serde::{Deserialize, Serialize};

use crate::contract::MAX_CHUNK_COUNT;
use crate::error::EngineError;

/// Validated chunk count, `1..=200`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ChunkCount(u32);

impl ChunkCount {
    /// Validates and wraps a declared chunk count.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRequest` for zero or anything above the
    /// contract maximum.
    pub fn new(count: u32) -> Result<Self, EngineError> {
        if count == 0 {
            return Err(EngineError::InvalidRequest("chunk count must be at least 1".to_string()));
        }
        if count > MAX_CHUNK_COUNT {
            return Err(EngineError::InvalidRequest(format!(
                "chunk count exceeds {} limit",
                MAX_CHUNK_COUNT
            )));
        }
        Ok(Self(count))
    }

    /// Returns the count as a plain integer.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Iterates the full expected index range `0..count`.
    pub fn indices(&self) -> impl Iterator<Item = u32> {
        0..self.0
    }
}

impl TryFrom<u32> for ChunkCount {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChunkCount> for u32 {
    fn from(count: ChunkCount) -> Self {
        count.0
    }
}
