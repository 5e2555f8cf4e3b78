// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache driver types and error handling
//!
//! This module defines the types, enums, and error handling used by the
//! cache drivers that persist session-pool metadata and auth tokens.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Cache driver type configuration
///
/// Specifies which backing store holds the cache entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Memory - process-local, lost on drop
    /// Best for: tests, short-lived processes
    #[default]
    Memory,

    /// Sled - embedded on-disk store, shareable between runs of a process
    /// Best for: long-running services that want to reuse sessions after restart
    Sled,
}

impl std::str::FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(CacheType::Memory),
            "sled" | "file" => Ok(CacheType::Sled),
            _ => Err(format!(
                "Unknown cache type: {}. Valid options: memory, sled",
                s
            )),
        }
    }
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CacheType::Memory => "memory",
            CacheType::Sled => "sled",
        };
        write!(f, "{}", name)
    }
}

/// Error type for cache driver operations
#[derive(Debug)]
pub enum CacheError {
    /// I/O related errors
    IoError(std::io::Error),

    /// Entry could not be encoded or decoded
    SerializationError(String),

    /// Requested backend is not compiled in
    Unavailable(String),

    /// Driver-specific error
    BackendSpecific(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::IoError(e) => write!(f, "I/O error: {}", e),
            CacheError::SerializationError(e) => write!(f, "Serialization error: {}", e),
            CacheError::Unavailable(e) => write!(f, "Cache backend unavailable: {}", e),
            CacheError::BackendSpecific(e) => write!(f, "Cache driver error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::IoError(e)
    }
}

impl From<bincode::Error> for CacheError {
    fn from(e: bincode::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}

/// Result type for cache driver operations
pub type CacheResult<T> = Result<T, CacheError>;
