// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Connection configuration
//!
//! Configuration is plain serde data with defaults for every field, so a
//! minimal JSON document only needs the database path:
//!
//! ```json
//! { "database": "projects/p/instances/i/databases/d" }
//! ```
//!
//! Durations are written as whole seconds.

use crate::cache::CacheType;
use crate::error::Result;
use crate::session::RecoveryMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default namespace for cache trees
pub const DEFAULT_CACHE_NAMESPACE: &str = "spanlite";

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Session pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPoolConfig {
    /// Sessions created by warmup and kept by maintain
    pub min_sessions: usize,
    /// Upper bound on concurrently leased sessions
    pub max_sessions: usize,
    /// Available sessions unused for longer than this are pruned by maintain
    #[serde(with = "secs")]
    pub max_idle: Duration,
}

impl Default for SessionPoolConfig {
    fn default() -> Self {
        Self {
            min_sessions: 1,
            max_sessions: 100,
            max_idle: Duration::from_secs(50 * 60),
        }
    }
}

impl SessionPoolConfig {
    pub fn with_min_sessions(mut self, min_sessions: usize) -> Self {
        self.min_sessions = min_sessions;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }
}

/// Where pool metadata and auth tokens are cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_type: CacheType,
    /// Directory of on-disk backends
    pub path: Option<PathBuf>,
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::Memory,
            path: None,
            namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn with_cache_type(mut self, cache_type: CacheType) -> Self {
        self.cache_type = cache_type;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// Top-level connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Remote database path, reported in diagnostics
    pub database: String,
    /// Without a pool every operation creates and deletes its own session
    pub session_pool: Option<SessionPoolConfig>,
    pub cache: CacheConfig,
    pub session_not_found_mode: RecoveryMode,
    /// Outer transaction attempts; the store's recommended retries + 1 when unset
    pub max_transaction_attempts: Option<u32>,
    pub request_tag: Option<String>,
    pub transaction_tag: Option<String>,
    #[serde(with = "secs")]
    pub auth_token_ttl: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            session_pool: Some(SessionPoolConfig::default()),
            cache: CacheConfig::default(),
            session_not_found_mode: RecoveryMode::default(),
            max_transaction_attempts: None,
            request_tag: None,
            transaction_tag: None,
            auth_token_ttl: Duration::from_secs(55 * 60),
        }
    }
}

impl ConnectionConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_session_pool(mut self, pool: SessionPoolConfig) -> Self {
        self.session_pool = Some(pool);
        self
    }

    pub fn without_session_pool(mut self) -> Self {
        self.session_pool = None;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_session_not_found_mode(mut self, mode: RecoveryMode) -> Self {
        self.session_not_found_mode = mode;
        self
    }

    pub fn with_max_transaction_attempts(mut self, attempts: u32) -> Self {
        self.max_transaction_attempts = Some(attempts);
        self
    }

    pub fn with_request_tag(mut self, tag: impl Into<String>) -> Self {
        self.request_tag = Some(tag.into());
        self
    }

    pub fn with_transaction_tag(mut self, tag: impl Into<String>) -> Self {
        self.transaction_tag = Some(tag.into());
        self
    }

    pub fn with_auth_token_ttl(mut self, ttl: Duration) -> Self {
        self.auth_token_ttl = ttl;
        self
    }
}
