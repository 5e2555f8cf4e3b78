// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Auth token cache
//!
//! Tokens are opaque to this layer. Each entry carries its own expiry and
//! is evicted the first time it is read after that point.

use super::traits::CacheTree;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenEntry {
    token: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// Expiring token store over a cache tree
pub struct AuthTokenCache {
    tree: Box<dyn CacheTree>,
}

impl AuthTokenCache {
    pub fn new(tree: Box<dyn CacheTree>) -> Self {
        Self { tree }
    }

    /// Store a token that stays valid for `ttl`
    pub fn put(&self, key: &str, token: &[u8], ttl: Duration) -> Result<()> {
        let entry = TokenEntry {
            token: token.to_vec(),
            expires_at: Utc::now() + ttl,
        };
        self.tree.insert(key.as_bytes(), &bincode::serialize(&entry)?)?;
        Ok(())
    }

    /// Fetch a live token; expired entries are removed and reported missing
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(bytes) = self.tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        let entry: TokenEntry = bincode::deserialize(&bytes)?;
        if entry.expires_at <= Utc::now() {
            log::debug!("Evicting expired auth token '{}'", key);
            self.tree.remove(key.as_bytes())?;
            return Ok(None);
        }
        Ok(Some(entry.token))
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.tree.clear()?;
        Ok(())
    }
}
