// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A leased remote session
///
/// `generation` ties the lease to the pool state it came from; a lease
/// taken before a pool clear is stale and its release is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub name: String,
    pub generation: u64,
}

impl SessionHandle {
    pub fn new(name: impl Into<String>, generation: u64) -> Self {
        Self {
            name: name.into(),
            generation,
        }
    }
}

/// Persisted session metadata
///
/// `leased_by` names the pool currently holding the session. Pools sharing
/// a cache only lease entries nobody else holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub leased_by: Option<String>,
    pub leased_at: Option<DateTime<Utc>>,
}

impl SessionInfo {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            created_at: now,
            last_used_at: now,
            leased_by: None,
            leased_at: None,
        }
    }

    /// Whether a pool may take this session
    ///
    /// A lease older than `max_idle` is treated as abandoned by a pool that
    /// went away without releasing it.
    pub fn is_claimable(&self, max_idle: Duration, now: DateTime<Utc>) -> bool {
        match self.leased_at {
            Some(leased_at) if self.leased_by.is_some() => now - leased_at > max_idle,
            _ => true,
        }
    }

    pub fn is_leased_by(&self, owner: &str) -> bool {
        self.leased_by.as_deref() == Some(owner)
    }

    pub fn lease_to(&mut self, owner: &str) {
        self.leased_by = Some(owner.to_string());
        self.leased_at = Some(Utc::now());
    }

    pub fn unlease(&mut self) {
        self.leased_by = None;
        self.leased_at = None;
    }

    /// Update last-use timestamp
    pub fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_used_at
    }

    pub fn is_idle_longer_than(&self, max_idle: Duration, now: DateTime<Utc>) -> bool {
        self.idle_for(now) > max_idle
    }
}
