// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache storage adapter
//!
//! Trait-based key/blob storage used to persist session-pool metadata and
//! auth tokens, so that different backends can be used interchangeably.
//!
//! # Architecture
//!
//! ```text
//! SessionPool / AuthTokenCache (typed entries, bincode)
//!     ↓
//! CacheDriver / CacheTree (key/blob abstraction)
//!     ↓
//! Concrete implementations (Memory, Sled)
//! ```
//!
//! Trees are named `<namespace>/sessions` and `<namespace>/auth`.

pub mod auth;
pub mod factory;
pub mod memory;
#[cfg(feature = "sled-backend")]
pub mod sled;
pub mod traits;
pub mod types;

pub use auth::AuthTokenCache;
pub use factory::{create_cache_driver, BoxedCacheDriver};
pub use memory::MemoryCacheDriver;
pub use traits::{CacheDriver, CacheTree};
pub use types::{CacheError, CacheResult, CacheType};

/// Tree holding session-pool metadata for a namespace
pub fn sessions_tree_name(namespace: &str) -> String {
    format!("{}/sessions", namespace)
}

/// Tree holding auth tokens for a namespace
pub fn auth_tree_name(namespace: &str) -> String {
    format!("{}/auth", namespace)
}
