// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache driver factory
//!
//! Creates a cache driver from configuration.

use super::traits::{CacheDriver, CacheTree};
use super::types::{CacheResult, CacheType};
use std::path::Path;

/// Boxed driver handed out by [`create_cache_driver`]
pub type BoxedCacheDriver = Box<dyn CacheDriver<Tree = Box<dyn CacheTree>>>;

/// Create a cache driver for the given backend type
///
/// # Arguments
/// * `cache_type` - The backend to create
/// * `path` - Directory for on-disk backends; ignored by the memory backend
///
/// # Examples
/// ```ignore
/// let driver = create_cache_driver(CacheType::Sled, "./cache")?;
/// let tree = driver.open_tree("spanlite/sessions")?;
/// ```
pub fn create_cache_driver<P: AsRef<Path>>(
    cache_type: CacheType,
    path: P,
) -> CacheResult<BoxedCacheDriver> {
    match cache_type {
        #[cfg(feature = "sled-backend")]
        CacheType::Sled => {
            use super::sled::SledCacheDriver;
            let driver = SledCacheDriver::open(path)?;
            Ok(Box::new(driver) as BoxedCacheDriver)
        }
        #[cfg(not(feature = "sled-backend"))]
        CacheType::Sled => {
            let _ = path;
            Err(super::types::CacheError::Unavailable(
                "spanlite was built without the sled-backend feature".to_string(),
            ))
        }
        CacheType::Memory => {
            use super::memory::MemoryCacheDriver;
            let driver = MemoryCacheDriver::open(path)?;
            Ok(Box::new(driver) as BoxedCacheDriver)
        }
    }
}
