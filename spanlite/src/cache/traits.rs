// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache driver traits
//!
//! All cache drivers implement these traits so the session pool and the
//! auth token cache never depend on a concrete backend.

use super::types::{CacheResult, CacheType};
use std::path::Path;

/// Iterator over raw key/blob entries
pub type CacheIter<'a> = Box<dyn Iterator<Item = CacheResult<(Vec<u8>, Vec<u8>)>> + 'a>;

/// A named collection of opaque key/blob entries
///
/// Entries are never interpreted by the driver. Processes sharing a
/// backend must rely on the driver's own concurrency guarantees.
pub trait CacheTree: Send + Sync {
    /// Insert or overwrite an entry
    fn insert(&self, key: &[u8], value: &[u8]) -> CacheResult<()>;

    /// Get an entry by key
    fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>>;

    /// Remove an entry
    fn remove(&self, key: &[u8]) -> CacheResult<()>;

    /// Check if a key exists
    fn contains_key(&self, key: &[u8]) -> CacheResult<bool>;

    /// Atomically replace `key` when its current value equals `expected`
    ///
    /// `None` on either side means absent. Returns false and leaves the
    /// entry untouched when the current value differs.
    fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> CacheResult<bool>;

    /// Remove every entry in the tree
    fn clear(&self) -> CacheResult<()>;

    /// Check if the tree is empty
    fn is_empty(&self) -> CacheResult<bool>;

    /// Iterate over all entries
    fn iter(&self) -> CacheResult<CacheIter<'_>>;

    /// Iterate over entries whose key starts with `prefix`
    fn scan_prefix(&self, prefix: &[u8]) -> CacheResult<CacheIter<'_>>;

    /// Flush pending writes to the backend
    fn flush(&self) -> CacheResult<()>;
}

/// Main cache driver trait
pub trait CacheDriver: Send + Sync {
    /// Tree type handed out by this driver
    type Tree: CacheTree;

    /// Open or create a driver rooted at the given path
    fn open<P: AsRef<Path>>(path: P) -> CacheResult<Self>
    where
        Self: Sized;

    /// Open or create a named tree
    fn open_tree(&self, name: &str) -> CacheResult<Self::Tree>;

    /// List all trees
    fn list_trees(&self) -> CacheResult<Vec<String>>;

    /// Drop a tree and all of its entries
    fn drop_tree(&self, name: &str) -> CacheResult<()>;

    /// Flush all pending writes
    fn flush(&self) -> CacheResult<()>;

    /// Backend type of this driver
    fn cache_type(&self) -> CacheType;

    /// Release resources before drop
    fn shutdown(&mut self) -> CacheResult<()> {
        self.flush()
    }
}

impl CacheTree for Box<dyn CacheTree> {
    fn insert(&self, key: &[u8], value: &[u8]) -> CacheResult<()> {
        (**self).insert(key, value)
    }

    fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn remove(&self, key: &[u8]) -> CacheResult<()> {
        (**self).remove(key)
    }

    fn contains_key(&self, key: &[u8]) -> CacheResult<bool> {
        (**self).contains_key(key)
    }

    fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> CacheResult<bool> {
        (**self).compare_and_swap(key, expected, new)
    }

    fn clear(&self) -> CacheResult<()> {
        (**self).clear()
    }

    fn is_empty(&self) -> CacheResult<bool> {
        (**self).is_empty()
    }

    fn iter(&self) -> CacheResult<CacheIter<'_>> {
        (**self).iter()
    }

    fn scan_prefix(&self, prefix: &[u8]) -> CacheResult<CacheIter<'_>> {
        (**self).scan_prefix(prefix)
    }

    fn flush(&self) -> CacheResult<()> {
        (**self).flush()
    }
}
