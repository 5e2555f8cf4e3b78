// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sled cache driver implementation

use super::traits::{CacheDriver, CacheIter, CacheTree};
use super::types::{CacheError, CacheResult, CacheType};
use std::path::Path;

fn backend_err(e: sled::Error) -> CacheError {
    CacheError::BackendSpecific(e.to_string())
}

/// Sled driver implementation
pub struct SledCacheDriver {
    db: sled::Db,
}

/// Sled tree wrapper that implements the CacheTree trait
pub struct SledCacheTree {
    tree: sled::Tree,
}

impl CacheTree for SledCacheTree {
    fn insert(&self, key: &[u8], value: &[u8]) -> CacheResult<()> {
        self.tree.insert(key, value).map_err(backend_err)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        self.tree
            .get(key)
            .map_err(backend_err)
            .map(|opt| opt.map(|v| v.to_vec()))
    }

    fn remove(&self, key: &[u8]) -> CacheResult<()> {
        self.tree.remove(key).map_err(backend_err)?;
        Ok(())
    }

    fn contains_key(&self, key: &[u8]) -> CacheResult<bool> {
        self.tree.contains_key(key).map_err(backend_err)
    }

    fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> CacheResult<bool> {
        let swapped = self
            .tree
            .compare_and_swap(key, expected, new)
            .map_err(backend_err)?;
        Ok(swapped.is_ok())
    }

    fn clear(&self) -> CacheResult<()> {
        self.tree.clear().map_err(backend_err)
    }

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.tree.is_empty())
    }

    fn iter(&self) -> CacheResult<CacheIter<'_>> {
        let iter = self.tree.iter().map(|result| {
            result
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(backend_err)
        });
        Ok(Box::new(iter))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> CacheResult<CacheIter<'_>> {
        let iter = self.tree.scan_prefix(prefix).map(|result| {
            result
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .map_err(backend_err)
        });
        Ok(Box::new(iter))
    }

    fn flush(&self) -> CacheResult<()> {
        self.tree.flush().map_err(backend_err)?;
        Ok(())
    }
}

impl CacheDriver for SledCacheDriver {
    type Tree = Box<dyn CacheTree>;

    fn open<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        let db = sled::open(path).map_err(backend_err)?;
        Ok(SledCacheDriver { db })
    }

    fn open_tree(&self, name: &str) -> CacheResult<Self::Tree> {
        let tree = self.db.open_tree(name).map_err(backend_err)?;
        Ok(Box::new(SledCacheTree { tree }) as Box<dyn CacheTree>)
    }

    fn list_trees(&self) -> CacheResult<Vec<String>> {
        // sled always carries its own default tree; it is not one of ours.
        let default_name = self.db.name();
        let tree_names = self
            .db
            .tree_names()
            .into_iter()
            .filter(|name| *name != default_name)
            .map(|name| String::from_utf8_lossy(&name).to_string())
            .collect();
        Ok(tree_names)
    }

    fn drop_tree(&self, name: &str) -> CacheResult<()> {
        self.db.drop_tree(name.as_bytes()).map_err(backend_err)?;
        Ok(())
    }

    fn flush(&self) -> CacheResult<()> {
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }

    fn cache_type(&self) -> CacheType {
        CacheType::Sled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let driver = SledCacheDriver::open(temp_dir.path()).unwrap();
            let tree = driver.open_tree("spanlite/sessions").unwrap();
            tree.insert(b"s1", b"meta").unwrap();
            driver.flush().unwrap();
        }

        let driver = SledCacheDriver::open(temp_dir.path()).unwrap();
        let tree = driver.open_tree("spanlite/sessions").unwrap();
        assert_eq!(tree.get(b"s1").unwrap(), Some(b"meta".to_vec()));
        assert_eq!(driver.list_trees().unwrap(), vec!["spanlite/sessions"]);
    }

    #[test]
    fn test_compare_and_swap() {
        let temp_dir = TempDir::new().unwrap();
        let driver = SledCacheDriver::open(temp_dir.path()).unwrap();
        let tree = driver.open_tree("spanlite/sessions").unwrap();

        assert!(tree.compare_and_swap(b"s1", None, Some(&b"free"[..])).unwrap());
        let (free, claimed) = (&b"free"[..], &b"claimed"[..]);
        assert!(tree.compare_and_swap(b"s1", Some(free), Some(claimed)).unwrap());
        assert!(!tree.compare_and_swap(b"s1", Some(free), Some(claimed)).unwrap());
        assert_eq!(tree.get(b"s1").unwrap(), Some(b"claimed".to_vec()));
    }

    #[test]
    fn test_drop_tree() {
        let temp_dir = TempDir::new().unwrap();
        let driver = SledCacheDriver::open(temp_dir.path()).unwrap();
        driver.open_tree("a").unwrap().insert(b"k", b"v").unwrap();

        driver.drop_tree("a").unwrap();
        assert!(driver.open_tree("a").unwrap().is_empty().unwrap());
    }
}
