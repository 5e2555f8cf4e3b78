// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory cache driver

use super::traits::{CacheDriver, CacheIter, CacheTree};
use super::types::{CacheResult, CacheType};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

type Entries = Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>;

/// Process-local cache driver
///
/// Trees opened twice under the same name share their entries.
#[derive(Default)]
pub struct MemoryCacheDriver {
    trees: Arc<RwLock<HashMap<String, Entries>>>,
}

/// In-memory tree handle
pub struct MemoryCacheTree {
    data: Entries,
}

impl MemoryCacheDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheTree for MemoryCacheTree {
    fn insert(&self, key: &[u8], value: &[u8]) -> CacheResult<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn remove(&self, key: &[u8]) -> CacheResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn contains_key(&self, key: &[u8]) -> CacheResult<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn compare_and_swap(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> CacheResult<bool> {
        let mut data = self.data.write();
        if data.get(key).map(Vec::as_slice) != expected {
            return Ok(false);
        }
        match new {
            Some(value) => data.insert(key.to_vec(), value.to_vec()),
            None => data.remove(key),
        };
        Ok(true)
    }

    fn clear(&self) -> CacheResult<()> {
        self.data.write().clear();
        Ok(())
    }

    fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.data.read().is_empty())
    }

    fn iter(&self) -> CacheResult<CacheIter<'_>> {
        let items: Vec<_> = self
            .data
            .read()
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.clone())))
            .collect();
        Ok(Box::new(items.into_iter()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> CacheResult<CacheIter<'_>> {
        let items: Vec<_> = self
            .data
            .read()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| Ok((k.clone(), v.clone())))
            .collect();
        Ok(Box::new(items.into_iter()))
    }

    fn flush(&self) -> CacheResult<()> {
        Ok(())
    }
}

impl CacheDriver for MemoryCacheDriver {
    type Tree = Box<dyn CacheTree>;

    fn open<P: AsRef<Path>>(_path: P) -> CacheResult<Self> {
        Ok(Self::new())
    }

    fn open_tree(&self, name: &str) -> CacheResult<Self::Tree> {
        let data = self
            .trees
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(BTreeMap::new())))
            .clone();
        Ok(Box::new(MemoryCacheTree { data }) as Box<dyn CacheTree>)
    }

    fn list_trees(&self) -> CacheResult<Vec<String>> {
        let mut names: Vec<String> = self.trees.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn drop_tree(&self, name: &str) -> CacheResult<()> {
        if let Some(data) = self.trees.write().remove(name) {
            // Handles opened earlier keep the Arc alive; empty it for them too.
            data.write().clear();
        }
        Ok(())
    }

    fn flush(&self) -> CacheResult<()> {
        Ok(())
    }

    fn cache_type(&self) -> CacheType {
        CacheType::Memory
    }
}
