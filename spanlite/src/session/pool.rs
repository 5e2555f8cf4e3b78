// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session pool
//!
//! Leases remote sessions to one transaction or read at a time. Every
//! session the pool knows about is persisted as a [`SessionInfo`] in the
//! `<namespace>/sessions` cache tree, so a later process sharing the cache
//! can adopt them instead of creating new ones.
//!
//! A lease is claimed in the cache entry itself with a compare-and-swap,
//! so pools sharing a cache never hand out the same session twice and
//! never prune or delete a session another pool holds. The local lease
//! bookkeeping lives behind a mutex that is never held across a store RPC.

use super::models::{SessionHandle, SessionInfo};
use crate::cache::CacheTree;
use crate::config::SessionPoolConfig;
use crate::error::{Error, Result};
use crate::store::StoreClient;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
struct PoolState {
    available: VecDeque<String>,
    leased: HashSet<String>,
    generation: u64,
}

impl PoolState {
    fn size(&self) -> usize {
        self.available.len() + self.leased.len()
    }
}

/// Counters reported by diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub available: usize,
    pub leased: usize,
    pub generation: u64,
}

/// Pool of leased remote sessions
pub struct SessionPool {
    store: Arc<dyn StoreClient>,
    tree: Box<dyn CacheTree>,
    config: SessionPoolConfig,
    owner: String,
    state: Mutex<PoolState>,
}

impl SessionPool {
    /// Create a pool, adopting persisted sessions no other pool holds
    ///
    /// Adopted sessions are not validated here; the next [`maintain`]
    /// drops the ones the store no longer knows.
    ///
    /// [`maintain`]: SessionPool::maintain
    pub fn new(
        store: Arc<dyn StoreClient>,
        tree: Box<dyn CacheTree>,
        config: SessionPoolConfig,
    ) -> Result<Self> {
        let pool = Self {
            store,
            tree,
            config,
            owner: Uuid::new_v4().to_string(),
            state: Mutex::new(PoolState::default()),
        };

        let max_idle = pool.max_idle()?;
        let now = Utc::now();
        let adopted: Vec<String> = pool
            .list()?
            .into_iter()
            .filter(|info| info.is_claimable(max_idle, now))
            .map(|info| info.name)
            .collect();
        if !adopted.is_empty() {
            log::debug!("Adopted {} cached sessions", adopted.len());
        }
        pool.state.lock().available.extend(adopted);
        Ok(pool)
    }

    pub fn config(&self) -> &SessionPoolConfig {
        &self.config
    }

    /// Identifier this pool writes into the cache entries it leases
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            available: state.available.len(),
            leased: state.leased.len(),
            generation: state.generation,
        }
    }

    /// Lease a session, creating one when none is available
    ///
    /// Available sessions that another pool claimed in the meantime are
    /// forgotten.
    pub fn acquire(&self) -> Result<SessionHandle> {
        loop {
            let name = {
                let mut state = self.state.lock();
                match state.available.pop_front() {
                    Some(name) => name,
                    None if state.leased.len() >= self.config.max_sessions => {
                        return Err(Error::PoolExhausted {
                            max: self.config.max_sessions,
                        });
                    }
                    None => break,
                }
            };

            if self.claim(&name)? {
                let mut state = self.state.lock();
                state.leased.insert(name.clone());
                return Ok(SessionHandle::new(name, state.generation));
            }
            log::debug!("Session '{}' was taken by another pool", name);
        }

        let name = self.create_session(true)?;
        let mut state = self.state.lock();
        state.leased.insert(name.clone());
        Ok(SessionHandle::new(name, state.generation))
    }

    /// Return a lease to the pool
    ///
    /// Leases from before the last [`clear`](SessionPool::clear) are ignored.
    pub fn release(&self, handle: &SessionHandle) -> Result<()> {
        {
            let mut state = self.state.lock();
            if handle.generation != state.generation || !state.leased.remove(&handle.name) {
                log::debug!("Ignoring release of stale session lease '{}'", handle.name);
                return Ok(());
            }
        }

        if self.unclaim(&handle.name, true)? {
            self.state.lock().available.push_back(handle.name.clone());
        }
        Ok(())
    }

    /// Drop a lease whose session is known to be gone
    pub fn invalidate(&self, handle: &SessionHandle) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.leased.remove(&handle.name);
            state.available.retain(|name| name != &handle.name);
        }
        log::debug!("Invalidated session '{}'", handle.name);
        self.tree.remove(handle.name.as_bytes())?;
        Ok(())
    }

    /// Create sessions until `min_sessions` exist; returns how many were created
    pub fn warmup(&self) -> Result<usize> {
        let missing = {
            let state = self.state.lock();
            let target = self.config.min_sessions.min(self.config.max_sessions);
            target.saturating_sub(state.size())
        };

        for _ in 0..missing {
            let name = self.create_session(false)?;
            self.state.lock().available.push_back(name);
        }
        if missing > 0 {
            log::info!("Warmed up session pool with {} sessions", missing);
        }
        Ok(missing)
    }

    /// Prune idle or dead sessions, then top the pool back up
    ///
    /// Each available session is claimed while it is checked, so a session
    /// leased by another pool is never pruned. Returns whether the pool
    /// contents changed.
    pub fn maintain(&self) -> Result<bool> {
        let candidates: Vec<String> = self.state.lock().available.drain(..).collect();
        let max_idle = self.max_idle()?;
        let live: HashSet<String> = self.store.list_sessions()?.into_iter().collect();
        let now = Utc::now();
        let mut pruned = 0;

        for name in candidates {
            if !self.claim(&name)? {
                log::debug!("Forgetting session '{}' held by another pool", name);
                pruned += 1;
                continue;
            }
            let idle = match self.read_info(&name)? {
                Some(info) => info.is_idle_longer_than(max_idle, now),
                None => true,
            };
            let exists = live.contains(&name);
            if !idle && exists {
                if self.unclaim(&name, false)? {
                    self.state.lock().available.push_back(name);
                }
                continue;
            }
            if exists {
                if let Err(status) = self.store.delete_session(&name) {
                    log::debug!("Failed to delete idle session '{}': {}", name, status);
                }
            }
            self.tree.remove(name.as_bytes())?;
            pruned += 1;
        }

        let created = self.warmup()?;
        if pruned > 0 {
            log::info!(
                "Session pool maintenance pruned {} sessions, created {}",
                pruned,
                created
            );
        }
        Ok(pruned > 0 || created > 0)
    }

    /// Delete every session this pool holds or could lease, and forget
    /// outstanding leases
    ///
    /// Sessions currently leased by another pool sharing the cache are left
    /// alone.
    pub fn clear(&self) -> Result<()> {
        let mut names: HashSet<String> = {
            let mut state = self.state.lock();
            state.generation += 1;
            let mut names: HashSet<String> = state.available.drain(..).collect();
            names.extend(state.leased.drain());
            names
        };
        names.extend(self.list()?.into_iter().map(|info| info.name));

        let mut deleted = 0;
        for name in &names {
            let ours = match self.read_info(name)? {
                Some(info) => info.is_leased_by(&self.owner) || self.claim(name)?,
                None => true,
            };
            if !ours {
                log::debug!("Keeping session '{}' leased by another pool", name);
                continue;
            }
            if let Err(status) = self.store.delete_session(name) {
                log::debug!("Ignoring failed delete of session '{}': {}", name, status);
            }
            self.tree.remove(name.as_bytes())?;
            deleted += 1;
        }
        self.tree.flush()?;
        log::info!("Cleared session pool ({} sessions)", deleted);
        Ok(())
    }

    /// Persisted metadata of every known session
    pub fn list(&self) -> Result<Vec<SessionInfo>> {
        let mut sessions = Vec::new();
        for entry in self.tree.iter()? {
            let (key, value) = entry?;
            match bincode::deserialize::<SessionInfo>(&value) {
                Ok(info) => sessions.push(info),
                Err(e) => {
                    log::warn!(
                        "Dropping unreadable session cache entry '{}': {}",
                        String::from_utf8_lossy(&key),
                        e
                    );
                    self.tree.remove(&key)?;
                }
            }
        }
        Ok(sessions)
    }

    fn max_idle(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.config.max_idle)
            .map_err(|e| Error::Config(format!("Invalid max_idle: {}", e)))
    }

    /// Mark the cached entry as leased by this pool
    ///
    /// Fails when the entry is gone or another pool holds a live lease.
    fn claim(&self, name: &str) -> Result<bool> {
        let max_idle = self.max_idle()?;
        let Some(current) = self.tree.get(name.as_bytes())? else {
            return Ok(false);
        };
        let Ok(mut info) = bincode::deserialize::<SessionInfo>(&current) else {
            return Ok(false);
        };
        if !info.is_claimable(max_idle, Utc::now()) {
            return Ok(false);
        }
        info.lease_to(&self.owner);
        let claimed = bincode::serialize(&info)?;
        let swapped = self.tree.compare_and_swap(
            name.as_bytes(),
            Some(current.as_slice()),
            Some(claimed.as_slice()),
        )?;
        Ok(swapped)
    }

    /// Clear this pool's lease on the cached entry
    ///
    /// Returns false when another pool took the session over, in which
    /// case the entry is left untouched.
    fn unclaim(&self, name: &str, touch: bool) -> Result<bool> {
        let current = self.tree.get(name.as_bytes())?;
        let mut info = match current
            .as_deref()
            .and_then(|bytes| bincode::deserialize::<SessionInfo>(bytes).ok())
        {
            Some(info) if info.leased_by.is_some() && !info.is_leased_by(&self.owner) => {
                log::debug!("Session '{}' was taken over by another pool", name);
                return Ok(false);
            }
            Some(info) => info,
            None => SessionInfo::new(name),
        };
        info.unlease();
        if touch {
            info.touch();
        }
        let released = bincode::serialize(&info)?;
        let swapped = self.tree.compare_and_swap(
            name.as_bytes(),
            current.as_deref(),
            Some(released.as_slice()),
        )?;
        Ok(swapped)
    }

    fn create_session(&self, leased: bool) -> Result<String> {
        let name = self.store.create_session()?;
        let mut info = SessionInfo::new(name.clone());
        if leased {
            info.lease_to(&self.owner);
        }
        self.write_info(&info)?;
        Ok(name)
    }

    fn read_info(&self, name: &str) -> Result<Option<SessionInfo>> {
        match self.tree.get(name.as_bytes())? {
            Some(bytes) => Ok(bincode::deserialize(&bytes).ok()),
            None => Ok(None),
        }
    }

    fn write_info(&self, info: &SessionInfo) -> Result<()> {
        self.tree
            .insert(info.name.as_bytes(), &bincode::serialize(info)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDriver, MemoryCacheDriver};
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn pool_with(
        driver: &MemoryCacheDriver,
        store: &Arc<MemoryStore>,
        config: SessionPoolConfig,
    ) -> SessionPool {
        SessionPool::new(
            store.clone(),
            driver.open_tree("spanlite/sessions").unwrap(),
            config,
        )
        .unwrap()
    }

    fn setup(config: SessionPoolConfig) -> (Arc<MemoryStore>, SessionPool) {
        let store = Arc::new(MemoryStore::new("db"));
        let driver = MemoryCacheDriver::new();
        let pool = pool_with(&driver, &store, config);
        (store, pool)
    }

    #[test]
    fn test_warmup_creates_min_sessions_once() {
        let (store, pool) = setup(SessionPoolConfig::default().with_min_sessions(3));
        assert_eq!(pool.warmup().unwrap(), 3);
        assert_eq!(pool.warmup().unwrap(), 0);
        assert_eq!(store.session_count(), 3);
        assert_eq!(pool.list().unwrap().len(), 3);
    }

    #[test]
    fn test_acquire_reuses_released_sessions() {
        let (store, pool) = setup(SessionPoolConfig::default());
        let first = pool.acquire().unwrap();
        pool.release(&first).unwrap();
        let second = pool.acquire().unwrap();

        assert_eq!(first.name, second.name);
        assert_eq!(store.call_count("create_session"), 1);
    }

    #[test]
    fn test_pool_exhausted() {
        let (_store, pool) = setup(SessionPoolConfig::default().with_max_sessions(1));
        let _lease = pool.acquire().unwrap();
        assert!(matches!(
            pool.acquire(),
            Err(Error::PoolExhausted { max: 1 })
        ));
    }

    #[test]
    fn test_clear_invalidates_outstanding_leases() {
        let (store, pool) = setup(SessionPoolConfig::default().with_min_sessions(2));
        pool.warmup().unwrap();
        let lease = pool.acquire().unwrap();

        pool.clear().unwrap();
        assert!(pool.list().unwrap().is_empty());
        assert_eq!(store.session_count(), 0);

        pool.release(&lease).unwrap();
        assert_eq!(pool.stats().available, 0);
        assert_eq!(pool.warmup().unwrap(), 2);
    }

    #[test]
    fn test_maintain_prunes_dead_sessions() {
        let (store, pool) = setup(SessionPoolConfig::default().with_min_sessions(2));
        pool.warmup().unwrap();
        store.expire_all_sessions();

        assert!(pool.maintain().unwrap());
        assert_eq!(pool.stats().available, 2);
        assert_eq!(store.session_count(), 2);
        assert!(!pool.maintain().unwrap());
    }

    #[test]
    fn test_maintain_prunes_idle_sessions() {
        let (store, pool) = setup(
            SessionPoolConfig::default()
                .with_min_sessions(0)
                .with_max_idle(Duration::from_secs(0)),
        );
        let lease = pool.acquire().unwrap();
        pool.release(&lease).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert!(pool.maintain().unwrap());
        assert_eq!(store.session_count(), 0);
        assert!(pool.list().unwrap().is_empty());
    }

    #[test]
    fn test_new_pool_adopts_cached_sessions() {
        let store = Arc::new(MemoryStore::new("db"));
        let driver = MemoryCacheDriver::new();
        let first = pool_with(&driver, &store, SessionPoolConfig::default().with_min_sessions(2));
        first.warmup().unwrap();
        drop(first);

        let second = pool_with(&driver, &store, SessionPoolConfig::default().with_min_sessions(2));
        assert_eq!(second.stats().available, 2);
        assert_eq!(second.warmup().unwrap(), 0);
        assert_eq!(store.call_count("create_session"), 2);
    }

    #[test]
    fn test_invalidate_forgets_session() {
        let (_store, pool) = setup(SessionPoolConfig::default());
        let lease = pool.acquire().unwrap();
        pool.invalidate(&lease).unwrap();
        assert!(pool.list().unwrap().is_empty());
        assert_eq!(pool.stats(), PoolStats { available: 0, leased: 0, generation: 0 });
    }

    #[test]
    fn test_pools_sharing_a_cache_never_lease_the_same_session() {
        let store = Arc::new(MemoryStore::new("db"));
        let driver = MemoryCacheDriver::new();
        let first = pool_with(&driver, &store, SessionPoolConfig::default());
        first.warmup().unwrap();
        let second = pool_with(&driver, &store, SessionPoolConfig::default());
        assert_eq!(second.stats().available, 1);

        let a = first.acquire().unwrap();
        let b = second.acquire().unwrap();
        assert_ne!(a.name, b.name);
        assert_eq!(store.call_count("create_session"), 2);

        let leased: Vec<SessionInfo> = first.list().unwrap();
        assert!(leased
            .iter()
            .any(|info| info.name == a.name && info.is_leased_by(first.owner())));
        assert!(leased
            .iter()
            .any(|info| info.name == b.name && info.is_leased_by(second.owner())));
    }

    #[test]
    fn test_maintain_and_clear_skip_sessions_leased_elsewhere() {
        let store = Arc::new(MemoryStore::new("db"));
        let driver = MemoryCacheDriver::new();
        let first = pool_with(&driver, &store, SessionPoolConfig::default());
        first.warmup().unwrap();
        let second = pool_with(
            &driver,
            &store,
            SessionPoolConfig::default().with_min_sessions(0),
        );
        let lease = first.acquire().unwrap();

        assert!(second.maintain().unwrap());
        assert_eq!(second.stats().available, 0);
        second.clear().unwrap();

        assert_eq!(store.list_sessions().unwrap(), vec![lease.name.clone()]);
        assert_eq!(store.call_count("delete_session"), 0);
        first.release(&lease).unwrap();
        assert_eq!(first.stats().available, 1);
        assert!(first.list().unwrap()[0].leased_by.is_none());
    }

    #[test]
    fn test_abandoned_lease_can_be_taken_over() {
        let store = Arc::new(MemoryStore::new("db"));
        let driver = MemoryCacheDriver::new();
        let config = SessionPoolConfig::default().with_max_idle(Duration::from_secs(0));
        let first = pool_with(&driver, &store, config.clone());
        let stale = first.acquire().unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let second = pool_with(&driver, &store, config);
        let taken = second.acquire().unwrap();
        assert_eq!(taken.name, stale.name);

        first.release(&stale).unwrap();
        assert_eq!(first.stats().available, 0);
        assert!(first.list().unwrap()[0].is_leased_by(second.owner()));
    }
}
