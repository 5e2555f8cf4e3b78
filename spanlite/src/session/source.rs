// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Where a connection gets its sessions from

use super::models::SessionHandle;
use super::pool::SessionPool;
use crate::error::Result;
use crate::store::StoreClient;
use std::sync::Arc;

/// Session supplier of a connection
///
/// Without a pool each lease creates a fresh remote session and deletes
/// it again on release.
pub enum SessionSource {
    Pooled(SessionPool),
    Ephemeral(Arc<dyn StoreClient>),
}

impl SessionSource {
    pub fn pool(&self) -> Option<&SessionPool> {
        match self {
            SessionSource::Pooled(pool) => Some(pool),
            SessionSource::Ephemeral(_) => None,
        }
    }

    pub fn acquire(&self) -> Result<SessionHandle> {
        match self {
            SessionSource::Pooled(pool) => pool.acquire(),
            SessionSource::Ephemeral(store) => Ok(SessionHandle::new(store.create_session()?, 0)),
        }
    }

    /// Give a lease back, or drop it if the last call on it lost the session
    ///
    /// Bookkeeping failures are logged; they never replace the outcome of
    /// the work done on the session.
    pub fn finish<T>(&self, handle: &SessionHandle, outcome: &Result<T>) {
        let session_lost = matches!(outcome, Err(e) if e.is_session_not_found());
        let result = match self {
            SessionSource::Pooled(pool) if session_lost => pool.invalidate(handle),
            SessionSource::Pooled(pool) => pool.release(handle),
            SessionSource::Ephemeral(_) if session_lost => Ok(()),
            SessionSource::Ephemeral(store) => store.delete_session(&handle.name).map_err(Into::into),
        };
        if let Err(e) = result {
            log::warn!("Failed to return session '{}': {}", handle.name, e);
        }
    }

    /// Run `f` on a leased session and return the lease afterwards
    pub fn with_session<T>(&self, f: impl FnOnce(&SessionHandle) -> Result<T>) -> Result<T> {
        let handle = self.acquire()?;
        let outcome = f(&handle);
        self.finish(&handle, &outcome);
        outcome
    }
}
