// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read-only snapshots and stale single-use reads

use super::timestamp_bound::TimestampBound;
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::query::execute_statement;
use crate::session::{SessionHandle, SessionSource};
use crate::store::{ReadContext, RequestOptions, SnapshotId, StoreClient};
use crate::value::{Params, Row};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct ActiveSnapshot {
    session: SessionHandle,
    id: SnapshotId,
}

/// Reads issued inside [`SnapshotReader::with_snapshot`]
///
/// Every read observes the same snapshot timestamp.
pub struct SnapshotContext<'a> {
    reader: &'a SnapshotReader,
    session: String,
    id: SnapshotId,
    options: RequestOptions,
}

impl SnapshotContext<'_> {
    pub fn select(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.reader
            .read(&self.session, &self.id, sql, params, &self.options)
    }

    pub fn select_one(&self, sql: &str, params: &Params) -> Result<Option<Row>> {
        Ok(self.select(sql, params)?.into_iter().next())
    }

    pub fn snapshot_id(&self) -> &SnapshotId {
        &self.id
    }
}

/// Owns the read-only snapshot lifecycle of a connection
pub struct SnapshotReader {
    store: Arc<dyn StoreClient>,
    events: Arc<dyn EventSink>,
    active: Mutex<Option<ActiveSnapshot>>,
}

impl SnapshotReader {
    pub fn new(store: Arc<dyn StoreClient>, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            events,
            active: Mutex::new(None),
        }
    }

    pub fn in_snapshot(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Session and id of the open snapshot
    pub fn current(&self) -> Option<(String, SnapshotId)> {
        self.active
            .lock()
            .as_ref()
            .map(|s| (s.session.name.clone(), s.id.clone()))
    }

    /// Open a snapshot, run `f` against it, and close it on every exit path
    pub fn with_snapshot<T, F>(
        &self,
        sessions: &SessionSource,
        in_transaction: bool,
        bound: TimestampBound,
        options: &RequestOptions,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&SnapshotContext<'_>) -> Result<T>,
    {
        if in_transaction {
            return Err(Error::Logic(
                "Cannot create a snapshot within a transaction".to_string(),
            ));
        }
        if self.in_snapshot() {
            return Err(Error::Logic("Nested snapshots are not supported".to_string()));
        }
        let read_options = bound.snapshot_options()?;

        sessions.with_session(|session| {
            let id = self.store.begin_snapshot(&session.name, &read_options)?;
            log::debug!("Opened snapshot {} ({:?})", id, bound);
            *self.active.lock() = Some(ActiveSnapshot {
                session: session.clone(),
                id: id.clone(),
            });

            let context = SnapshotContext {
                reader: self,
                session: session.name.clone(),
                id: id.clone(),
                options: options.clone(),
            };
            let outcome = f(&context);

            self.active.lock().take();
            if let Err(status) = self.store.end_snapshot(&session.name, &id) {
                log::warn!("Failed to close snapshot {}: {}", id, status);
            }
            outcome
        })
    }

    /// One-shot read at the given bound; every bound is allowed here
    pub fn read_with_bound(
        &self,
        sessions: &SessionSource,
        bound: TimestampBound,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> Result<Vec<Row>> {
        let context = ReadContext::SingleUse(bound.to_read_only_options());
        sessions.with_session(|session| {
            execute_statement(self.events.as_ref(), sql, params, || {
                self.store
                    .execute(&session.name, &context, sql, params, options)
            })
        })
    }

    /// Read inside the open snapshot
    pub fn read(
        &self,
        session: &str,
        id: &SnapshotId,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> Result<Vec<Row>> {
        let context = ReadContext::Snapshot(id.clone());
        execute_statement(self.events.as_ref(), sql, params, || {
            self.store.execute(session, &context, sql, params, options)
        })
    }
}
