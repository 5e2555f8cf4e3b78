// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Connection
//!
//! The public entry point. A connection composes the transaction
//! coordinator, the session source, the snapshot reader, the mutation
//! batcher and the partitioned DML executor, and wraps every outermost
//! operation in the session-not-found recovery policy.
//!
//! Statements issued while a transaction or snapshot is open are routed to
//! it; everything else runs as its own single-use operation.

use crate::cache::{
    auth_tree_name, create_cache_driver, sessions_tree_name, AuthTokenCache, BoxedCacheDriver,
    CacheType,
};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, LogEventSink};
use crate::mutation::{
    KeySet, MutationBatcher, MutationKind, MutationPayload, MutationSet, RowSet,
};
use crate::partitioned::PartitionedDmlExecutor;
use crate::read::{SnapshotContext, SnapshotReader, TimestampBound};
use crate::session::{
    PoolStats, RecoveryMode, RecoveryTarget, SessionInfo, SessionPool, SessionRecoveryPolicy,
    SessionSource,
};
use crate::store::StoreClient;
use crate::txn::{ExecutionScope, TransactionContext, TransactionCoordinator};
use crate::value::{Params, Row};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Point-in-time view of a connection, for logging and debugging
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub database: String,
    pub connected: bool,
    pub closed: bool,
    pub transaction_level: u32,
    pub in_snapshot: bool,
    /// Last session the store saw a call on
    pub current_session: Option<String>,
    pub pool: Option<PoolStats>,
    pub recovery_mode: RecoveryMode,
    pub cache_type: CacheType,
    pub request_tag: Option<String>,
    pub transaction_tag: Option<String>,
}

/// Builder for [`Connection`]
pub struct ConnectionBuilder {
    store: Arc<dyn StoreClient>,
    config: ConnectionConfig,
    events: Option<Arc<dyn EventSink>>,
    cache: Option<Arc<BoxedCacheDriver>>,
}

impl ConnectionBuilder {
    /// Receive lifecycle events; defaults to [`LogEventSink`]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Share a cache driver instead of creating one from the config
    pub fn with_cache_driver(mut self, cache: Arc<BoxedCacheDriver>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Connection> {
        let ConnectionBuilder {
            store,
            config,
            events,
            cache,
        } = self;

        let cache = match cache {
            Some(cache) => cache,
            None => Arc::new(open_cache(&config)?),
        };
        let events = events.unwrap_or_else(|| Arc::new(LogEventSink));
        let auth = AuthTokenCache::new(cache.open_tree(&auth_tree_name(&config.cache.namespace))?);

        let attempts = config
            .max_transaction_attempts
            .unwrap_or_else(|| store.recommended_max_retries() + 1);
        let batcher = Arc::new(MutationBatcher::new(store.clone(), events.clone()));
        let coordinator =
            TransactionCoordinator::new(store.clone(), events.clone(), batcher.clone(), attempts);
        coordinator.set_request_tag(config.request_tag.clone());
        coordinator.set_transaction_tag(config.transaction_tag.clone());

        log::info!(
            "Opened connection to '{}' (pool: {}, cache: {}, recovery: {:?})",
            config.database,
            config.session_pool.is_some(),
            cache.cache_type(),
            config.session_not_found_mode
        );

        Ok(Connection {
            snapshots: SnapshotReader::new(store.clone(), events.clone()),
            partitioned: PartitionedDmlExecutor::new(store.clone(), events.clone()),
            recovery: SessionRecoveryPolicy::new(config.session_not_found_mode),
            sessions: Mutex::new(None),
            closed: AtomicBool::new(false),
            coordinator,
            batcher,
            auth,
            cache,
            store,
            config,
        })
    }
}

fn open_cache(config: &ConnectionConfig) -> Result<BoxedCacheDriver> {
    let cache_type = config.cache.cache_type;
    let path = match (&config.cache.path, cache_type) {
        (Some(path), _) => path.clone(),
        (None, CacheType::Memory) => std::path::PathBuf::new(),
        (None, _) => {
            return Err(Error::Config(format!(
                "Cache type '{}' requires a cache path",
                cache_type
            )))
        }
    };
    Ok(create_cache_driver(cache_type, path)?)
}

/// Connection to a remote session-based store
pub struct Connection {
    config: ConnectionConfig,
    store: Arc<dyn StoreClient>,
    cache: Arc<BoxedCacheDriver>,
    /// Rebuilt lazily after `disconnect`
    sessions: Mutex<Option<Arc<SessionSource>>>,
    coordinator: TransactionCoordinator,
    snapshots: SnapshotReader,
    batcher: Arc<MutationBatcher>,
    partitioned: PartitionedDmlExecutor,
    recovery: SessionRecoveryPolicy,
    auth: AuthTokenCache,
    closed: AtomicBool,
}

impl Connection {
    pub fn builder(store: Arc<dyn StoreClient>, config: ConnectionConfig) -> ConnectionBuilder {
        ConnectionBuilder {
            store,
            config,
            events: None,
            cache: None,
        }
    }

    pub fn new(store: Arc<dyn StoreClient>, config: ConnectionConfig) -> Result<Self> {
        Self::builder(store, config).build()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    // ---- transactions -------------------------------------------------

    /// Run `f` in a read/write transaction, replaying it when the store aborts
    ///
    /// Inside an open transaction this opens a nested level instead.
    pub fn run_in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnMut(&TransactionContext<'_>) -> Result<T>,
    {
        self.run_in_transaction_with_attempts(None, f)
    }

    /// Like [`run_in_transaction`](Self::run_in_transaction) with an explicit attempt budget
    pub fn run_in_transaction_with_attempts<T, F>(
        &self,
        attempts: Option<u32>,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut(&TransactionContext<'_>) -> Result<T>,
    {
        self.ensure_open()?;
        if self.snapshots.in_snapshot() {
            return Err(Error::Logic(
                "Nested transactions are not supported in a snapshot".to_string(),
            ));
        }
        if self.coordinator.in_transaction() {
            return self.coordinator.run_nested(f);
        }
        self.recover(|| {
            let sessions = self.sessions()?;
            self.coordinator
                .run_in_transaction(&sessions, attempts, &mut f)
        })
    }

    /// Run `hook` after the current transaction commits, or now if none is open
    pub fn after_commit(&self, hook: impl FnOnce() + Send + 'static) {
        self.coordinator.after_commit(hook);
    }

    pub fn in_transaction(&self) -> bool {
        self.coordinator.in_transaction()
    }

    pub fn transaction_level(&self) -> u32 {
        self.coordinator.transaction_level()
    }

    // ---- snapshots and reads ------------------------------------------

    /// Run `f` against a read-only snapshot taken at `bound`
    pub fn with_snapshot<T, F>(&self, bound: TimestampBound, mut f: F) -> Result<T>
    where
        F: FnMut(&SnapshotContext<'_>) -> Result<T>,
    {
        self.ensure_open()?;
        self.recover(|| {
            let sessions = self.sessions()?;
            self.snapshots.with_snapshot(
                &sessions,
                self.coordinator.in_transaction(),
                bound,
                &self.coordinator.request_options(),
                &mut f,
            )
        })
    }

    pub fn in_snapshot(&self) -> bool {
        self.snapshots.in_snapshot()
    }

    /// Run a query in the open transaction or snapshot, or as a strong read
    pub fn select(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        self.ensure_open()?;
        if let Some(tx) = self.coordinator.current_context() {
            return tx.select(sql, params);
        }
        if let Some((session, id)) = self.snapshots.current() {
            return self.snapshots.read(
                &session,
                &id,
                sql,
                params,
                &self.coordinator.request_options(),
            );
        }
        self.select_with_timestamp_bound(sql, params, TimestampBound::Strong)
    }

    pub fn select_one(&self, sql: &str, params: &Params) -> Result<Option<Row>> {
        Ok(self.select(sql, params)?.into_iter().next())
    }

    /// Single-use read at `bound`, independent of any open transaction
    pub fn select_with_timestamp_bound(
        &self,
        sql: &str,
        params: &Params,
        bound: TimestampBound,
    ) -> Result<Vec<Row>> {
        self.recover(|| {
            let sessions = self.sessions()?;
            self.snapshots.read_with_bound(
                &sessions,
                bound,
                sql,
                params,
                &self.coordinator.request_options(),
            )
        })
    }

    // ---- writes -------------------------------------------------------

    /// Run DML; outside a transaction it gets an implicit one
    pub fn execute_update(&self, sql: &str, params: &Params) -> Result<i64> {
        self.ensure_open()?;
        if let Some(tx) = self.coordinator.current_context() {
            return tx.execute_update(sql, params);
        }
        if self.snapshots.in_snapshot() {
            return Err(Error::Logic(
                "Cannot execute DML inside a read-only snapshot".to_string(),
            ));
        }
        self.run_in_transaction(|tx| tx.execute_update(sql, params))
    }

    /// Write rows to `table`, or delete the keys of a key set
    ///
    /// Inside a transaction the mutation is staged there; otherwise it is
    /// committed on its own.
    pub fn write_mutation(
        &self,
        table: &str,
        kind: MutationKind,
        payload: impl Into<MutationPayload>,
    ) -> Result<()> {
        self.ensure_open()?;
        let payload = payload.into();
        if let Some(tx) = self.coordinator.current_context() {
            return tx.write_mutation(table, kind, payload);
        }
        self.ensure_writable()?;
        match self.batcher.normalize(table, kind, payload)? {
            Some(mutation) => self.apply_single_use(mutation),
            None => Ok(()),
        }
    }

    pub fn insert(&self, table: &str, rows: impl Into<RowSet>) -> Result<()> {
        self.write_rows(table, MutationKind::Insert, rows)
    }

    pub fn update(&self, table: &str, rows: impl Into<RowSet>) -> Result<()> {
        self.write_rows(table, MutationKind::Update, rows)
    }

    pub fn insert_or_update(&self, table: &str, rows: impl Into<RowSet>) -> Result<()> {
        self.write_rows(table, MutationKind::InsertOrUpdate, rows)
    }

    pub fn replace(&self, table: &str, rows: impl Into<RowSet>) -> Result<()> {
        self.write_rows(table, MutationKind::Replace, rows)
    }

    /// Delete the rows selected by `keys`
    pub fn delete(&self, table: &str, keys: impl Into<KeySet>) -> Result<()> {
        let keys: KeySet = keys.into();
        self.write_mutation(table, MutationKind::Delete, keys)
    }

    fn write_rows(&self, table: &str, kind: MutationKind, rows: impl Into<RowSet>) -> Result<()> {
        let rows: RowSet = rows.into();
        self.write_mutation(table, kind, rows)
    }

    fn apply_single_use(&self, mutation: MutationSet) -> Result<()> {
        self.recover(|| {
            let sessions = self.sessions()?;
            sessions.with_session(|session| {
                self.batcher.apply_single_use(
                    &session.name,
                    mutation.clone(),
                    &self.coordinator.request_options(),
                )
            })
        })
    }

    /// Run bulk DML outside any transaction; returns the affected-row count
    pub fn run_partitioned(&self, sql: &str, params: &Params) -> Result<i64> {
        self.ensure_open()?;
        let scope = self.scope();
        self.recover(|| {
            let sessions = self.sessions()?;
            self.partitioned.run(
                &sessions,
                scope,
                sql,
                params,
                &self.coordinator.request_options(),
            )
        })
    }

    // ---- tags ---------------------------------------------------------

    pub fn set_request_tag(&self, tag: Option<String>) {
        self.coordinator.set_request_tag(tag);
    }

    pub fn set_transaction_tag(&self, tag: Option<String>) {
        self.coordinator.set_transaction_tag(tag);
    }

    pub fn request_tag(&self) -> Option<String> {
        self.coordinator.request_tag()
    }

    pub fn transaction_tag(&self) -> Option<String> {
        self.coordinator.transaction_tag()
    }

    // ---- session pool -------------------------------------------------

    /// Pre-create `min_sessions` sessions; returns how many were created
    pub fn warmup_pool(&self) -> Result<usize> {
        match self.sessions()?.pool() {
            Some(pool) => pool.warmup(),
            None => Ok(0),
        }
    }

    /// Prune idle and dead sessions; returns whether anything changed
    pub fn maintain_pool(&self) -> Result<bool> {
        match self.sessions()?.pool() {
            Some(pool) => pool.maintain(),
            None => Ok(false),
        }
    }

    /// Delete every pooled session
    pub fn clear_pool(&self) -> Result<()> {
        match self.sessions()?.pool() {
            Some(pool) => pool.clear(),
            None => Ok(()),
        }
    }

    /// Sessions known to the pool cache
    pub fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        match self.sessions()?.pool() {
            Some(pool) => pool.list(),
            None => Ok(Vec::new()),
        }
    }

    // ---- auth tokens --------------------------------------------------

    pub fn auth_tokens(&self) -> &AuthTokenCache {
        &self.auth
    }

    /// Cache `token` under `key` for the configured token lifetime
    pub fn store_auth_token(&self, key: &str, token: &[u8]) -> Result<()> {
        let ttl = chrono::Duration::from_std(self.config.auth_token_ttl)
            .map_err(|e| Error::Config(format!("Invalid auth_token_ttl: {}", e)))?;
        self.auth.put(key, token, ttl)
    }

    // ---- lifecycle ----------------------------------------------------

    /// Drop the session source; the next operation rebuilds it from the cache
    pub fn disconnect(&self) {
        if self.sessions.lock().take().is_some() {
            log::debug!("Disconnected from '{}'", self.config.database);
        }
    }

    pub fn reconnect(&self) -> Result<()> {
        self.sessions().map(|_| ())
    }

    /// Close the connection; every later operation fails
    ///
    /// Pooled sessions stay in the cache for the next connection to adopt.
    pub fn close(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.coordinator.in_transaction() || self.snapshots.in_snapshot() {
            return Err(Error::Logic(
                "Cannot close a connection while a transaction or snapshot is open".to_string(),
            ));
        }
        self.disconnect();
        self.closed.store(true, Ordering::SeqCst);
        self.cache.flush()?;
        log::info!("Closed connection to '{}'", self.config.database);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let sessions = self.sessions.lock().clone();
        Diagnostics {
            database: self.config.database.clone(),
            connected: sessions.is_some(),
            closed: self.is_closed(),
            transaction_level: self.coordinator.transaction_level(),
            in_snapshot: self.snapshots.in_snapshot(),
            current_session: self.store.current_session_name(),
            pool: sessions
                .as_ref()
                .and_then(|s| s.pool())
                .map(SessionPool::stats),
            recovery_mode: self.recovery.mode(),
            cache_type: self.cache.cache_type(),
            request_tag: self.coordinator.request_tag(),
            transaction_tag: self.coordinator.transaction_tag(),
        }
    }

    // ---- internals ----------------------------------------------------

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Logic("Connection is closed".to_string()));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.snapshots.in_snapshot() {
            return Err(Error::Logic(
                "Cannot write mutations inside a read-only snapshot".to_string(),
            ));
        }
        Ok(())
    }

    fn scope(&self) -> ExecutionScope {
        if self.coordinator.in_transaction() {
            ExecutionScope::Transaction
        } else if self.snapshots.in_snapshot() {
            ExecutionScope::Snapshot
        } else {
            ExecutionScope::Idle
        }
    }

    fn recover<T>(&self, f: impl FnMut() -> Result<T>) -> Result<T> {
        self.ensure_open()?;
        self.recovery.recover(self, f)
    }

    /// Current session source, connecting first if needed
    fn sessions(&self) -> Result<Arc<SessionSource>> {
        self.ensure_open()?;
        let mut sessions = self.sessions.lock();
        if let Some(source) = sessions.as_ref() {
            return Ok(source.clone());
        }
        let source = Arc::new(self.connect()?);
        *sessions = Some(source.clone());
        Ok(source)
    }

    fn connect(&self) -> Result<SessionSource> {
        match &self.config.session_pool {
            Some(pool_config) => {
                let tree = self
                    .cache
                    .open_tree(&sessions_tree_name(&self.config.cache.namespace))?;
                let pool = SessionPool::new(self.store.clone(), tree, pool_config.clone())?;
                log::debug!("Connected to '{}' with a session pool", self.config.database);
                Ok(SessionSource::Pooled(pool))
            }
            None => Ok(SessionSource::Ephemeral(self.store.clone())),
        }
    }
}

impl RecoveryTarget for Connection {
    fn has_session_pool(&self) -> bool {
        self.config.session_pool.is_some()
    }

    fn in_transaction(&self) -> bool {
        Connection::in_transaction(self)
    }

    fn in_snapshot(&self) -> bool {
        Connection::in_snapshot(self)
    }

    fn disconnect(&self) {
        Connection::disconnect(self)
    }

    fn reconnect(&self) -> Result<()> {
        Connection::reconnect(self)
    }

    fn maintain_pool(&self) -> Result<bool> {
        Connection::maintain_pool(self)
    }

    fn clear_pool(&self) -> Result<()> {
        Connection::clear_pool(self)
    }
}
