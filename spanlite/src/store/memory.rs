// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory store emulator
//!
//! `MemoryStore` implements [`StoreClient`] without a network: tables keyed
//! by a single primary-key column, leased sessions, read/write transactions
//! with optimistic commit validation, and frozen read-only snapshots.
//!
//! Writes made inside a transaction are visible to that transaction's own
//! reads. A commit aborts when any table the transaction touched was
//! modified by another commit after the transaction began.
//!
//! Only a small statement set is understood:
//!
//! ```text
//! SELECT * FROM t [WHERE c = @p | WHERE TRUE]
//! SELECT COUNT(*) AS n FROM t [WHERE c = @p | WHERE TRUE]
//! UPDATE t SET c = @p [WHERE c2 = @q | WHERE TRUE]
//! DELETE FROM t [WHERE c = @p | WHERE TRUE]
//! ```
//!
//! Stale single-use reads are served from the latest committed state.
//! Fault injection hooks let tests force aborts and lose sessions.

use super::client::{
    CommitResponse, ReadContext, ReadOnlyOptions, RequestOptions, RpcResult, SnapshotId,
    StoreClient, TransactionId,
};
use super::status::{RpcCode, RpcStatus};
use crate::mutation::{MutationKind, MutationPayload, MutationSet};
use crate::value::{Params, Row, Value};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

const WHERE_CLAUSE: &str = r"(?:\s+WHERE\s+(?:TRUE|(\w+)\s*=\s*@(\w+)))?";

struct StatementPatterns {
    select: Regex,
    count: Regex,
    update: Regex,
    delete: Regex,
}

static PATTERNS: Lazy<Result<StatementPatterns, regex::Error>> = Lazy::new(|| {
    Ok(StatementPatterns {
        select: Regex::new(&format!(r"(?i)^\s*SELECT\s+\*\s+FROM\s+(\w+){}\s*$", WHERE_CLAUSE))?,
        count: Regex::new(&format!(
            r"(?i)^\s*SELECT\s+COUNT\(\s*\*\s*\)\s+AS\s+(\w+)\s+FROM\s+(\w+){}\s*$",
            WHERE_CLAUSE
        ))?,
        update: Regex::new(&format!(
            r"(?i)^\s*UPDATE\s+(\w+)\s+SET\s+(\w+)\s*=\s*@(\w+){}\s*$",
            WHERE_CLAUSE
        ))?,
        delete: Regex::new(&format!(r"(?i)^\s*DELETE\s+FROM\s+(\w+){}\s*$", WHERE_CLAUSE))?,
    })
});

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    column: String,
    param: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Select {
        table: String,
        filter: Option<Filter>,
    },
    Count {
        alias: String,
        table: String,
        filter: Option<Filter>,
    },
    Update {
        table: String,
        column: String,
        param: String,
        filter: Option<Filter>,
    },
    Delete {
        table: String,
        filter: Option<Filter>,
    },
}

impl Statement {
    fn parse(sql: &str) -> RpcResult<Statement> {
        let patterns = PATTERNS
            .as_ref()
            .map_err(|e| RpcStatus::new(RpcCode::Internal, e.to_string()))?;

        let group = |caps: &regex::Captures<'_>, i: usize| {
            caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default()
        };
        let filter = |caps: &regex::Captures<'_>, column: usize| {
            caps.get(column).zip(caps.get(column + 1)).map(|(c, p)| Filter {
                column: c.as_str().to_string(),
                param: p.as_str().to_string(),
            })
        };

        if let Some(caps) = patterns.count.captures(sql) {
            return Ok(Statement::Count {
                alias: group(&caps, 1),
                table: group(&caps, 2),
                filter: filter(&caps, 3),
            });
        }
        if let Some(caps) = patterns.select.captures(sql) {
            return Ok(Statement::Select {
                table: group(&caps, 1),
                filter: filter(&caps, 2),
            });
        }
        if let Some(caps) = patterns.update.captures(sql) {
            return Ok(Statement::Update {
                table: group(&caps, 1),
                column: group(&caps, 2),
                param: group(&caps, 3),
                filter: filter(&caps, 4),
            });
        }
        if let Some(caps) = patterns.delete.captures(sql) {
            return Ok(Statement::Delete {
                table: group(&caps, 1),
                filter: filter(&caps, 2),
            });
        }
        Err(RpcStatus::new(
            RpcCode::InvalidArgument,
            format!("Unsupported statement: {}", sql),
        ))
    }

    fn is_query(&self) -> bool {
        matches!(self, Statement::Select { .. } | Statement::Count { .. })
    }

    fn table(&self) -> &str {
        match self {
            Statement::Select { table, .. }
            | Statement::Count { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => table,
        }
    }
}

#[derive(Debug, Clone)]
struct Table {
    key_column: String,
    rows: BTreeMap<String, Row>,
    version: u64,
}

impl Table {
    fn matching_keys(&self, filter: &Option<Filter>, params: &Params) -> RpcResult<Vec<String>> {
        let Some(filter) = filter else {
            return Ok(self.rows.keys().cloned().collect());
        };
        let expected = bind(params, &filter.param)?.key_string();
        Ok(self
            .rows
            .iter()
            .filter(|(_, row)| {
                row.get(&filter.column)
                    .is_some_and(|v| v.key_string() == expected)
            })
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn query(&self, statement: &Statement, params: &Params) -> RpcResult<Vec<Row>> {
        match statement {
            Statement::Select { filter, .. } => Ok(self
                .matching_keys(filter, params)?
                .iter()
                .filter_map(|k| self.rows.get(k).cloned())
                .collect()),
            Statement::Count { alias, filter, .. } => {
                let n = self.matching_keys(filter, params)?.len() as i64;
                Ok(vec![Row::new().with(alias.clone(), n)])
            }
            _ => Err(RpcStatus::new(
                RpcCode::InvalidArgument,
                "DML statements must be run with execute_update",
            )),
        }
    }

    fn update(&mut self, statement: &Statement, params: &Params) -> RpcResult<i64> {
        match statement {
            Statement::Update {
                column,
                param,
                filter,
                ..
            } => {
                if *column == self.key_column {
                    return Err(RpcStatus::new(
                        RpcCode::InvalidArgument,
                        format!("Cannot update primary key column '{}'", column),
                    ));
                }
                let value = bind(params, param)?.clone().to_store_native();
                let keys = self.matching_keys(filter, params)?;
                for key in &keys {
                    if let Some(row) = self.rows.get_mut(key) {
                        row.insert(column.clone(), value.clone());
                    }
                }
                Ok(keys.len() as i64)
            }
            Statement::Delete { filter, .. } => {
                let keys = self.matching_keys(filter, params)?;
                for key in &keys {
                    self.rows.remove(key);
                }
                Ok(keys.len() as i64)
            }
            _ => Err(RpcStatus::new(
                RpcCode::InvalidArgument,
                "Queries must be run with execute",
            )),
        }
    }

    fn apply(&mut self, table_name: &str, mutation: &MutationSet) -> RpcResult<()> {
        let rows = match &mutation.payload {
            MutationPayload::Keys(keys) => {
                let key_column = &self.key_column;
                self.rows
                    .retain(|_, row| !row.get(key_column).is_some_and(|k| keys.matches(k)));
                return Ok(());
            }
            MutationPayload::Rows(rows) => rows,
        };

        for row in rows {
            let key = row.get(&self.key_column).ok_or_else(|| {
                RpcStatus::new(
                    RpcCode::InvalidArgument,
                    format!(
                        "Missing primary key column '{}' for table '{}'",
                        self.key_column, table_name
                    ),
                )
            })?;
            let key = key.key_string();
            let row = row.to_store_native();

            match mutation.kind {
                MutationKind::Insert => {
                    if self.rows.contains_key(&key) {
                        return Err(RpcStatus::new(
                            RpcCode::AlreadyExists,
                            format!("Row [{}] in table {} already exists", key, table_name),
                        ));
                    }
                    self.rows.insert(key, row);
                }
                MutationKind::Update => match self.rows.get_mut(&key) {
                    Some(existing) => merge(existing, row),
                    None => {
                        return Err(RpcStatus::new(
                            RpcCode::NotFound,
                            format!("Row [{}] not found in table {}", key, table_name),
                        ))
                    }
                },
                MutationKind::InsertOrUpdate => match self.rows.get_mut(&key) {
                    Some(existing) => merge(existing, row),
                    None => {
                        self.rows.insert(key, row);
                    }
                },
                MutationKind::Replace => {
                    self.rows.insert(key, row);
                }
                MutationKind::Delete => {
                    return Err(RpcStatus::new(
                        RpcCode::InvalidArgument,
                        "Delete mutations take a key set, not rows",
                    ))
                }
            }
        }
        Ok(())
    }
}

fn merge(existing: &mut Row, update: Row) {
    for (column, value) in update.iter() {
        existing.insert(column.clone(), value.clone());
    }
}

fn bind<'a>(params: &'a Params, name: &str) -> RpcResult<&'a Value> {
    params.get(name).ok_or_else(|| {
        RpcStatus::new(
            RpcCode::InvalidArgument,
            format!("No parameter found for binding: {}", name),
        )
    })
}

fn table_not_found(name: &str) -> RpcStatus {
    RpcStatus::new(RpcCode::NotFound, format!("Table not found: {}", name))
}

struct TransactionState {
    session: String,
    start_version: u64,
    read: HashSet<String>,
    written: HashMap<String, Table>,
    tag: Option<String>,
}

struct SnapshotState {
    session: String,
    tables: HashMap<String, Table>,
}

#[derive(Default)]
struct StoreState {
    tables: HashMap<String, Table>,
    sessions: HashMap<String, DateTime<Utc>>,
    transactions: HashMap<String, TransactionState>,
    snapshots: HashMap<String, SnapshotState>,
    version: u64,
    pending_aborts: u32,
    pending_failures: HashMap<String, Vec<RpcStatus>>,
    calls: HashMap<String, usize>,
    last_session: Option<String>,
    last_request_options: RequestOptions,
    committed_tags: Vec<Option<String>>,
}

impl StoreState {
    /// Count the call, then fail it if a failure was injected for it
    fn record(&mut self, rpc: &str, session: Option<&str>) -> RpcResult<()> {
        *self.calls.entry(rpc.to_string()).or_default() += 1;
        if let Some(session) = session {
            self.last_session = Some(session.to_string());
        }
        if let Some(queue) = self.pending_failures.get_mut(rpc) {
            if !queue.is_empty() {
                return Err(queue.remove(0));
            }
        }
        Ok(())
    }

    fn check_session(&self, session: &str) -> RpcResult<()> {
        if self.sessions.contains_key(session) {
            Ok(())
        } else {
            Err(RpcStatus::session_not_found(session))
        }
    }

    fn transaction_mut(
        &mut self,
        session: &str,
        id: &TransactionId,
    ) -> RpcResult<&mut TransactionState> {
        match self.transactions.get_mut(&id.0) {
            Some(txn) if txn.session == session => Ok(txn),
            _ => Err(RpcStatus::new(
                RpcCode::FailedPrecondition,
                format!("Transaction {} is not active on session {}", id, session),
            )),
        }
    }

    fn drop_session(&mut self, session: &str) -> bool {
        self.transactions.retain(|_, t| t.session != session);
        self.snapshots.retain(|_, s| s.session != session);
        self.sessions.remove(session).is_some()
    }
}

/// Overlay copy of a table owned by a transaction, cloned on first touch
fn overlay<'a>(
    tables: &HashMap<String, Table>,
    txn: &'a mut TransactionState,
    name: &str,
) -> RpcResult<&'a mut Table> {
    txn.read.insert(name.to_string());
    match txn.written.entry(name.to_string()) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let base = tables.get(name).ok_or_else(|| table_not_found(name))?;
            Ok(entry.insert(base.clone()))
        }
    }
}

/// In-memory [`StoreClient`]
pub struct MemoryStore {
    database: String,
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Create an empty table keyed by `key_column`
    pub fn create_table(&self, name: &str, key_column: &str) {
        self.state.lock().tables.insert(
            name.to_string(),
            Table {
                key_column: key_column.to_string(),
                rows: BTreeMap::new(),
                version: 0,
            },
        );
    }

    /// Committed rows of a table, ordered by key
    pub fn table_rows(&self, name: &str) -> Vec<Row> {
        self.state
            .lock()
            .tables
            .get(name)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Make the next `count` commits fail with `ABORTED`
    pub fn inject_abort(&self, count: u32) {
        self.state.lock().pending_aborts += count;
    }

    /// Make the next call of `rpc` fail with `status`
    pub fn inject_failure(&self, rpc: &str, status: RpcStatus) {
        self.state
            .lock()
            .pending_failures
            .entry(rpc.to_string())
            .or_default()
            .push(status);
    }

    /// Forget a session as if the store had garbage collected it
    pub fn expire_session(&self, session: &str) -> bool {
        self.state.lock().drop_session(session)
    }

    pub fn expire_all_sessions(&self) -> usize {
        let mut state = self.state.lock();
        let names: Vec<String> = state.sessions.keys().cloned().collect();
        for name in &names {
            state.drop_session(name);
        }
        names.len()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Number of times `rpc` was called (e.g. `"commit"`)
    pub fn call_count(&self, rpc: &str) -> usize {
        self.state.lock().calls.get(rpc).copied().unwrap_or(0)
    }

    pub fn reset_call_counts(&self) {
        self.state.lock().calls.clear();
    }

    pub fn last_request_options(&self) -> RequestOptions {
        self.state.lock().last_request_options.clone()
    }

    /// Transaction tags of every successful commit, in commit order
    pub fn committed_transaction_tags(&self) -> Vec<Option<String>> {
        self.state.lock().committed_tags.clone()
    }

    pub fn active_transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    pub fn active_snapshot_count(&self) -> usize {
        self.state.lock().snapshots.len()
    }
}

impl StoreClient for MemoryStore {
    fn create_session(&self) -> RpcResult<String> {
        let mut state = self.state.lock();
        state.record("create_session", None)?;
        let name = format!("{}/sessions/{}", self.database, Uuid::new_v4());
        state.sessions.insert(name.clone(), Utc::now());
        state.last_session = Some(name.clone());
        Ok(name)
    }

    fn delete_session(&self, session: &str) -> RpcResult<()> {
        let mut state = self.state.lock();
        state.record("delete_session", Some(session))?;
        if state.drop_session(session) {
            Ok(())
        } else {
            Err(RpcStatus::session_not_found(session))
        }
    }

    fn list_sessions(&self) -> RpcResult<Vec<String>> {
        let mut state = self.state.lock();
        state.record("list_sessions", None)?;
        let mut names: Vec<String> = state.sessions.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn begin_transaction(
        &self,
        session: &str,
        options: &RequestOptions,
    ) -> RpcResult<TransactionId> {
        let mut state = self.state.lock();
        state.record("begin_transaction", Some(session))?;
        state.check_session(session)?;
        let id = Uuid::new_v4().to_string();
        let start_version = state.version;
        state.transactions.insert(
            id.clone(),
            TransactionState {
                session: session.to_string(),
                start_version,
                read: HashSet::new(),
                written: HashMap::new(),
                tag: options.transaction_tag.clone(),
            },
        );
        Ok(TransactionId(id))
    }

    fn commit(
        &self,
        session: &str,
        transaction: &TransactionId,
        options: &RequestOptions,
    ) -> RpcResult<CommitResponse> {
        let mut state = self.state.lock();
        state.record("commit", Some(session))?;
        state.check_session(session)?;
        state.last_request_options = options.clone();
        state.transaction_mut(session, transaction)?;
        let Some(txn) = state.transactions.remove(&transaction.0) else {
            return Err(RpcStatus::new(
                RpcCode::FailedPrecondition,
                format!("Transaction {} is not active", transaction),
            ));
        };

        if state.pending_aborts > 0 {
            state.pending_aborts -= 1;
            return Err(RpcStatus::aborted("Transaction was aborted."));
        }

        let conflict = txn.read.iter().find(|name| {
            state
                .tables
                .get(name.as_str())
                .is_some_and(|t| t.version > txn.start_version)
        });
        if let Some(name) = conflict {
            return Err(RpcStatus::aborted(format!(
                "Transaction was aborted: table {} changed after the transaction began",
                name
            )));
        }

        state.version += 1;
        let version = state.version;
        for (name, mut table) in txn.written {
            table.version = version;
            state.tables.insert(name, table);
        }
        state.committed_tags.push(txn.tag);
        Ok(CommitResponse {
            commit_timestamp: Utc::now(),
        })
    }

    fn rollback(&self, session: &str, transaction: &TransactionId) -> RpcResult<()> {
        let mut state = self.state.lock();
        state.record("rollback", Some(session))?;
        state.check_session(session)?;
        state.transactions.remove(&transaction.0);
        Ok(())
    }

    fn execute_update(
        &self,
        session: &str,
        transaction: &TransactionId,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> RpcResult<i64> {
        let statement = Statement::parse(sql)?;
        let mut state = self.state.lock();
        state.record("execute_update", Some(session))?;
        state.check_session(session)?;
        state.last_request_options = options.clone();
        state.transaction_mut(session, transaction)?;

        let StoreState {
            tables,
            transactions,
            ..
        } = &mut *state;
        let txn = transactions.get_mut(&transaction.0).ok_or_else(|| {
            RpcStatus::new(RpcCode::FailedPrecondition, "Transaction is not active")
        })?;
        overlay(tables, txn, statement.table())?.update(&statement, params)
    }

    fn execute(
        &self,
        session: &str,
        context: &ReadContext,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> RpcResult<Vec<Row>> {
        let statement = Statement::parse(sql)?;
        if !statement.is_query() {
            return Err(RpcStatus::new(
                RpcCode::InvalidArgument,
                "DML statements must be run with execute_update",
            ));
        }
        let mut state = self.state.lock();
        state.record("execute", Some(session))?;
        state.check_session(session)?;
        state.last_request_options = options.clone();
        let name = statement.table();

        match context {
            ReadContext::SingleUse(_) => state
                .tables
                .get(name)
                .ok_or_else(|| table_not_found(name))?
                .query(&statement, params),
            ReadContext::Snapshot(id) => {
                let snapshot = state.snapshots.get(&id.0).ok_or_else(|| {
                    RpcStatus::new(
                        RpcCode::FailedPrecondition,
                        format!("Snapshot {} is not open", id),
                    )
                })?;
                snapshot
                    .tables
                    .get(name)
                    .ok_or_else(|| table_not_found(name))?
                    .query(&statement, params)
            }
            ReadContext::Transaction(id) => {
                state.transaction_mut(session, id)?;
                let StoreState {
                    tables,
                    transactions,
                    ..
                } = &mut *state;
                let txn = transactions.get_mut(&id.0).ok_or_else(|| {
                    RpcStatus::new(RpcCode::FailedPrecondition, "Transaction is not active")
                })?;
                txn.read.insert(name.to_string());
                match txn.written.get(name) {
                    Some(table) => table.query(&statement, params),
                    None => tables
                        .get(name)
                        .ok_or_else(|| table_not_found(name))?
                        .query(&statement, params),
                }
            }
        }
    }

    fn batch_write(
        &self,
        session: &str,
        transaction: Option<&TransactionId>,
        mutations: &[MutationSet],
        options: &RequestOptions,
    ) -> RpcResult<()> {
        let mut state = self.state.lock();
        state.record("batch_write", Some(session))?;
        state.check_session(session)?;
        state.last_request_options = options.clone();

        if let Some(id) = transaction {
            state.transaction_mut(session, id)?;
            let StoreState {
                tables,
                transactions,
                ..
            } = &mut *state;
            let txn = transactions.get_mut(&id.0).ok_or_else(|| {
                RpcStatus::new(RpcCode::FailedPrecondition, "Transaction is not active")
            })?;
            // Stage on a scratch copy so a failed batch leaves the overlay untouched.
            let mut staged: HashMap<String, Table> = HashMap::new();
            for mutation in mutations {
                let table = match staged.entry(mutation.table.clone()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        entry.insert(overlay(tables, txn, &mutation.table)?.clone())
                    }
                };
                table.apply(&mutation.table, mutation)?;
            }
            txn.written.extend(staged);
            return Ok(());
        }

        let mut staged: HashMap<String, Table> = HashMap::new();
        for mutation in mutations {
            let table = match staged.entry(mutation.table.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let base = state
                        .tables
                        .get(&mutation.table)
                        .ok_or_else(|| table_not_found(&mutation.table))?;
                    entry.insert(base.clone())
                }
            };
            table.apply(&mutation.table, mutation)?;
        }
        state.version += 1;
        let version = state.version;
        for (name, mut table) in staged {
            table.version = version;
            state.tables.insert(name, table);
        }
        Ok(())
    }

    fn execute_partitioned_update(
        &self,
        session: &str,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> RpcResult<i64> {
        let statement = Statement::parse(sql)?;
        if statement.is_query() {
            return Err(RpcStatus::new(
                RpcCode::InvalidArgument,
                "Partitioned DML only supports UPDATE and DELETE statements",
            ));
        }
        let mut state = self.state.lock();
        state.record("execute_partitioned_update", Some(session))?;
        state.check_session(session)?;
        state.last_request_options = options.clone();

        let name = statement.table().to_string();
        let mut table = state
            .tables
            .get(&name)
            .cloned()
            .ok_or_else(|| table_not_found(&name))?;
        let count = table.update(&statement, params)?;
        state.version += 1;
        table.version = state.version;
        state.tables.insert(name, table);
        Ok(count)
    }

    fn begin_snapshot(&self, session: &str, options: &ReadOnlyOptions) -> RpcResult<SnapshotId> {
        let mut state = self.state.lock();
        state.record("begin_snapshot", Some(session))?;
        state.check_session(session)?;
        if options.max_staleness.is_some() || options.min_read_timestamp.is_some() {
            return Err(RpcStatus::new(
                RpcCode::InvalidArgument,
                "Bounded staleness is only allowed for single-use reads",
            ));
        }
        let id = Uuid::new_v4().to_string();
        let tables = state.tables.clone();
        state.snapshots.insert(
            id.clone(),
            SnapshotState {
                session: session.to_string(),
                tables,
            },
        );
        Ok(SnapshotId(id))
    }

    fn end_snapshot(&self, session: &str, snapshot: &SnapshotId) -> RpcResult<()> {
        let mut state = self.state.lock();
        state.record("end_snapshot", Some(session))?;
        state.snapshots.remove(&snapshot.0);
        Ok(())
    }

    fn current_session_name(&self) -> Option<String> {
        self.state.lock().last_session.clone()
    }
}
