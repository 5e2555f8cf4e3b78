// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! RPC client interface of the remote store
//!
//! The connection never talks to the network itself. Everything it needs
//! from the store goes through [`StoreClient`]; failures come back as
//! [`RpcStatus`] and are classified by [`crate::Error`].

use super::status::RpcStatus;
use crate::mutation::MutationSet;
use crate::value::{Params, Row};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result of a single RPC
pub type RpcResult<T> = std::result::Result<T, RpcStatus>;

/// Store-assigned read/write transaction identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// Store-assigned read-only snapshot identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only transaction options as the RPC layer expects them
///
/// At most one field is set; none means a strong read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOnlyOptions {
    pub exact_staleness: Option<Duration>,
    pub max_staleness: Option<Duration>,
    pub read_timestamp: Option<DateTime<Utc>>,
    pub min_read_timestamp: Option<DateTime<Utc>>,
    pub return_read_timestamp: bool,
}

impl ReadOnlyOptions {
    pub fn strong() -> Self {
        Self::default()
    }

    pub fn is_strong(&self) -> bool {
        self.exact_staleness.is_none()
            && self.max_staleness.is_none()
            && self.read_timestamp.is_none()
            && self.min_read_timestamp.is_none()
    }
}

/// Where a read is served from
#[derive(Debug, Clone, PartialEq)]
pub enum ReadContext {
    /// One-shot read-only transaction
    SingleUse(ReadOnlyOptions),
    /// Inside an active read/write transaction
    Transaction(TransactionId),
    /// Inside an open read-only snapshot
    Snapshot(SnapshotId),
}

/// Tags attached to a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub request_tag: Option<String>,
    pub transaction_tag: Option<String>,
}

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResponse {
    pub commit_timestamp: DateTime<Utc>,
}

/// RPC surface of the remote store
///
/// Implementations must be safe to share between connections; each
/// connection only ever drives one session at a time.
pub trait StoreClient: Send + Sync {
    fn create_session(&self) -> RpcResult<String>;

    fn delete_session(&self, session: &str) -> RpcResult<()>;

    fn list_sessions(&self) -> RpcResult<Vec<String>>;

    fn begin_transaction(
        &self,
        session: &str,
        options: &RequestOptions,
    ) -> RpcResult<TransactionId>;

    fn commit(
        &self,
        session: &str,
        transaction: &TransactionId,
        options: &RequestOptions,
    ) -> RpcResult<CommitResponse>;

    fn rollback(&self, session: &str, transaction: &TransactionId) -> RpcResult<()>;

    /// Run DML inside a transaction; returns the affected-row count
    fn execute_update(
        &self,
        session: &str,
        transaction: &TransactionId,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> RpcResult<i64>;

    /// Run a query and return its rows
    fn execute(
        &self,
        session: &str,
        context: &ReadContext,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> RpcResult<Vec<Row>>;

    /// Apply mutations, staged into `transaction` or committed on their own
    fn batch_write(
        &self,
        session: &str,
        transaction: Option<&TransactionId>,
        mutations: &[MutationSet],
        options: &RequestOptions,
    ) -> RpcResult<()>;

    fn execute_partitioned_update(
        &self,
        session: &str,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> RpcResult<i64>;

    fn begin_snapshot(&self, session: &str, options: &ReadOnlyOptions) -> RpcResult<SnapshotId>;

    fn end_snapshot(&self, session: &str, snapshot: &SnapshotId) -> RpcResult<()>;

    /// Retries the store recommends for aborted transactions
    fn recommended_max_retries(&self) -> u32 {
        10
    }

    /// Name of the session used by the most recent RPC, for diagnostics
    fn current_session_name(&self) -> Option<String> {
        None
    }
}
