// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SpanLite - client-side execution core for session-based transactional stores
//!
//! SpanLite drives a remote store in which sessions are leased, read/write
//! transactions abort under contention and must be replayed, and a
//! garbage-collected session is a recoverable failure rather than a real
//! transaction error.
//!
//! # Features
//!
//! - **Transaction retry**: aborted transactions are replayed up to a bounded attempt budget
//! - **Nested transactions**: inner calls become virtual levels of the outer remote transaction
//! - **Session pool**: warmup, maintenance and clearing, persisted in a sled or in-memory cache
//! - **Session recovery**: configurable handling of session-not-found failures
//! - **Mutations**: batched table writes, committed on their own outside a transaction
//! - **Snapshots**: repeatable reads and stale single-use reads at a timestamp bound
//! - **Partitioned DML**: bulk updates and deletes outside any transaction
//!
//! # Usage
//!
//! ```ignore
//! use spanlite::{Connection, ConnectionConfig, MemoryStore, Params, Row};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new("projects/p/instances/i/databases/d"));
//! store.create_table("users", "id");
//!
//! let conn = Connection::new(store, ConnectionConfig::new("d"))?;
//! conn.run_in_transaction(|tx| {
//!     tx.insert("users", Row::new().with("id", 1i64).with("name", "ada"))
//! })?;
//! let rows = conn.select("SELECT * FROM users", &Params::new())?;
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod mutation;
pub mod partitioned;
pub mod read;
pub mod session;
pub mod store;
pub mod txn;
pub mod value;

pub(crate) mod query;

pub use cache::{BoxedCacheDriver, CacheType};
pub use config::{CacheConfig, ConnectionConfig, SessionPoolConfig};
pub use connection::{Connection, ConnectionBuilder, Diagnostics};
pub use error::{Error, Result};
pub use events::{Event, EventSink, LogEventSink, RecordingEventSink};
pub use mutation::{KeyRange, KeySet, MutationKind, MutationPayload, RowSet};
pub use read::{SnapshotContext, TimestampBound};
pub use session::{RecoveryMode, SessionInfo};
pub use store::{MemoryStore, RpcCode, RpcStatus, StoreClient};
pub use txn::TransactionContext;
pub use value::{Params, Row, Value};

/// SpanLite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// SpanLite crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
