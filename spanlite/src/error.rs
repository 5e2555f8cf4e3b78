// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types
//!
//! Every public operation returns [`Result`]. The variants map onto the
//! recovery classes the connection acts on:
//!
//! - `Aborted` is replayed by the transaction coordinator.
//! - `SessionNotFound` is handled by the session recovery policy.
//! - Everything else propagates to the caller unchanged.

use crate::cache::CacheError;
use crate::store::RpcStatus;
use crate::value::Params;
use thiserror::Error;

/// Errors raised by the connection and its components
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transaction aborted: {0}")]
    Aborted(RpcStatus),

    #[error("Session not found: {0}")]
    SessionNotFound(RpcStatus),

    #[error("{source} (SQL: {sql})")]
    Query {
        sql: String,
        params: Params,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Logic error: {0}")]
    Logic(String),

    #[error("Session pool exhausted: all {max} sessions are leased")]
    PoolExhausted { max: usize },

    #[error("RPC error: {0}")]
    Rpc(RpcStatus),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a statement failure with the SQL text and bindings that caused it
    pub fn query(sql: impl Into<String>, params: &Params, source: Error) -> Self {
        Error::Query {
            sql: sql.into(),
            params: params.clone(),
            source: Box::new(source),
        }
    }

    /// True for the store's optimistic-concurrency conflict class
    pub fn is_aborted(&self) -> bool {
        match self {
            Error::Aborted(_) => true,
            Error::Query { source, .. } => source.is_aborted(),
            _ => false,
        }
    }

    /// True when the remote session backing the call no longer exists
    pub fn is_session_not_found(&self) -> bool {
        match self {
            Error::SessionNotFound(_) => true,
            Error::Query { source, .. } => source.is_session_not_found(),
            _ => false,
        }
    }

    /// The RPC status underneath this error, if any
    pub fn rpc_status(&self) -> Option<&RpcStatus> {
        match self {
            Error::Aborted(status) | Error::SessionNotFound(status) | Error::Rpc(status) => {
                Some(status)
            }
            Error::Query { source, .. } => source.rpc_status(),
            _ => None,
        }
    }
}

impl From<RpcStatus> for Error {
    fn from(status: RpcStatus) -> Self {
        if status.is_aborted() {
            Error::Aborted(status)
        } else if status.is_session_not_found() {
            Error::SessionNotFound(status)
        } else {
            Error::Rpc(status)
        }
    }
}

impl From<CacheError> for Error {
    fn from(error: CacheError) -> Self {
        Error::Cache(error.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Self {
        Error::Cache(format!("Failed to encode cache entry: {}", error))
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Config(error.to_string())
    }
}
