// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Partitioned DML
//!
//! Bulk UPDATE/DELETE executed by the store outside any transaction. The
//! store applies the statement partition by partition, so there is no
//! retry loop here and the affected-row count is a lower bound when the
//! statement is not idempotent.

use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::query::execute_statement;
use crate::session::SessionSource;
use crate::store::{RequestOptions, StoreClient};
use crate::txn::ExecutionScope;
use crate::value::Params;
use std::sync::Arc;

pub struct PartitionedDmlExecutor {
    store: Arc<dyn StoreClient>,
    events: Arc<dyn EventSink>,
}

impl PartitionedDmlExecutor {
    pub fn new(store: Arc<dyn StoreClient>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// Run the statement and return the number of affected rows
    pub fn run(
        &self,
        sessions: &SessionSource,
        scope: ExecutionScope,
        sql: &str,
        params: &Params,
        options: &RequestOptions,
    ) -> Result<i64> {
        match scope {
            ExecutionScope::Transaction => {
                return Err(Error::Logic(
                    "Partitioned DML cannot be run inside a transaction".to_string(),
                ))
            }
            ExecutionScope::Snapshot => {
                return Err(Error::Logic(
                    "Partitioned DML cannot be run inside a snapshot".to_string(),
                ))
            }
            ExecutionScope::Idle => {}
        }

        let count = sessions.with_session(|session| {
            execute_statement(self.events.as_ref(), sql, params, || {
                self.store
                    .execute_partitioned_update(&session.name, sql, params, options)
            })
        })?;
        log::debug!("Partitioned DML affected {} rows", count);
        Ok(count)
    }
}
