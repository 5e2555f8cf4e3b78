// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statements and mutations issued on an open transaction

use super::coordinator::TransactionCoordinator;
use crate::error::{Error, Result};
use crate::mutation::{KeySet, MutationKind, MutationPayload, RowSet};
use crate::query::execute_statement;
use crate::store::{ReadContext, TransactionId};
use crate::value::{Params, Row};

/// Handle passed to transaction callbacks
///
/// All work goes to the remote transaction of the outermost level.
pub struct TransactionContext<'a> {
    coordinator: &'a TransactionCoordinator,
    session: String,
    transaction: TransactionId,
}

impl<'a> TransactionContext<'a> {
    pub(crate) fn new(
        coordinator: &'a TransactionCoordinator,
        session: String,
        transaction: TransactionId,
    ) -> Self {
        Self {
            coordinator,
            session,
            transaction,
        }
    }

    /// Current nesting depth; 1 for the outermost level
    pub fn level(&self) -> u32 {
        self.coordinator.transaction_level()
    }

    pub fn session_name(&self) -> &str {
        &self.session
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction
    }

    pub fn select(&self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let context = ReadContext::Transaction(self.transaction.clone());
        let options = self.coordinator.request_options();
        execute_statement(self.coordinator.events.as_ref(), sql, params, || {
            self.coordinator
                .store
                .execute(&self.session, &context, sql, params, &options)
        })
    }

    pub fn select_one(&self, sql: &str, params: &Params) -> Result<Option<Row>> {
        Ok(self.select(sql, params)?.into_iter().next())
    }

    /// Run a DML statement; returns the number of affected rows
    pub fn execute_update(&self, sql: &str, params: &Params) -> Result<i64> {
        let options = self.coordinator.request_options();
        execute_statement(self.coordinator.events.as_ref(), sql, params, || {
            self.coordinator.store.execute_update(
                &self.session,
                &self.transaction,
                sql,
                params,
                &options,
            )
        })
    }

    /// Stage a mutation; an empty row or key set does nothing
    pub fn write_mutation(
        &self,
        table: &str,
        kind: MutationKind,
        payload: impl Into<MutationPayload>,
    ) -> Result<()> {
        let batcher = &self.coordinator.batcher;
        match batcher.normalize(table, kind, payload.into())? {
            Some(mutation) => batcher.stage(
                &self.session,
                &self.transaction,
                mutation,
                &self.coordinator.request_options(),
            ),
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

    pub fn delete(&self, table: &str, keys: impl Into<KeySet>) -> Result<()> {
        let keys: KeySet = keys.into();
        self.write_mutation(table, MutationKind::Delete, keys)
    }

    fn write_rows(&self, table: &str, kind: MutationKind, rows: impl Into<RowSet>) -> Result<()> {
        let rows: RowSet = rows.into();
        self.write_mutation(table, kind, rows)
    }

    /// Run `hook` once the outermost transaction has committed
    pub fn after_commit(&self, hook: impl FnOnce() + Send + 'static) {
        self.coordinator.after_commit(hook);
    }

    /// Open a nested level on the same remote transaction
    pub fn run_in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnMut(&TransactionContext<'_>) -> Result<T>,
    {
        self.coordinator.run_nested(f)
    }

    pub fn savepoint(&self, name: &str) -> Result<()> {
        Err(Error::NotSupported(format!(
            "Savepoints are not supported (savepoint '{}')",
            name
        )))
    }

    pub fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        Err(Error::NotSupported(format!(
            "Savepoints are not supported (savepoint '{}')",
            name
        )))
    }
}
