// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Mutation payload types

use crate::error::{Error, Result};
use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Kind of write applied to a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// Fails if a row with the same key exists
    Insert,
    /// Fails if the row does not exist; only named columns change
    Update,
    /// Insert, or merge named columns into the existing row
    InsertOrUpdate,
    /// Insert, or overwrite the whole existing row
    Replace,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::InsertOrUpdate => "insert_or_update",
            MutationKind::Replace => "replace",
            MutationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Rows handed to a write: either one row or a list of rows
#[derive(Debug, Clone, PartialEq)]
pub enum RowSet {
    Single(Row),
    Multiple(Vec<Row>),
}

impl RowSet {
    /// Detect one row (object of columns) or many rows (array of objects)
    pub fn from_json(json: &serde_json::Value) -> Result<RowSet> {
        match json {
            serde_json::Value::Object(object) => Ok(RowSet::Single(Row::from_json_object(object)?)),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::Object(object) => Row::from_json_object(object),
                    other => Err(Error::InvalidArgument(format!(
                        "Expected a row object in the row list, got: {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(RowSet::Multiple),
            other => Err(Error::InvalidArgument(format!(
                "Mutation rows must be an object or a list of objects, got: {}",
                other
            ))),
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            RowSet::Single(row) => vec![row],
            RowSet::Multiple(rows) => rows,
        }
    }
}

impl From<Row> for RowSet {
    fn from(row: Row) -> Self {
        RowSet::Single(row)
    }
}

impl From<Vec<Row>> for RowSet {
    fn from(rows: Vec<Row>) -> Self {
        RowSet::Multiple(rows)
    }
}

/// A range of primary keys
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    pub start: Value,
    pub end: Value,
    pub start_closed: bool,
    pub end_closed: bool,
}

impl KeyRange {
    /// `[start, end)`
    pub fn closed_open(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            start_closed: true,
            end_closed: false,
        }
    }

    /// `[start, end]`
    pub fn closed_closed(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            start_closed: true,
            end_closed: true,
        }
    }

    pub fn contains(&self, key: &Value) -> bool {
        let after_start = match key.compare(&self.start) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => self.start_closed,
            _ => false,
        };
        let before_end = match key.compare(&self.end) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => self.end_closed,
            _ => false,
        };
        after_start && before_end
    }
}

/// Keys selected by a delete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeySet {
    keys: Vec<Value>,
    ranges: Vec<KeyRange>,
    all: bool,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row of the table
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Value>) -> Self {
        self.keys.push(key.into().to_store_native());
        self
    }

    pub fn with_range(mut self, range: KeyRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    pub fn ranges(&self) -> &[KeyRange] {
        &self.ranges
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    /// Selects nothing at all
    pub fn is_empty(&self) -> bool {
        !self.all && self.keys.is_empty() && self.ranges.is_empty()
    }

    pub fn matches(&self, key: &Value) -> bool {
        if self.all {
            return true;
        }
        let key_string = key.key_string();
        self.keys.iter().any(|k| k.key_string() == key_string)
            || self.ranges.iter().any(|r| r.contains(key))
    }

    /// Accepts a scalar key or a list of keys
    ///
    /// An object is ambiguous (one row? a key set?) and is rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<KeySet> {
        match json {
            serde_json::Value::Object(_) => Err(Error::InvalidArgument(
                "Delete keys must be a key, a list of keys or a KeySet, not an object".to_string(),
            )),
            serde_json::Value::Array(items) => items
                .iter()
                .try_fold(KeySet::new(), |set, item| Ok(set.with_key(Value::from_json(item)?))),
            scalar => Ok(KeySet::new().with_key(Value::from_json(scalar)?)),
        }
    }
}

impl From<Value> for KeySet {
    fn from(key: Value) -> Self {
        KeySet::new().with_key(key)
    }
}

impl From<i64> for KeySet {
    fn from(key: i64) -> Self {
        KeySet::new().with_key(key)
    }
}

impl From<&str> for KeySet {
    fn from(key: &str) -> Self {
        KeySet::new().with_key(key)
    }
}

impl From<Vec<Value>> for KeySet {
    fn from(keys: Vec<Value>) -> Self {
        keys.into_iter().fold(KeySet::new(), KeySet::with_key)
    }
}

impl From<Vec<i64>> for KeySet {
    fn from(keys: Vec<i64>) -> Self {
        keys.into_iter().fold(KeySet::new(), KeySet::with_key)
    }
}

/// Payload of a mutation: rows for writes, a key set for deletes
#[derive(Debug, Clone, PartialEq)]
pub enum MutationPayload {
    Rows(Vec<Row>),
    Keys(KeySet),
}

impl MutationPayload {
    /// Number of rows (or explicit keys and ranges) carried
    pub fn len(&self) -> usize {
        match self {
            MutationPayload::Rows(rows) => rows.len(),
            MutationPayload::Keys(keys) => keys.keys().len() + keys.ranges().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MutationPayload::Rows(rows) => rows.is_empty(),
            MutationPayload::Keys(keys) => keys.is_empty(),
        }
    }
}

impl From<RowSet> for MutationPayload {
    fn from(rows: RowSet) -> Self {
        MutationPayload::Rows(rows.into_rows())
    }
}

impl From<Row> for MutationPayload {
    fn from(row: Row) -> Self {
        MutationPayload::Rows(vec![row])
    }
}

impl From<Vec<Row>> for MutationPayload {
    fn from(rows: Vec<Row>) -> Self {
        MutationPayload::Rows(rows)
    }
}

impl From<KeySet> for MutationPayload {
    fn from(keys: KeySet) -> Self {
        MutationPayload::Keys(keys)
    }
}

/// One normalized write against one table
#[derive(Debug, Clone, PartialEq)]
pub struct MutationSet {
    pub table: String,
    pub kind: MutationKind,
    pub payload: MutationPayload,
}

impl MutationSet {
    pub fn delete(table: impl Into<String>, keys: KeySet) -> Self {
        Self {
            table: table.into(),
            kind: MutationKind::Delete,
            payload: MutationPayload::Keys(keys),
        }
    }

    /// Number of rows (or explicit keys) carried
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
