// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Value type system for statement parameters, rows and mutations
//!
//! Client code may hand in temporal values with offsets or without a zone;
//! the store only understands UTC timestamps and calendar dates. See
//! [`Value::to_store_native`].

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Column and parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Calendar date, store-native
    Date(NaiveDate),
    /// UTC timestamp, store-native
    Timestamp(DateTime<Utc>),
    /// Timestamp with an offset, converted before it reaches the store
    DateTime(DateTime<FixedOffset>),
    /// Zone-less timestamp, interpreted as UTC before it reaches the store
    LocalDateTime(NaiveDateTime),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// True for values the store cannot accept verbatim
    pub fn is_client_temporal(&self) -> bool {
        match self {
            Value::DateTime(_) | Value::LocalDateTime(_) => true,
            Value::Array(items) => items.iter().any(Value::is_client_temporal),
            _ => false,
        }
    }

    /// Convert client temporal values into the store's representation
    pub fn to_store_native(self) -> Value {
        match self {
            Value::DateTime(dt) => Value::Timestamp(dt.with_timezone(&Utc)),
            Value::LocalDateTime(naive) => Value::Timestamp(naive.and_utc()),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::to_store_native).collect())
            }
            other => other,
        }
    }

    /// Stable string form used to compare primary keys
    pub fn key_string(&self) -> String {
        match self {
            Value::DateTime(_) | Value::LocalDateTime(_) => {
                self.clone().to_store_native().key_string()
            }
            Value::Null => "null".to_string(),
            Value::Bool(b) => format!("b:{}", b),
            Value::Int(i) => format!("i:{}", i),
            Value::Float(f) => format!("f:{}", f),
            Value::String(s) => format!("s:{}", s),
            Value::Bytes(b) => format!("x:{:?}", b),
            Value::Date(d) => format!("d:{}", d),
            Value::Timestamp(ts) => format!("t:{}", ts.to_rfc3339()),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::key_string).collect();
                format!("a:[{}]", parts.join(","))
            }
        }
    }

    /// Order two key values of compatible types
    ///
    /// Returns `None` for values that have no common ordering (e.g. a
    /// string and an integer). Temporal values compare in UTC.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::DateTime(_) | Value::LocalDateTime(_), _)
            | (_, Value::DateTime(_) | Value::LocalDateTime(_)) => self
                .clone()
                .to_store_native()
                .compare(&other.clone().to_store_native()),
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Build a value from a dynamic JSON scalar or array
    ///
    /// Objects have no column-value counterpart and are rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None => n.as_f64().map(Value::Float).ok_or_else(|| {
                    Error::InvalidArgument(format!("Unrepresentable number: {}", n))
                }),
            },
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            serde_json::Value::Object(_) => Err(Error::InvalidArgument(
                "Objects cannot be used as column values".to_string(),
            )),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Date(d) => write!(f, "{}", d),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::LocalDateTime(naive) => write!(f, "{}", naive),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(naive: NaiveDateTime) -> Self {
        Value::LocalDateTime(naive)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One row: column name to value, ordered by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column assignment
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Copy of this row with every temporal value in store-native form
    pub fn to_store_native(&self) -> Row {
        Row {
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().to_store_native()))
                .collect(),
        }
    }

    /// Build a row from a JSON object
    pub fn from_json_object(
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Row> {
        let mut row = Row::new();
        for (column, value) in object {
            row.insert(column.clone(), Value::from_json(value)?);
        }
        Ok(row)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            columns: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Named statement parameters (`@name` placeholders)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(k, v)| format!("@{}={}", k, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    #[test]
    fn test_offset_datetime_becomes_utc_timestamp() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let native = Value::DateTime(local).to_store_native();
        assert_eq!(
            native,
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_naive_datetime_is_treated_as_utc() {
        let naive = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(3, 4, 5).unwrap());
        let native = Value::LocalDateTime(naive).to_store_native();
        assert_eq!(
            native,
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
    }

    #[test]
    fn test_dates_and_scalars_are_untouched() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(Value::Date(date).to_store_native(), Value::Date(date));
        assert_eq!(Value::Int(3).to_store_native(), Value::Int(3));
    }

    #[test]
    fn test_nested_arrays_are_converted() {
        let offset = FixedOffset::west_opt(3600).unwrap();
        let dt = offset.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let value = Value::Array(vec![Value::Int(1), Value::DateTime(dt)]);
        assert!(value.is_client_temporal());
        let native = value.to_store_native();
        assert!(!native.is_client_temporal());
    }

    #[test]
    fn test_key_string_matches_across_temporal_forms() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let offset = FixedOffset::east_opt(3600).unwrap();
        let shifted = utc.with_timezone(&offset);
        assert_eq!(
            Value::Timestamp(utc).key_string(),
            Value::DateTime(shifted).key_string()
        );
        assert_ne!(Value::Int(1).key_string(), Value::String("1".into()).key_string());
    }

    #[test]
    fn test_compare() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(Value::Int(2).compare(&Value::Float(1.5)), Some(Ordering::Greater));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::Int(1).compare(&Value::from("1")), None);
    }

    #[test]
    fn test_from_json_rejects_objects() {
        let json = serde_json::json!({"a": 1});
        assert!(matches!(
            Value::from_json(&json),
            Err(Error::InvalidArgument(_))
        ));
        let json = serde_json::json!([1, "x", null, 1.5]);
        assert_eq!(
            Value::from_json(&json).unwrap(),
            Value::Array(vec![
                Value::Int(1),
                Value::String("x".into()),
                Value::Null,
                Value::Float(1.5)
            ])
        );
    }

    #[test]
    fn test_row_builder() {
        let row = Row::new().with("id", 1i64).with("name", "alice");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("name"), Some(&Value::String("alice".into())));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name"]);
    }
}
