// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Mutation batching and partitioned DML tests

#[path = "testutils/mod.rs"]
mod testutils;

use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use serde_json::json;
use spanlite::{
    Error, Event, KeyRange, KeySet, MutationKind, MutationPayload, Params, Row, RowSet, Value,
};
use testutils::test_fixture::TestFixture;

#[test]
fn test_write_outside_transaction_is_framed_as_one() {
    let fixture = TestFixture::new();
    fixture
        .conn
        .insert("users", Row::new().with("id", 1i64).with("name", "ada"))
        .unwrap();

    assert_eq!(
        fixture.event_names(),
        vec!["TransactionBeginning", "MutationApplied", "TransactionCommitted"]
    );
    let written = Row::new().with("id", 1i64).with("name", "ada");
    assert_eq!(
        fixture.events.events()[1],
        Event::MutationApplied {
            table: "users".to_string(),
            kind: MutationKind::Insert,
            payload: MutationPayload::Rows(vec![written]),
        }
    );
    assert_eq!(fixture.store.call_count("begin_transaction"), 0);
}

#[test]
fn test_write_inside_transaction_only_fires_mutation_applied() {
    let fixture = TestFixture::new();
    fixture
        .conn
        .run_in_transaction(|_| {
            fixture.events.clear();
            fixture
                .conn
                .insert("users", Row::new().with("id", 1i64).with("name", "ada"))?;
            assert_eq!(fixture.event_names(), vec!["MutationApplied"]);
            Ok(())
        })
        .unwrap();
    assert_eq!(fixture.count_users(), 1);
}

#[test]
fn test_json_payloads() {
    let fixture = TestFixture::new();
    let one = RowSet::from_json(&json!({"id": 1, "name": "ada"})).unwrap();
    let many = RowSet::from_json(&json!([
        {"id": 2, "name": "bob"},
        {"id": 3, "name": "cy"}
    ]))
    .unwrap();

    fixture.conn.insert("users", one).unwrap();
    fixture.conn.insert("users", many).unwrap();
    assert_eq!(fixture.count_users(), 3);

    assert!(matches!(
        RowSet::from_json(&json!("not a row")),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        KeySet::from_json(&json!({"id": 1})),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_write_mutation_kinds() {
    let fixture = TestFixture::new();
    fixture.seed_users(2);
    let conn = &fixture.conn;

    conn.update("users", Row::new().with("id", 1i64).with("name", "ada"))
        .unwrap();
    conn.replace("users", Row::new().with("id", 2i64)).unwrap();
    conn.write_mutation(
        "users",
        MutationKind::InsertOrUpdate,
        Row::new().with("id", 3i64).with("name", "cy"),
    )
    .unwrap();

    let rows = fixture.store.table_rows("users");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("name"), Some(&Value::from("ada")));
    assert_eq!(rows[1].get("name"), None);

    conn.write_mutation("users", MutationKind::Delete, KeySet::from(2i64))
        .unwrap();
    assert_eq!(fixture.count_users(), 2);
    assert!(matches!(
        conn.write_mutation("users", MutationKind::Delete, Row::new().with("id", 1i64)),
        Err(Error::InvalidArgument(_))
    ));

    let err = conn
        .insert("users", Row::new().with("id", 3i64))
        .unwrap_err();
    assert!(!err.is_aborted());
    assert_eq!(fixture.events.count("TransactionRolledBack"), 1);
}

#[test]
fn test_delete_by_key_list_and_range() {
    let fixture = TestFixture::new();
    fixture.seed_users(6);

    fixture.conn.delete("users", 1i64).unwrap();
    fixture.conn.delete("users", vec![2i64, 3i64]).unwrap();
    assert_eq!(fixture.count_users(), 3);

    fixture
        .conn
        .delete(
            "users",
            KeySet::new().with_range(KeyRange::closed_open(4i64, 6i64)),
        )
        .unwrap();
    assert_eq!(fixture.count_users(), 1);

    fixture.conn.delete("users", KeySet::all()).unwrap();
    assert_eq!(fixture.count_users(), 0);
}

#[test]
fn test_empty_writes_are_no_ops() {
    let fixture = TestFixture::new();
    fixture.conn.insert("users", Vec::<Row>::new()).unwrap();
    fixture.conn.delete("users", KeySet::new()).unwrap();

    assert!(fixture.event_names().is_empty());
    assert_eq!(fixture.store.call_count("batch_write"), 0);
}

#[test]
fn test_temporal_values_are_stored_as_utc_timestamps() {
    let fixture = TestFixture::new();
    let offset = FixedOffset::west_opt(5 * 3600).unwrap();
    let local = offset.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
    let birthday = NaiveDate::from_ymd_opt(1990, 12, 10).unwrap();

    fixture
        .conn
        .insert(
            "users",
            Row::new()
                .with("id", 1i64)
                .with("updated_at", local)
                .with("birthday", birthday),
        )
        .unwrap();

    let row = fixture
        .conn
        .select_one("SELECT * FROM users", &Params::new())
        .unwrap()
        .unwrap();
    assert_eq!(
        row.get("updated_at"),
        Some(&Value::Timestamp(
            Utc.with_ymd_and_hms(2024, 3, 1, 13, 30, 0).unwrap()
        ))
    );
    assert_eq!(row.get("birthday"), Some(&Value::Date(birthday)));
}

#[test]
fn test_partitioned_delete_then_count_is_zero() {
    let fixture = TestFixture::new();
    fixture.seed_users(4);

    let deleted = fixture
        .conn
        .run_partitioned("DELETE FROM users WHERE TRUE", &Params::new())
        .unwrap();
    assert_eq!(deleted, 4);
    assert_eq!(fixture.count_users(), 0);

    let again = fixture
        .conn
        .run_partitioned("DELETE FROM users WHERE TRUE", &Params::new())
        .unwrap();
    assert_eq!(again, 0);
    assert_eq!(fixture.store.call_count("begin_transaction"), 0);
}

#[test]
fn test_partitioned_update_with_bindings() {
    let fixture = TestFixture::new();
    fixture.seed_users(3);

    let updated = fixture
        .conn
        .run_partitioned(
            "UPDATE users SET name = @name WHERE id = @id",
            &Params::new().bind("name", "root").bind("id", 2i64),
        )
        .unwrap();
    assert_eq!(updated, 1);
    assert_eq!(fixture.events.count("QueryExecuted"), 1);
}

#[test]
fn test_partitioned_inside_transaction_is_rejected() {
    let fixture = TestFixture::new();
    let err = fixture
        .conn
        .run_in_transaction(|_| {
            fixture
                .conn
                .run_partitioned("DELETE FROM users WHERE TRUE", &Params::new())
        })
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Logic error: Partitioned DML cannot be run inside a transaction"
    );
    assert_eq!(fixture.store.call_count("execute_partitioned_update"), 0);
}

#[test]
fn test_partitioned_failure_carries_sql() {
    let fixture = TestFixture::new();
    let err = fixture
        .conn
        .run_partitioned("DELETE FROM missing WHERE TRUE", &Params::new())
        .unwrap_err();
    match err {
        Error::Query { sql, .. } => assert_eq!(sql, "DELETE FROM missing WHERE TRUE"),
        other => panic!("unexpected error: {other}"),
    }
}
