// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Mutation batching
//!
//! Normalizes write payloads into [`MutationSet`]s and sends them to the
//! store, either staged in the active transaction or as a single-use
//! write. A single-use write is reported as its own one-level transaction
//! so listeners see the same event shape in both cases.

use super::types::{MutationKind, MutationPayload, MutationSet};
use crate::error::{Error, Result};
use crate::events::{Event, EventSink};
use crate::store::{RequestOptions, StoreClient, TransactionId};
use std::sync::Arc;

pub struct MutationBatcher {
    store: Arc<dyn StoreClient>,
    events: Arc<dyn EventSink>,
}

impl MutationBatcher {
    pub fn new(store: Arc<dyn StoreClient>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// Build a mutation; `None` when there is nothing to write
    ///
    /// Deletes take a key set, every other kind takes rows.
    pub fn normalize(
        &self,
        table: &str,
        kind: MutationKind,
        payload: MutationPayload,
    ) -> Result<Option<MutationSet>> {
        let payload = match (kind, payload) {
            (MutationKind::Delete, MutationPayload::Keys(keys)) => MutationPayload::Keys(keys),
            (MutationKind::Delete, MutationPayload::Rows(_)) => {
                return Err(Error::InvalidArgument(
                    "Delete mutations take a key set, not rows".to_string(),
                ));
            }
            (kind, MutationPayload::Keys(_)) => {
                return Err(Error::InvalidArgument(format!(
                    "{} mutations take rows, not a key set",
                    kind
                )));
            }
            (_, MutationPayload::Rows(rows)) => {
                MutationPayload::Rows(rows.iter().map(|row| row.to_store_native()).collect())
            }
        };
        if payload.is_empty() {
            return Ok(None);
        }
        Ok(Some(MutationSet {
            table: table.to_string(),
            kind,
            payload,
        }))
    }

    /// Stage a mutation in an open transaction
    pub fn stage(
        &self,
        session: &str,
        transaction: &TransactionId,
        mutation: MutationSet,
        options: &RequestOptions,
    ) -> Result<()> {
        self.dispatch_applied(&mutation);
        self.store
            .batch_write(session, Some(transaction), &[mutation], options)?;
        Ok(())
    }

    /// Write a mutation on its own, framed as a one-level transaction
    pub fn apply_single_use(
        &self,
        session: &str,
        mutation: MutationSet,
        options: &RequestOptions,
    ) -> Result<()> {
        self.events
            .dispatch(&Event::TransactionBeginning { level: 1 });
        self.dispatch_applied(&mutation);
        match self.store.batch_write(session, None, &[mutation], options) {
            Ok(()) => {
                self.events
                    .dispatch(&Event::TransactionCommitted { level: 1 });
                Ok(())
            }
            Err(status) => {
                self.events
                    .dispatch(&Event::TransactionRolledBack { level: 1 });
                Err(status.into())
            }
        }
    }

    fn dispatch_applied(&self, mutation: &MutationSet) {
        self.events.dispatch(&Event::MutationApplied {
            table: mutation.table.clone(),
            kind: mutation.kind,
            payload: mutation.payload.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::mutation::{KeySet, RowSet};
    use crate::store::MemoryStore;
    use crate::value::{Row, Value};
    use chrono::{FixedOffset, TimeZone, Utc};

    fn setup() -> (Arc<MemoryStore>, Arc<RecordingEventSink>, MutationBatcher) {
        let store = Arc::new(MemoryStore::new("db"));
        store.create_table("users", "id");
        let events = Arc::new(RecordingEventSink::new());
        let batcher = MutationBatcher::new(store.clone(), events.clone());
        (store, events, batcher)
    }

    #[test]
    fn test_normalize_converts_temporal_values() {
        let (_, _, batcher) = setup();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let row = Row::new()
            .with("id", 1i64)
            .with("at", offset.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());

        let set = batcher
            .normalize("users", MutationKind::Insert, row.into())
            .unwrap()
            .unwrap();
        let MutationPayload::Rows(rows) = set.payload else {
            panic!("expected rows");
        };
        assert_eq!(
            rows[0].get("at"),
            Some(&Value::Timestamp(
                Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
            ))
        );
    }

    #[test]
    fn test_empty_rows_are_a_no_op() {
        let (_, _, batcher) = setup();
        assert!(batcher
            .normalize("users", MutationKind::Insert, RowSet::Multiple(vec![]).into())
            .unwrap()
            .is_none());
        assert!(batcher
            .normalize("users", MutationKind::Delete, KeySet::new().into())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_payload_must_match_kind() {
        let (_, _, batcher) = setup();
        let rows = MutationPayload::from(Row::new().with("id", 1i64));
        let keys = MutationPayload::from(KeySet::from(1i64));
        assert!(matches!(
            batcher.normalize("users", MutationKind::Delete, rows),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            batcher.normalize("users", MutationKind::Update, keys.clone()),
            Err(Error::InvalidArgument(_))
        ));

        let delete = batcher
            .normalize("users", MutationKind::Delete, keys)
            .unwrap()
            .unwrap();
        assert_eq!(delete, MutationSet::delete("users", KeySet::from(1i64)));
    }

    #[test]
    fn test_mutation_event_carries_normalized_payload() {
        let (store, events, batcher) = setup();
        let session = store.create_session().unwrap();
        let offset = FixedOffset::east_opt(3600).unwrap();
        let row = Row::new()
            .with("id", 1i64)
            .with("at", offset.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        let set = batcher
            .normalize("users", MutationKind::Insert, row.into())
            .unwrap()
            .unwrap();

        batcher
            .apply_single_use(&session, set, &RequestOptions::default())
            .unwrap();
        let expected = Row::new().with("id", 1i64).with(
            "at",
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()),
        );
        assert_eq!(
            events.events()[1],
            Event::MutationApplied {
                table: "users".to_string(),
                kind: MutationKind::Insert,
                payload: MutationPayload::Rows(vec![expected]),
            }
        );
    }

    #[test]
    fn test_single_use_write_is_framed_as_transaction() {
        let (store, events, batcher) = setup();
        let session = store.create_session().unwrap();
        let set = batcher
            .normalize(
                "users",
                MutationKind::Insert,
                Row::new().with("id", 1i64).into(),
            )
            .unwrap()
            .unwrap();

        batcher
            .apply_single_use(&session, set, &RequestOptions::default())
            .unwrap();
        assert_eq!(
            events.names(),
            vec!["TransactionBeginning", "MutationApplied", "TransactionCommitted"]
        );
        assert_eq!(store.table_rows("users").len(), 1);
    }

    #[test]
    fn test_failed_single_use_write_fires_rolled_back() {
        let (store, events, batcher) = setup();
        let session = store.create_session().unwrap();
        let set = batcher
            .normalize("missing", MutationKind::Insert, Row::new().with("id", 1i64).into())
            .unwrap()
            .unwrap();

        assert!(batcher
            .apply_single_use(&session, set, &RequestOptions::default())
            .is_err());
        assert_eq!(events.count("TransactionRolledBack"), 1);
        assert_eq!(events.count("TransactionCommitted"), 0);
    }
}
