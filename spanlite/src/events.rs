// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Lifecycle events
//!
//! The connection reports transaction boundaries, mutations and executed
//! statements to an [`EventSink`]. Dispatch is fire-and-forget: a sink
//! cannot fail the operation that produced the event.

use crate::mutation::{MutationKind, MutationPayload};
use crate::value::Params;
use parking_lot::Mutex;
use std::time::Duration;

/// Event emitted by a connection
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TransactionBeginning { level: u32 },
    TransactionCommitting { level: u32 },
    TransactionCommitted { level: u32 },
    TransactionRolledBack { level: u32 },
    /// A normalized mutation, reported before it is sent
    MutationApplied {
        table: String,
        kind: MutationKind,
        payload: MutationPayload,
    },
    QueryExecuted {
        sql: String,
        params: Params,
        elapsed: Duration,
    },
}

impl Event {
    /// Short name, stable across payloads
    pub fn name(&self) -> &'static str {
        match self {
            Event::TransactionBeginning { .. } => "TransactionBeginning",
            Event::TransactionCommitting { .. } => "TransactionCommitting",
            Event::TransactionCommitted { .. } => "TransactionCommitted",
            Event::TransactionRolledBack { .. } => "TransactionRolledBack",
            Event::MutationApplied { .. } => "MutationApplied",
            Event::QueryExecuted { .. } => "QueryExecuted",
        }
    }
}

/// Receiver of connection events
pub trait EventSink: Send + Sync {
    fn dispatch(&self, event: &Event);
}

impl<F> EventSink for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn dispatch(&self, event: &Event) {
        self(event)
    }
}

/// Default sink: forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn dispatch(&self, event: &Event) {
        match event {
            Event::QueryExecuted { sql, params, elapsed } => {
                log::debug!("Executed in {:?}: {} {}", elapsed, sql, params)
            }
            Event::MutationApplied {
                table,
                kind,
                payload,
            } => log::debug!("Mutation {} on '{}' ({} rows)", kind, table, payload.len()),
            other => log::debug!("{:?}", other),
        }
    }
}

/// Sink that keeps every event, for assertions
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Event names in dispatch order
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(Event::name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn dispatch(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}
