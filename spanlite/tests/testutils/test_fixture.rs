// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Test fixture for SpanLite integration tests
//!
//! Every fixture owns its own store, cache and event recorder, so tests
//! can run in parallel.

#![allow(dead_code)]

use spanlite::cache::MemoryCacheDriver;
use spanlite::{
    BoxedCacheDriver, Connection, ConnectionConfig, MemoryStore, Params, RecordingEventSink, Row,
    SessionPoolConfig,
};
use std::sync::Arc;

pub const DATABASE: &str = "projects/test/instances/test/databases/test";

pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingEventSink>,
    pub cache: Arc<BoxedCacheDriver>,
    pub conn: Connection,
}

impl TestFixture {
    /// Pooled connection with one warm session and a `users` table
    pub fn new() -> Self {
        Self::with_config(
            ConnectionConfig::new(DATABASE)
                .with_session_pool(SessionPoolConfig::default().with_min_sessions(1)),
        )
    }

    pub fn with_config(config: ConnectionConfig) -> Self {
        init_logging();
        let store = Arc::new(MemoryStore::new(DATABASE));
        store.create_table("users", "id");
        let driver: BoxedCacheDriver = Box::new(MemoryCacheDriver::new());
        let cache = Arc::new(driver);
        let events = Arc::new(RecordingEventSink::new());
        let conn = Self::connect(&store, &cache, &events, config);
        Self {
            store,
            events,
            cache,
            conn,
        }
    }

    /// Another connection sharing this fixture's store and cache
    pub fn second_connection(&self, config: ConnectionConfig) -> Connection {
        Self::connect(&self.store, &self.cache, &self.events, config)
    }

    fn connect(
        store: &Arc<MemoryStore>,
        cache: &Arc<BoxedCacheDriver>,
        events: &Arc<RecordingEventSink>,
        config: ConnectionConfig,
    ) -> Connection {
        Connection::builder(store.clone(), config)
            .with_event_sink(events.clone())
            .with_cache_driver(cache.clone())
            .build()
            .expect("Failed to build connection")
    }

    /// Insert users `1..=count` named `user<id>`
    pub fn seed_users(&self, count: i64) {
        let rows: Vec<Row> = (1..=count)
            .map(|id| Row::new().with("id", id).with("name", format!("user{}", id)))
            .collect();
        self.conn.insert("users", rows).expect("Failed to seed users");
        self.events.clear();
    }

    pub fn count_users(&self) -> i64 {
        self.conn
            .select_one("SELECT COUNT(*) AS n FROM users", &Params::new())
            .expect("Count query failed")
            .and_then(|row| row.get("n").and_then(|v| v.as_int()))
            .expect("Count query returned no value")
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.names()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
