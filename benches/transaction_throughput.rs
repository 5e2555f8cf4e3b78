// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Benchmark for transaction throughput over a pooled connection
//!
//! Measures committed transactions, single-use mutations and strong reads
//! against the in-memory store, then the cost of replaying aborted commits.

use spanlite::{
    CacheConfig, CacheType, Connection, ConnectionConfig, MemoryStore, Params, Row,
    SessionPoolConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

const ITERATIONS: i64 = 1000;

fn report(label: &str, unit: &str, count: i64, duration: Duration) {
    println!("  Iterations: {}", count);
    println!("  Time: {:?}", duration);
    println!(
        "  Throughput: {:.0} {}/sec",
        count as f64 / duration.as_secs_f64(),
        unit
    );
    println!("  ({})", label);
    println!();
}

fn main() {
    let _ = env_logger::builder().is_test(true).try_init();
    println!("=== Transaction Throughput Benchmark ===\n");

    // Setup - sled-backed session cache, like a deployed process would use
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new("projects/bench/instances/bench/databases/bench"));
    store.create_table("accounts", "id");

    let config = ConnectionConfig::new("bench")
        .with_session_pool(SessionPoolConfig::default().with_min_sessions(4))
        .with_cache(
            CacheConfig::default()
                .with_cache_type(CacheType::Sled)
                .with_path(temp_dir.path().join("cache")),
        );
    let conn = Connection::new(store.clone(), config).expect("Failed to open connection");
    conn.warmup_pool().expect("Failed to warm up session pool");

    println!("📊 Read/write transactions:");
    let start = Instant::now();
    for id in 0..ITERATIONS {
        conn.run_in_transaction(|tx| {
            tx.insert("accounts", Row::new().with("id", id).with("balance", 100i64))
        })
        .expect("Transaction failed");
    }
    let txn_duration = start.elapsed();
    report("begin, mutate, commit", "txns", ITERATIONS, txn_duration);

    println!("📊 Single-use mutations:");
    let start = Instant::now();
    for id in 0..ITERATIONS {
        conn.update("accounts", Row::new().with("id", id).with("balance", 50i64))
            .expect("Mutation failed");
    }
    let mutation_duration = start.elapsed();
    report("batch write without a transaction", "mutations", ITERATIONS, mutation_duration);

    println!("📊 Strong point reads:");
    let start = Instant::now();
    for id in 0..ITERATIONS {
        let _ = conn
            .select_one(
                "SELECT * FROM accounts WHERE id = @id",
                &Params::new().bind("id", id),
            )
            .expect("Read failed");
    }
    let read_duration = start.elapsed();
    report("single-use strong read", "reads", ITERATIONS, read_duration);

    println!("📊 Aborted commits (one replay each):");
    let replays = ITERATIONS / 10;
    let start = Instant::now();
    for id in 0..replays {
        store.inject_abort(1);
        conn.run_in_transaction(|tx| {
            tx.update("accounts", Row::new().with("id", id).with("balance", 0i64))
        })
        .expect("Replayed transaction failed");
    }
    let replay_duration = start.elapsed();
    report("abort, roll back, replay, commit", "txns", replays, replay_duration);

    conn.close().expect("Failed to close connection");

    // Summary
    println!("=== Summary ===");
    println!("  Sessions created: {}", store.call_count("create_session"));
    println!("  Commits issued:   {}", store.call_count("commit"));
    println!("  Rollbacks issued: {}", store.call_count("rollback"));
}
