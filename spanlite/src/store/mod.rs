// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Remote store interface
//!
//! - [`StoreClient`]: the RPC surface the connection drives
//! - [`RpcStatus`]: failures reported by the store
//! - [`MemoryStore`]: an in-process emulator of the store

pub mod client;
pub mod memory;
pub mod status;

pub use client::{
    CommitResponse, ReadContext, ReadOnlyOptions, RequestOptions, RpcResult, SnapshotId,
    StoreClient, TransactionId,
};
pub use memory::MemoryStore;
pub use status::{RpcCode, RpcStatus, SESSION_NOT_FOUND_MARKER};
