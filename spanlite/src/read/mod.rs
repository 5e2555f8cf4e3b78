// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read-only access: timestamp bounds and snapshots

pub mod snapshot;
pub mod timestamp_bound;

pub use snapshot::{SnapshotContext, SnapshotReader};
pub use timestamp_bound::TimestampBound;
