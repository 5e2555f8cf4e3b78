// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Mutations: normalized table writes and deletes

pub mod batcher;
pub mod types;

pub use batcher::MutationBatcher;
pub use types::{KeyRange, KeySet, MutationKind, MutationPayload, MutationSet, RowSet};
