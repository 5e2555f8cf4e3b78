// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read/write transactions with retry, virtual nesting and commit hooks

pub mod context;
pub mod coordinator;
pub mod state;

pub use context::TransactionContext;
pub use coordinator::TransactionCoordinator;
pub use state::{ExecutionScope, TransactionHandle, TransactionStatus};
