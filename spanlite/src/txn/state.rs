// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction state
//!
//! This module defines the remote transaction handle and its lifecycle.

use crate::session::SessionHandle;
use crate::store::TransactionId;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Transaction lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Remote transaction is open and can run statements
    Active,
    /// Commit was acknowledged by the store
    Committed,
    /// Transaction was rolled back or discarded
    RolledBack,
}

/// What the connection is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionScope {
    Idle,
    Transaction,
    Snapshot,
}

/// The real (level 1) remote transaction of a connection
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    pub session: SessionHandle,
    pub id: TransactionId,
    pub status: TransactionStatus,
    pub started_at: Instant,
}

impl TransactionHandle {
    pub fn new(session: SessionHandle, id: TransactionId) -> Self {
        Self {
            session,
            id,
            status: TransactionStatus::Active,
            started_at: Instant::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    pub fn mark_committed(&mut self) {
        self.status = TransactionStatus::Committed;
    }

    pub fn mark_rolled_back(&mut self) {
        self.status = TransactionStatus::RolledBack;
    }
}
