// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session management
//!
//! - [`SessionPool`]: leases, warmup, maintenance and clearing of remote sessions
//! - [`SessionSource`]: pooled or per-operation sessions for a connection
//! - [`SessionRecoveryPolicy`]: replays operations that lost their session

pub mod mode;
pub mod models;
pub mod pool;
pub mod recovery;
pub mod source;

pub use mode::{RecoveryAction, RecoveryMode};
pub use models::{SessionHandle, SessionInfo};
pub use pool::{PoolStats, SessionPool};
pub use recovery::{RecoveryTarget, SessionRecoveryPolicy};
pub use source::SessionSource;
