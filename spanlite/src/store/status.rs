// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! RPC status codes reported by the remote store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker the store puts in the message of a `NotFound` status when the
/// session itself (not a row or table) is gone.
pub const SESSION_NOT_FOUND_MARKER: &str = "Session not found";

/// Canonical status codes of the store's RPC layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RpcCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
}

impl RpcCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcCode::Cancelled => "CANCELLED",
            RpcCode::Unknown => "UNKNOWN",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcCode::NotFound => "NOT_FOUND",
            RpcCode::AlreadyExists => "ALREADY_EXISTS",
            RpcCode::PermissionDenied => "PERMISSION_DENIED",
            RpcCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            RpcCode::FailedPrecondition => "FAILED_PRECONDITION",
            RpcCode::Aborted => "ABORTED",
            RpcCode::OutOfRange => "OUT_OF_RANGE",
            RpcCode::Unimplemented => "UNIMPLEMENTED",
            RpcCode::Internal => "INTERNAL",
            RpcCode::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed RPC as reported by the store client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(RpcCode::Aborted, message)
    }

    /// Status the store returns for a session that expired or was deleted
    pub fn session_not_found(session_name: &str) -> Self {
        Self::new(
            RpcCode::NotFound,
            format!(
                "{}: {} (resource_type: type.googleapis.com/Session)",
                SESSION_NOT_FOUND_MARKER, session_name
            ),
        )
    }

    pub fn is_aborted(&self) -> bool {
        self.code == RpcCode::Aborted
    }

    /// Only a `NotFound` carrying the session marker counts; a missing
    /// table or row is an ordinary failure.
    pub fn is_session_not_found(&self) -> bool {
        self.code == RpcCode::NotFound && self.message.contains(SESSION_NOT_FOUND_MARKER)
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcStatus {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_detection() {
        let status = RpcStatus::session_not_found("projects/p/instances/i/databases/d/sessions/s1");
        assert!(status.is_session_not_found());
        assert!(!status.is_aborted());
    }

    #[test]
    fn test_generic_not_found_is_not_session_not_found() {
        let status = RpcStatus::new(RpcCode::NotFound, "Table not found: users");
        assert!(!status.is_session_not_found());
    }

    #[test]
    fn test_marker_requires_not_found_code() {
        let status = RpcStatus::new(RpcCode::Internal, "Session not found: s1");
        assert!(!status.is_session_not_found());
    }

    #[test]
    fn test_display() {
        let status = RpcStatus::aborted("Transaction was aborted.");
        assert_eq!(status.to_string(), "ABORTED: Transaction was aborted.");
    }
}
