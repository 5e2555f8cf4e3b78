// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session-not-found recovery mode

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a connection reacts when the store reports that its session is gone
///
/// # Modes
///
/// - **ThrowException**: the error reaches the caller untouched.
/// - **MaintainSessionPool**: prune dead sessions from the pool and retry once.
/// - **ClearSessionPool**: like `MaintainSessionPool`, and if the retry fails
///   the same way, delete every pooled session and retry one last time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum RecoveryMode {
    ThrowException,
    MaintainSessionPool,
    #[default]
    ClearSessionPool,
}

/// What to do after the n-th consecutive session-not-found failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Surface,
    MaintainAndRetry,
    ClearAndRetry,
}

impl RecoveryMode {
    /// Decide the action for the `failures`-th failure (1-based)
    pub fn action_for(&self, failures: u32) -> RecoveryAction {
        match (self, failures) {
            (RecoveryMode::MaintainSessionPool, 1) | (RecoveryMode::ClearSessionPool, 1) => {
                RecoveryAction::MaintainAndRetry
            }
            (RecoveryMode::ClearSessionPool, 2) => RecoveryAction::ClearAndRetry,
            _ => RecoveryAction::Surface,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryMode::ThrowException => "THROW_EXCEPTION",
            RecoveryMode::MaintainSessionPool => "MAINTAIN_SESSION_POOL",
            RecoveryMode::ClearSessionPool => "CLEAR_SESSION_POOL",
        }
    }
}

impl FromStr for RecoveryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "THROW_EXCEPTION" => Ok(RecoveryMode::ThrowException),
            "MAINTAIN_SESSION_POOL" => Ok(RecoveryMode::MaintainSessionPool),
            "CLEAR_SESSION_POOL" => Ok(RecoveryMode::ClearSessionPool),
            _ => Err(Error::InvalidArgument(format!(
                "Unknown session not found mode: {}. Valid options: THROW_EXCEPTION, MAINTAIN_SESSION_POOL, CLEAR_SESSION_POOL",
                s
            ))),
        }
    }
}

impl TryFrom<String> for RecoveryMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(RecoveryMode::default(), RecoveryMode::ClearSessionPool);
    }

    #[test]
    fn test_parsing() {
        assert_eq!(
            "throw_exception".parse::<RecoveryMode>().unwrap(),
            RecoveryMode::ThrowException
        );
        assert_eq!(
            "maintain-session-pool".parse::<RecoveryMode>().unwrap(),
            RecoveryMode::MaintainSessionPool
        );
        assert_eq!(
            "CLEAR_SESSION_POOL".parse::<RecoveryMode>().unwrap(),
            RecoveryMode::ClearSessionPool
        );
        assert!(matches!(
            "retry".parse::<RecoveryMode>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_action_table() {
        use RecoveryAction::*;
        assert_eq!(RecoveryMode::ThrowException.action_for(1), Surface);

        assert_eq!(RecoveryMode::MaintainSessionPool.action_for(1), MaintainAndRetry);
        assert_eq!(RecoveryMode::MaintainSessionPool.action_for(2), Surface);

        assert_eq!(RecoveryMode::ClearSessionPool.action_for(1), MaintainAndRetry);
        assert_eq!(RecoveryMode::ClearSessionPool.action_for(2), ClearAndRetry);
        assert_eq!(RecoveryMode::ClearSessionPool.action_for(3), Surface);
    }

    #[test]
    fn test_serde_uses_screaming_names() {
        let json = serde_json::to_string(&RecoveryMode::MaintainSessionPool).unwrap();
        assert_eq!(json, "\"MAINTAIN_SESSION_POOL\"");
        let mode: RecoveryMode = serde_json::from_str("\"clear-session-pool\"").unwrap();
        assert_eq!(mode, RecoveryMode::ClearSessionPool);
    }
}
