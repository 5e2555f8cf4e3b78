// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session-not-found recovery
//!
//! The store may garbage collect a session at any time. When an outermost
//! operation fails with session-not-found, the policy repairs the pool
//! according to its [`RecoveryMode`] and replays the operation.

use super::mode::{RecoveryAction, RecoveryMode};
use crate::error::Result;

/// Operations the recovery policy needs from a connection
pub trait RecoveryTarget {
    fn has_session_pool(&self) -> bool;

    fn in_transaction(&self) -> bool;

    fn in_snapshot(&self) -> bool;

    fn disconnect(&self);

    fn reconnect(&self) -> Result<()>;

    fn maintain_pool(&self) -> Result<bool>;

    fn clear_pool(&self) -> Result<()>;
}

/// Replays an operation after repairing the session pool
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionRecoveryPolicy {
    mode: RecoveryMode,
}

impl SessionRecoveryPolicy {
    pub fn new(mode: RecoveryMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RecoveryMode {
        self.mode
    }

    /// Run `f`, recovering from session-not-found failures
    ///
    /// Nothing is recovered without a pool, or when `f` runs nested inside
    /// a transaction or snapshot; the outermost call owns recovery.
    pub fn recover<T, R, F>(&self, target: &R, mut f: F) -> Result<T>
    where
        R: RecoveryTarget + ?Sized,
        F: FnMut() -> Result<T>,
    {
        if !target.has_session_pool() || target.in_transaction() || target.in_snapshot() {
            return f();
        }

        let mut failures = 0;
        loop {
            let err = match f() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_session_not_found() => err,
                Err(err) => return Err(err),
            };
            failures += 1;

            match self.mode.action_for(failures) {
                RecoveryAction::Surface => return Err(err),
                RecoveryAction::MaintainAndRetry => {
                    log::warn!("Session not found, maintaining session pool and retrying: {}", err);
                    target.disconnect();
                    target.maintain_pool()?;
                    target.reconnect()?;
                }
                RecoveryAction::ClearAndRetry => {
                    log::warn!("Session not found again, clearing session pool and retrying: {}", err);
                    target.disconnect();
                    target.clear_pool()?;
                    target.reconnect()?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::{RpcCode, RpcStatus};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MockTarget {
        no_pool: bool,
        in_transaction: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl MockTarget {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }
    }

    impl RecoveryTarget for MockTarget {
        fn has_session_pool(&self) -> bool {
            !self.no_pool
        }

        fn in_transaction(&self) -> bool {
            self.in_transaction
        }

        fn in_snapshot(&self) -> bool {
            false
        }

        fn disconnect(&self) {
            self.calls.lock().push("disconnect");
        }

        fn reconnect(&self) -> Result<()> {
            self.calls.lock().push("reconnect");
            Ok(())
        }

        fn maintain_pool(&self) -> Result<bool> {
            self.calls.lock().push("maintain");
            Ok(true)
        }

        fn clear_pool(&self) -> Result<()> {
            self.calls.lock().push("clear");
            Ok(())
        }
    }

    fn session_lost() -> Error {
        RpcStatus::session_not_found("s1").into()
    }

    /// Fails with session-not-found `failures` times, then succeeds
    fn flaky(failures: u32) -> impl FnMut() -> Result<u32> {
        let mut runs = 0;
        move || {
            runs += 1;
            if runs <= failures {
                Err(session_lost())
            } else {
                Ok(runs)
            }
        }
    }

    #[test]
    fn test_throw_exception_surfaces_immediately() {
        let target = MockTarget::default();
        let policy = SessionRecoveryPolicy::new(RecoveryMode::ThrowException);
        let err = policy.recover(&target, flaky(1)).unwrap_err();
        assert!(err.is_session_not_found());
        assert!(target.calls().is_empty());
    }

    #[test]
    fn test_maintain_retries_once() {
        let target = MockTarget::default();
        let policy = SessionRecoveryPolicy::new(RecoveryMode::MaintainSessionPool);
        assert_eq!(policy.recover(&target, flaky(1)).unwrap(), 2);
        assert_eq!(target.calls(), vec!["disconnect", "maintain", "reconnect"]);

        let target = MockTarget::default();
        assert!(policy.recover(&target, flaky(2)).is_err());
    }

    #[test]
    fn test_clear_escalates_on_second_failure() {
        let target = MockTarget::default();
        let policy = SessionRecoveryPolicy::new(RecoveryMode::ClearSessionPool);
        assert_eq!(policy.recover(&target, flaky(2)).unwrap(), 3);
        assert_eq!(
            target.calls(),
            vec!["disconnect", "maintain", "reconnect", "disconnect", "clear", "reconnect"]
        );

        let target = MockTarget::default();
        assert!(policy
            .recover(&target, flaky(3))
            .unwrap_err()
            .is_session_not_found());
    }

    #[test]
    fn test_no_recovery_without_pool_or_when_nested() {
        let policy = SessionRecoveryPolicy::new(RecoveryMode::ClearSessionPool);

        let target = MockTarget {
            no_pool: true,
            ..MockTarget::default()
        };
        assert!(policy.recover(&target, flaky(1)).is_err());

        let target = MockTarget {
            in_transaction: true,
            ..MockTarget::default()
        };
        assert!(policy.recover(&target, flaky(1)).is_err());
        assert!(target.calls().is_empty());
    }

    #[test]
    fn test_other_errors_pass_through() {
        let target = MockTarget::default();
        let policy = SessionRecoveryPolicy::default();
        let err = policy
            .recover(&target, || -> Result<()> {
                Err(RpcStatus::new(RpcCode::NotFound, "Table not found: t").into())
            })
            .unwrap_err();
        assert!(matches!(err, Error::Rpc(_)));
        assert!(target.calls().is_empty());
    }
}
