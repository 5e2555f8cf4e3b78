// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read timestamp bounds

use crate::error::{Error, Result};
use crate::store::ReadOnlyOptions;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Which version of the data a read-only operation observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampBound {
    /// Latest committed data
    #[default]
    Strong,
    /// Data exactly this old
    ExactStaleness(Duration),
    /// Data at most this old; the store picks the timestamp
    MaxStaleness(Duration),
    /// Data as of this timestamp
    ReadTimestamp(DateTime<Utc>),
    /// Data at least as new as this timestamp; the store picks the timestamp
    MinReadTimestamp(DateTime<Utc>),
}

impl TimestampBound {
    /// Bounds the store can only honour for one-shot reads
    pub fn is_single_use_only(&self) -> bool {
        matches!(
            self,
            TimestampBound::MaxStaleness(_) | TimestampBound::MinReadTimestamp(_)
        )
    }

    pub fn to_read_only_options(&self) -> ReadOnlyOptions {
        let mut options = ReadOnlyOptions {
            return_read_timestamp: true,
            ..ReadOnlyOptions::default()
        };
        match *self {
            TimestampBound::Strong => {}
            TimestampBound::ExactStaleness(d) => options.exact_staleness = Some(d),
            TimestampBound::MaxStaleness(d) => options.max_staleness = Some(d),
            TimestampBound::ReadTimestamp(ts) => options.read_timestamp = Some(ts),
            TimestampBound::MinReadTimestamp(ts) => options.min_read_timestamp = Some(ts),
        }
        options
    }

    /// Options for a multi-read snapshot; bounded staleness is rejected
    pub fn snapshot_options(&self) -> Result<ReadOnlyOptions> {
        if self.is_single_use_only() {
            return Err(Error::InvalidArgument(format!(
                "{:?} can only be used for single-use reads, not snapshots",
                self
            )));
        }
        Ok(self.to_read_only_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_is_default() {
        assert_eq!(TimestampBound::default(), TimestampBound::Strong);
        assert!(TimestampBound::Strong.to_read_only_options().is_strong());
    }

    #[test]
    fn test_options_mapping() {
        let ten = Duration::from_secs(10);
        assert_eq!(
            TimestampBound::ExactStaleness(ten).to_read_only_options().exact_staleness,
            Some(ten)
        );
        assert_eq!(
            TimestampBound::MaxStaleness(ten).to_read_only_options().max_staleness,
            Some(ten)
        );
        let now = Utc::now();
        assert_eq!(
            TimestampBound::MinReadTimestamp(now)
                .to_read_only_options()
                .min_read_timestamp,
            Some(now)
        );
    }

    #[test]
    fn test_snapshot_rejects_bounded_staleness() {
        let now = Utc::now();
        assert!(TimestampBound::ReadTimestamp(now).snapshot_options().is_ok());
        assert!(TimestampBound::ExactStaleness(Duration::from_secs(1))
            .snapshot_options()
            .is_ok());
        assert!(matches!(
            TimestampBound::MaxStaleness(Duration::from_secs(1)).snapshot_options(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            TimestampBound::MinReadTimestamp(now).snapshot_options(),
            Err(Error::InvalidArgument(_))
        ));
    }
}
