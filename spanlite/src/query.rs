// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement execution helpers shared by every read and DML path

use crate::error::{Error, Result};
use crate::events::{Event, EventSink};
use crate::store::RpcResult;
use crate::value::Params;
use std::time::Instant;

/// Run one statement RPC
///
/// Success fires `QueryExecuted`; failure is wrapped with the SQL text and
/// its parameters.
pub(crate) fn execute_statement<T>(
    events: &dyn EventSink,
    sql: &str,
    params: &Params,
    rpc: impl FnOnce() -> RpcResult<T>,
) -> Result<T> {
    let start = Instant::now();
    match rpc() {
        Ok(value) => {
            events.dispatch(&Event::QueryExecuted {
                sql: sql.to_string(),
                params: params.clone(),
                elapsed: start.elapsed(),
            });
            Ok(value)
        }
        Err(status) => Err(Error::query(sql, params, status.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::store::RpcStatus;

    #[test]
    fn test_success_fires_query_executed() {
        let sink = RecordingEventSink::new();
        let params = Params::new().bind("id", 1i64);
        let n = execute_statement(&sink, "DELETE FROM t WHERE id = @id", &params, || Ok(1i64))
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(sink.names(), vec!["QueryExecuted"]);
    }

    #[test]
    fn test_failure_is_wrapped() {
        let sink = RecordingEventSink::new();
        let err = execute_statement::<()>(&sink, "SELECT * FROM t", &Params::new(), || {
            Err(RpcStatus::session_not_found("s1"))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
        assert!(err.is_session_not_found());
        assert!(sink.events().is_empty());
    }
}
