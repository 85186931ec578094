//! Tracing utilities for statement and transaction observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! The macros expand to nothing when the feature is disabled in the calling crate.

/// Emit a debug-level tracing event with the statement text and parameter count.
///
/// ```ignore
/// quarry_trace_query!(&statement.sql, statement.params.len());
/// ```
#[macro_export]
macro_rules! quarry_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "quarry.query");
    };
}

/// Emit an info-level tracing event for transaction lifecycle (begin, commit, rollback).
///
/// ```ignore
/// quarry_trace_tx!("begin", "postgres.tokio");
/// quarry_trace_tx!("rollback", "memory");
/// ```
#[macro_export]
macro_rules! quarry_trace_tx {
    ($event:literal, $driver:expr) => {
        #[cfg(feature = "tracing")]
        tracing::info!(event = $event, driver = $driver, "quarry.transaction");
    };
}
