//! The seams between repositories and backends.
//!
//! A [`Dialect`] renders [`Command`]s into backend-native statements; an
//! [`Executor`] runs them. Each backend crate provides one of each.

use core::fmt::Debug;
use core::future::Future;

use crate::command::Command;
use crate::error::Result;
use crate::row::Row;
use crate::schema::Fields;

/// Translates commands into a backend's native statement form.
pub trait Dialect: Send + Sync {
    type Statement: Debug + Send + Sync;

    /// Short backend name used in logs.
    const NAME: &'static str;

    /// Renders `command`, resolving field names through `fields`.
    ///
    /// Unknown fields fail with [`UsageError::UnknownField`](crate::UsageError::UnknownField).
    fn render(&self, command: &Command<'_>, fields: &Fields) -> Result<Self::Statement>;
}

/// Statement type of an executor's dialect.
pub type StatementOf<X> = <<X as Executor>::Dialect as Dialect>::Statement;

/// A shared handle able to run statements of one dialect.
///
/// Handles are cheap to clone and may back many repositories at once. A handle
/// processes one logical operation at a time: driving it from several tasks
/// concurrently without external coordination is the caller's responsibility,
/// and transactions begun on a handle apply to everything run through it.
pub trait Executor: Send + Sync {
    type Dialect: Dialect;

    fn dialect(&self) -> &Self::Dialect;

    /// Runs a row-returning statement. Rows are keyed by storage column.
    fn fetch(&self, statement: &StatementOf<Self>) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Runs a write statement, returning the number of affected rows when the
    /// backend reports one.
    fn execute(&self, statement: &StatementOf<Self>) -> impl Future<Output = Result<u64>> + Send;

    fn begin(&self) -> impl Future<Output = Result<()>> + Send;

    fn commit(&self) -> impl Future<Output = Result<()>> + Send;

    fn rollback(&self) -> impl Future<Output = Result<()>> + Send;

    /// `false` when `begin`/`commit`/`rollback` cannot provide atomicity.
    fn supports_transactions(&self) -> bool {
        true
    }
}
