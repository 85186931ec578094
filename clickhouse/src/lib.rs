//! ClickHouse support for quarry
//!
//! [`ClickHouseDialect`] renders repository commands with typed server-side
//! parameters (`{p1:Int64}`). Writes map onto ClickHouse's model: inserts are
//! `INSERT .. SELECT`, updates and deletes are `ALTER TABLE` mutations.
//!
//! With the `http` feature, [`ClickHouseExecutor`] runs statements over the
//! HTTP interface. ClickHouse has no transactions, so the executor reports
//! `supports_transactions() == false` and a
//! [`TransactionManager`](quarry_core::TransactionManager) scope over it
//! cannot undo writes.

#[cfg(feature = "http")]
mod config;
mod dialect;
#[cfg(feature = "http")]
mod executor;
pub mod values;

#[cfg(feature = "http")]
pub use config::ClickHouseConfig;
pub use dialect::ClickHouseDialect;
#[cfg(feature = "http")]
pub use executor::ClickHouseExecutor;
