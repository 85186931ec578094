//! PostgreSQL support for quarry
//!
//! [`PostgresDialect`] renders repository commands as parameterized SQL with
//! `$n` placeholders. With the `tokio-postgres` feature, [`PostgresExecutor`]
//! runs them on a shared [`tokio_postgres::Client`] and provides real
//! transactions.

mod dialect;
#[cfg(feature = "tokio-postgres")]
mod executor;
#[cfg(feature = "tokio-postgres")]
pub mod values;

pub use dialect::{PostgresDialect, escape_like};
#[cfg(feature = "tokio-postgres")]
pub use executor::PostgresExecutor;

#[cfg(feature = "tokio-postgres")]
pub use tokio_postgres;
