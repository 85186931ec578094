//! Async PostgreSQL executor using [`tokio_postgres`].
//!
//! # Example
//!
//! ```no_run
//! use quarry_core::{Repository, lookup};
//! use quarry_postgres::PostgresExecutor;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//! quarry_core::entity!(User { id, name });
//!
//! #[tokio::main]
//! async fn main() -> quarry_core::Result<()> {
//!     let executor = PostgresExecutor::connect("host=localhost user=postgres").await?;
//!     let users = Repository::<User, _>::new(executor.clone(), "users")?;
//!
//!     users.add(&User { id: 1, name: "Bob".into() }).await?;
//!     let bob = users.get(lookup! { id = 1 }).await?;
//!     assert_eq!(bob.name, "Bob");
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quarry_core::sql::SqlStatement;
use quarry_core::{
    Executor, QuarryError, Result, Row, UsageError, quarry_trace_query, quarry_trace_tx,
};
use smallvec::SmallVec;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

use crate::PostgresDialect;
use crate::values::{PgParam, decode_row};

/// Shared handle over one [`tokio_postgres::Client`].
///
/// Clones share the client and its transaction state; everything run through
/// any clone while a transaction is open belongs to that transaction.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    client: Arc<Client>,
    in_transaction: Arc<AtomicBool>,
}

impl PostgresExecutor {
    #[inline]
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            in_transaction: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Connects without TLS and drives the connection on a spawned task.
    ///
    /// **Note**: requires a running tokio runtime.
    pub async fn connect(config: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(config, NoTls)
            .await
            .map_err(map_error)?;
        tokio::spawn(async move {
            if let Err(_e) = connection.await {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %_e, "postgres connection closed with an error");
            }
        });
        Ok(Self::new(client))
    }

    #[inline]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Maps driver errors; SQLSTATE class 23 (integrity constraint violation)
/// becomes [`QuarryError::Conflict`].
pub(crate) fn map_error(error: tokio_postgres::Error) -> QuarryError {
    match error.code() {
        Some(code) if code.code().starts_with("23") => QuarryError::Conflict(
            error
                .as_db_error()
                .map_or_else(|| error.to_string(), |db| db.message().to_owned()),
        ),
        _ => QuarryError::Execution(error.to_string()),
    }
}

fn bind(statement: &SqlStatement) -> SmallVec<[PgParam<'_>; 8]> {
    statement.params.iter().map(PgParam).collect()
}

impl Executor for PostgresExecutor {
    type Dialect = PostgresDialect;

    #[inline]
    fn dialect(&self) -> &PostgresDialect {
        &PostgresDialect
    }

    async fn fetch(&self, statement: &SqlStatement) -> Result<Vec<Row>> {
        quarry_trace_query!(&statement.sql, statement.params.len());
        let params = bind(statement);
        let refs: SmallVec<[&(dyn ToSql + Sync); 8]> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows = self
            .client
            .query(statement.sql.as_str(), &refs)
            .await
            .map_err(map_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, statement: &SqlStatement) -> Result<u64> {
        quarry_trace_query!(&statement.sql, statement.params.len());
        let params = bind(statement);
        let refs: SmallVec<[&(dyn ToSql + Sync); 8]> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.client
            .execute(statement.sql.as_str(), &refs)
            .await
            .map_err(map_error)
    }

    async fn begin(&self) -> Result<()> {
        if self.in_transaction.swap(true, Ordering::AcqRel) {
            return Err(UsageError::NestedTransaction.into());
        }
        if let Err(e) = self.client.batch_execute("BEGIN").await {
            self.in_transaction.store(false, Ordering::Release);
            return Err(map_error(e));
        }
        quarry_trace_tx!("begin", "postgres.tokio");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let result = self.client.batch_execute("COMMIT").await.map_err(map_error);
        self.in_transaction.store(false, Ordering::Release);
        quarry_trace_tx!("commit", "postgres.tokio");
        result
    }

    async fn rollback(&self) -> Result<()> {
        let result = self
            .client
            .batch_execute("ROLLBACK")
            .await
            .map_err(map_error);
        self.in_transaction.store(false, Ordering::Release);
        quarry_trace_tx!("rollback", "postgres.tokio");
        result
    }
}
