//! ClickHouse executor over the HTTP interface.
//!
//! Statements are POSTed as the request body; bind values travel as
//! `param_pN` query parameters so they are never spliced into SQL text.
//! Row-returning statements are read back in `FORMAT JSON`.
//!
//! ClickHouse has no multi-statement transactions. `begin`, `commit` and
//! `rollback` only track scope so misuse is still reported, and
//! [`Executor::supports_transactions`] returns `false`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quarry_core::sql::SqlStatement;
use quarry_core::{
    Executor, QuarryError, Result, Row, UsageError, quarry_trace_query, quarry_trace_tx,
};
use reqwest::{Client, Response};

use crate::values::{encode_param, json};
use crate::{ClickHouseConfig, ClickHouseDialect};

const SUMMARY_HEADER: &str = "x-clickhouse-summary";

#[derive(Debug, Clone)]
pub struct ClickHouseExecutor {
    client: Client,
    config: Arc<ClickHouseConfig>,
    in_transaction: Arc<AtomicBool>,
}

impl ClickHouseExecutor {
    pub fn new(config: ClickHouseConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Uses a preconfigured [`reqwest::Client`] (timeouts, proxies, TLS roots).
    pub fn with_client(client: Client, config: ClickHouseConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            in_transaction: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    fn settings(&self, statement: &SqlStatement) -> Vec<(String, String)> {
        let mut query = Vec::with_capacity(statement.params.len() + 4);
        if let Some(database) = &self.config.database {
            query.push(("database".to_owned(), database.clone()));
        }
        query.push((
            "output_format_json_quote_64bit_integers".to_owned(),
            "0".to_owned(),
        ));
        query.push(("date_time_output_format".to_owned(), "iso".to_owned()));
        if self.config.mutations_sync {
            query.push(("mutations_sync".to_owned(), "1".to_owned()));
        }
        for (i, value) in statement.params.iter().enumerate() {
            query.push((
                format!("param_{}", ClickHouseDialect::param_name(i + 1)),
                encode_param(value),
            ));
        }
        query
    }

    async fn send(&self, statement: &SqlStatement, sql: String) -> Result<Response> {
        quarry_trace_query!(&statement.sql, statement.params.len());
        let mut request = self
            .client
            .post(self.config.url.as_str())
            .query(&self.settings(statement))
            .body(sql);
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_deref());
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(QuarryError::Execution(format!(
            "clickhouse returned {status}: {}",
            body.trim()
        )))
    }
}

fn transport_error(error: reqwest::Error) -> QuarryError {
    QuarryError::Execution(format!("clickhouse request failed: {error}"))
}

/// `written_rows` from the progress summary header; 0 when absent.
fn written_rows(response: &Response) -> u64 {
    response
        .headers()
        .get(SUMMARY_HEADER)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| serde_json::from_str::<serde_json::Value>(header).ok())
        .and_then(|summary| match summary.get("written_rows")? {
            serde_json::Value::String(s) => s.parse().ok(),
            other => other.as_u64(),
        })
        .unwrap_or(0)
}

impl Executor for ClickHouseExecutor {
    type Dialect = ClickHouseDialect;

    #[inline]
    fn dialect(&self) -> &ClickHouseDialect {
        &ClickHouseDialect
    }

    async fn fetch(&self, statement: &SqlStatement) -> Result<Vec<Row>> {
        let sql = format!("{} FORMAT JSON", statement.sql);
        let response = self.send(statement, sql).await?;
        let body = response.bytes().await.map_err(transport_error)?;
        json::decode(&body)
    }

    /// Inserts report the rows written. Mutations run asynchronously on the
    /// server and report 0 even when they change rows.
    async fn execute(&self, statement: &SqlStatement) -> Result<u64> {
        let response = self.send(statement, statement.sql.clone()).await?;
        Ok(written_rows(&response))
    }

    async fn begin(&self) -> Result<()> {
        if self.in_transaction.swap(true, Ordering::AcqRel) {
            return Err(UsageError::NestedTransaction.into());
        }
        quarry_trace_tx!("begin", "clickhouse.http");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.in_transaction.store(false, Ordering::Release);
        quarry_trace_tx!("commit", "clickhouse.http");
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.in_transaction.store(false, Ordering::Release);
        quarry_trace_tx!("rollback", "clickhouse.http");
        Ok(())
    }

    fn supports_transactions(&self) -> bool {
        false
    }
}
