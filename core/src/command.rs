//! Backend-neutral descriptions of what a repository wants done.
//!
//! Commands are expressed in field space; a [`Dialect`](crate::Dialect)
//! resolves fields to columns while rendering.

use crate::filter::Filter;
use crate::query::Query;
use crate::row::Row;

#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    /// Read the declared fields of every record matching `query`.
    Select {
        table: &'a str,
        query: &'a Query,
        /// Lock the selected rows until the surrounding transaction ends.
        lock: bool,
    },
    /// Count the records matching `filter`, returned as a single `count` column.
    Count { table: &'a str, filter: &'a Filter },
    /// Insert one or more complete, field-keyed rows.
    Insert {
        table: &'a str,
        key: &'a str,
        rows: &'a [Row],
    },
    /// Replace the record whose `key` field equals the row's key value.
    Update {
        table: &'a str,
        key: &'a str,
        row: &'a Row,
    },
    /// Remove every record matching `filter`.
    Delete { table: &'a str, filter: &'a Filter },
}

impl<'a> Command<'a> {
    pub const fn table(&self) -> &'a str {
        match self {
            Self::Select { table, .. }
            | Self::Count { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. } => *table,
        }
    }

    /// `true` for commands answered with rows rather than an affected-row count.
    pub const fn returns_rows(&self) -> bool {
        matches!(self, Self::Select { .. } | Self::Count { .. })
    }
}
