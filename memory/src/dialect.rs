use core::fmt;

use quarry_core::{
    Command, Dialect, Direction, FieldResolver, Fields, Filter, Result, Row, UsageError,
};

use crate::predicate::Predicate;

/// Compiles commands into [`MemoryStatement`]s: field names become storage
/// columns and text patterns become compiled regexes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryDialect;

/// A command resolved against its table's columns.
#[derive(Debug, Clone)]
pub enum MemoryStatement {
    Select {
        table: String,
        columns: Vec<&'static str>,
        predicate: Predicate,
        order: Vec<(&'static str, Direction)>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Count {
        table: String,
        predicate: Predicate,
    },
    Insert {
        table: String,
        key: &'static str,
        rows: Vec<Row>,
    },
    Update {
        table: String,
        key: &'static str,
        row: Row,
    },
    Delete {
        table: String,
        predicate: Predicate,
    },
}

impl MemoryStatement {
    pub fn table(&self) -> &str {
        match self {
            Self::Select { table, .. }
            | Self::Count { table, .. }
            | Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. } => table,
        }
    }

    const fn verb(&self) -> &'static str {
        match self {
            Self::Select { .. } => "select",
            Self::Count { .. } => "count",
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }

    /// Number of values the statement carries, for logging.
    pub(crate) fn value_count(&self) -> usize {
        match self {
            Self::Insert { rows, .. } => rows.iter().map(Row::len).sum(),
            Self::Update { row, .. } => row.len(),
            _ => 0,
        }
    }
}

impl fmt::Display for MemoryStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.table())
    }
}

fn predicate(filter: &Filter, fields: &Fields) -> Result<Predicate> {
    Predicate::compile(&filter.resolve(fields)?)
}

impl Dialect for MemoryDialect {
    type Statement = MemoryStatement;

    const NAME: &'static str = "memory";

    fn render(&self, command: &Command<'_>, fields: &Fields) -> Result<MemoryStatement> {
        let table = command.table().to_owned();
        Ok(match *command {
            Command::Select { query, .. } => {
                let order = query
                    .order
                    .iter()
                    .map(|key| -> Result<(&'static str, Direction)> {
                        let column = FieldResolver::column(fields, &key.field)?;
                        let column = fields
                            .columns()
                            .find(|known| *known == column)
                            .ok_or_else(|| UsageError::UnknownField(key.field.clone()))?;
                        Ok((column, key.direction))
                    })
                    .collect::<Result<_>>()?;
                MemoryStatement::Select {
                    table,
                    columns: fields.columns().collect(),
                    predicate: predicate(&query.filter, fields)?,
                    order,
                    limit: query.limit,
                    offset: query.offset,
                }
            }
            Command::Count { filter, .. } => MemoryStatement::Count {
                table,
                predicate: predicate(filter, fields)?,
            },
            Command::Insert { rows, .. } => {
                if rows.is_empty() {
                    return Err(UsageError::UnsupportedStatement("an insert of zero rows").into());
                }
                MemoryStatement::Insert {
                    table,
                    key: fields.key_column(),
                    rows: rows
                        .iter()
                        .map(|row| fields.to_columns(row))
                        .collect::<Result<_>>()?,
                }
            }
            Command::Update { row, .. } => MemoryStatement::Update {
                table,
                key: fields.key_column(),
                row: fields.to_columns(row)?,
            },
            Command::Delete { filter, .. } => MemoryStatement::Delete {
                table,
                predicate: predicate(filter, fields)?,
            },
        })
    }
}
