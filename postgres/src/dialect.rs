//! PostgreSQL statement rendering.

use core::fmt::Write;

use quarry_core::sql::{self, SqlDialect, SqlStatement, SqlWriter, quote_ident};
use quarry_core::{
    Command, Comparison, Dialect, Fields, Filter, Operator, QuarryError, Result, Row, UsageError,
    Value,
};

/// Renders commands as PostgreSQL with `$n` placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostgresDialect;

/// Escapes `LIKE` metacharacters so `text` matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl SqlDialect for PostgresDialect {
    fn write_ident(&self, out: &mut String, ident: &str) {
        quote_ident(out, ident, '"');
    }

    fn write_placeholder(&self, out: &mut String, index: usize, _value: &Value) {
        let _ = write!(out, "${index}");
    }

    fn write_comparison(
        &self,
        out: &mut SqlWriter<'_, Self>,
        column: &str,
        comparison: &Comparison,
    ) -> Result<()> {
        if out.common_comparison(column, comparison) {
            return Ok(());
        }

        let operator = comparison.operator();
        if operator == Operator::HasAny {
            let values = comparison.values().unwrap_or_default();
            if values.is_empty() {
                out.push(Self::FALSE);
            } else {
                out.ident(column).push(" && ARRAY[").params(values).push("]");
            }
            return Ok(());
        }

        let text = comparison.value().and_then(Value::as_str).ok_or_else(|| {
            UsageError::MalformedFilter(format!("`{operator}` expects a text operand"))
        })?;
        let like = if operator.is_case_insensitive() {
            "ILIKE"
        } else {
            "LIKE"
        };
        match operator {
            Operator::StartsWith | Operator::IStartsWith => {
                out.binary(column, like, &Value::Text(format!("{}%", escape_like(text))));
            }
            Operator::EndsWith | Operator::IEndsWith => {
                out.binary(column, like, &Value::Text(format!("%{}", escape_like(text))));
            }
            Operator::Contains | Operator::IContains => {
                out.binary(column, like, &Value::Text(format!("%{}%", escape_like(text))));
            }
            Operator::Matches => {
                out.binary(column, "~", &Value::from(text));
            }
            Operator::IMatches => {
                out.binary(column, "~*", &Value::from(text));
            }
            Operator::IpIn => {
                out.push("inet(")
                    .ident(column)
                    .push(") <<= inet(")
                    .param(Value::from(text))
                    .push(")");
            }
            other => {
                return Err(UsageError::MalformedFilter(format!(
                    "`{other}` is not supported by postgres"
                ))
                .into());
            }
        }
        Ok(())
    }
}

impl Dialect for PostgresDialect {
    type Statement = SqlStatement;

    const NAME: &'static str = "postgres";

    fn render(&self, command: &Command<'_>, fields: &Fields) -> Result<SqlStatement> {
        match *command {
            Command::Select { table, query, lock } => {
                let mut statement = sql::select(self, table, query, fields)?;
                if lock {
                    statement.sql.push_str(" FOR UPDATE");
                }
                Ok(statement)
            }
            Command::Count { table, filter } => sql::count(self, table, filter, fields),
            Command::Insert { table, rows, .. } => self.insert(table, rows, fields),
            Command::Update { table, key, row } => self.update(table, key, row, fields),
            Command::Delete { table, filter } => self.delete(table, filter, fields),
        }
    }
}

impl PostgresDialect {
    /// `INSERT INTO t (..) VALUES (..), (..)`
    fn insert(&self, table: &str, rows: &[Row], fields: &Fields) -> Result<SqlStatement> {
        if rows.is_empty() {
            return Err(UsageError::UnsupportedStatement("an insert of zero rows").into());
        }
        let mut out = SqlWriter::new(self);
        out.push("INSERT INTO ")
            .ident(table)
            .push(" (")
            .idents(fields.columns())
            .push(") VALUES ");
        for (i, row) in rows.iter().enumerate() {
            if i > 0 {
                out.push(", ");
            }
            let values = fields.ordered(row)?;
            out.push("(")
                .params(values.into_iter().map(|(_, value)| value))
                .push(")");
        }
        Ok(out.finish())
    }

    /// `UPDATE t SET .. WHERE key = ..`; the identity column is not reassigned.
    fn update(&self, table: &str, key: &str, row: &Row, fields: &Fields) -> Result<SqlStatement> {
        let key_value = row
            .get(key)
            .ok_or_else(|| QuarryError::from(UsageError::MissingField(key.to_owned())))?;
        let key_column = fields.key_column();
        let values = fields.ordered(row)?;
        let assignments: Vec<_> = match values.len() {
            1 => values,
            _ => values
                .into_iter()
                .filter(|(column, _)| *column != key_column)
                .collect(),
        };

        let mut out = SqlWriter::new(self);
        out.push("UPDATE ").ident(table).push(" SET ");
        for (i, (column, value)) in assignments.into_iter().enumerate() {
            if i > 0 {
                out.push(", ");
            }
            out.binary(column, "=", value);
        }
        out.push(" WHERE ").binary(key_column, "=", key_value);
        Ok(out.finish())
    }

    /// `DELETE FROM t [WHERE ..]`
    fn delete(&self, table: &str, filter: &Filter, fields: &Fields) -> Result<SqlStatement> {
        let mut out = SqlWriter::new(self);
        out.push("DELETE FROM ").ident(table);
        out.where_clause(filter, fields)?;
        Ok(out.finish())
    }
}
