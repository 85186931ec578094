//! ClickHouse statement rendering.
//!
//! Values travel as typed server-side parameters (`{p1:Int64}`). Updates and
//! deletes are `ALTER TABLE` mutations; inserts use `INSERT .. SELECT` so the
//! same parameter syntax applies to every statement.

use quarry_core::sql::{self, SqlDialect, SqlStatement, SqlWriter, quote_ident};
use quarry_core::{
    Command, Comparison, Dialect, Fields, Filter, Operator, QuarryError, Result, Row, UsageError,
    Value,
};

use crate::values::type_name;

/// Renders commands as ClickHouse SQL with typed `{pN:Type}` parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickHouseDialect;

impl ClickHouseDialect {
    /// Name under which the `index`-th parameter is sent.
    #[inline]
    pub fn param_name(index: usize) -> String {
        format!("p{index}")
    }
}

impl SqlDialect for ClickHouseDialect {
    const TRUE: &'static str = "1";
    const FALSE: &'static str = "0";

    fn write_ident(&self, out: &mut String, ident: &str) {
        quote_ident(out, ident, '`');
    }

    fn write_placeholder(&self, out: &mut String, index: usize, value: &Value) {
        out.push('{');
        out.push_str(&Self::param_name(index));
        out.push(':');
        out.push_str(&type_name(value));
        out.push('}');
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
                out.push("hasAny(")
                    .ident(column)
                    .push(", [")
                    .params(values)
                    .push("])");
            }
            return Ok(());
        }

        let value = comparison
            .value()
            .filter(|value| value.as_str().is_some())
            .ok_or_else(|| {
                UsageError::MalformedFilter(format!("`{operator}` expects a text operand"))
            })?
            .clone();
        match operator {
            Operator::StartsWith => call(out, "startsWith", column, value),
            Operator::EndsWith => call(out, "endsWith", column, value),
            Operator::IStartsWith => lowered(out, "startsWith", column, value),
            Operator::IEndsWith => lowered(out, "endsWith", column, value),
            Operator::Contains => {
                call(out, "position", column, value);
                out.push(" > 0");
            }
            Operator::IContains => {
                call(out, "positionCaseInsensitive", column, value);
                out.push(" > 0");
            }
            Operator::Matches => call(out, "match", column, value),
            Operator::IMatches => {
                out.push("match(")
                    .ident(column)
                    .push(", concat('(?i)', ")
                    .param(value)
                    .push("))");
            }
            Operator::IpIn => call(out, "isIPAddressInRange", column, value),
            other => {
                return Err(UsageError::MalformedFilter(format!(
                    "`{other}` is not supported by clickhouse"
                ))
                .into());
            }
        }
        Ok(())
    }
}

/// `function(column, param)`
fn call(out: &mut SqlWriter<'_, ClickHouseDialect>, function: &str, column: &str, value: Value) {
    out.push(function)
        .push("(")
        .ident(column)
        .push(", ")
        .param(value)
        .push(")");
}

/// `function(lower(column), lower(param))`
fn lowered(out: &mut SqlWriter<'_, ClickHouseDialect>, function: &str, column: &str, value: Value) {
    out.push(function)
        .push("(lower(")
        .ident(column)
        .push("), lower(")
        .param(value)
        .push("))");
}

impl Dialect for ClickHouseDialect {
    type Statement = SqlStatement;

    const NAME: &'static str = "clickhouse";

    fn render(&self, command: &Command<'_>, fields: &Fields) -> Result<SqlStatement> {
        match *command {
            // No row locks in ClickHouse; `lock` is ignored
            Command::Select { table, query, .. } => sql::select(self, table, query, fields),
            Command::Count { table, filter } => sql::count(self, table, filter, fields),
            Command::Insert { table, rows, .. } => self.insert(table, rows, fields),
            Command::Update { table, key, row } => self.update(table, key, row, fields),
            Command::Delete { table, filter } => self.delete(table, filter, fields),
        }
    }
}

impl ClickHouseDialect {
    /// `INSERT INTO t (..) SELECT .. UNION ALL SELECT ..`
    fn insert(&self, table: &str, rows: &[Row], fields: &Fields) -> Result<SqlStatement> {
        if rows.is_empty() {
            return Err(UsageError::UnsupportedStatement("an insert of zero rows").into());
        }
        let mut out = SqlWriter::new(self);
        out.push("INSERT INTO ")
            .ident(table)
            .push(" (")
            .idents(fields.columns())
            .push(")");
        for (i, row) in rows.iter().enumerate() {
            out.push(if i == 0 { " SELECT " } else { " UNION ALL SELECT " });
            let values = fields.ordered(row)?;
            out.params(values.into_iter().map(|(_, value)| value));
        }
        Ok(out.finish())
    }

    /// `ALTER TABLE t UPDATE .. WHERE key = ..`; ClickHouse cannot reassign key columns.
    fn update(&self, table: &str, key: &str, row: &Row, fields: &Fields) -> Result<SqlStatement> {
        let key_value = row
            .get(key)
            .ok_or_else(|| QuarryError::from(UsageError::MissingField(key.to_owned())))?;
        let key_column = fields.key_column();
        let assignments: Vec<_> = fields
            .ordered(row)?
            .into_iter()
            .filter(|(column, _)| *column != key_column)
            .collect();
        if assignments.is_empty() {
            return Err(UsageError::UnsupportedStatement(
                "updated when the identity is the only field",
            )
            .into());
        }

        let mut out = SqlWriter::new(self);
        out.push("ALTER TABLE ").ident(table).push(" UPDATE ");
        for (i, (column, value)) in assignments.into_iter().enumerate() {
            if i > 0 {
                out.push(", ");
            }
            out.binary(column, "=", value);
        }
        out.push(" WHERE ").binary(key_column, "=", key_value);
        Ok(out.finish())
    }

    /// `ALTER TABLE t DELETE WHERE ..`; the mutation always needs a condition.
    fn delete(&self, table: &str, filter: &Filter, fields: &Fields) -> Result<SqlStatement> {
        let mut out = SqlWriter::new(self);
        out.push("ALTER TABLE ")
            .ident(table)
            .push(" DELETE WHERE ");
        out.filter(filter, fields)?;
        Ok(out.finish())
    }
}
