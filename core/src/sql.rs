//! Shared SQL rendering for the relational and columnar dialects.
//!
//! [`SqlWriter`] accumulates statement text and bind values together so that
//! placeholder numbering always matches parameter order. Literals are never
//! spliced into the text; every value goes through
//! [`SqlDialect::write_placeholder`].

use smallvec::SmallVec;

use crate::error::Result;
use crate::filter::{Comparison, Filter, Operator};
use crate::query::{OrderBy, Query};
use crate::schema::{FieldResolver, Fields};
use crate::value::Value;

/// Bind values in placeholder order.
pub type Params = SmallVec<[Value; 8]>;

/// A rendered statement: SQL text plus its bind values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Params,
}

impl SqlStatement {
    #[inline]
    pub fn new(sql: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        Self {
            sql: sql.into(),
            params: params.into_iter().collect(),
        }
    }
}

/// The pieces of a compiled [`Query`].
///
/// `condition` is always present (an always-true filter renders the dialect's
/// true literal); `order_by` and `limit` are empty when not requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub condition: String,
    pub params: Params,
    pub order_by: String,
    pub limit: String,
}

/// Dialect hooks used by [`SqlWriter`].
pub trait SqlDialect: Sized + Send + Sync {
    /// Literal rendered for an always-true condition.
    const TRUE: &'static str = "TRUE";
    /// Literal rendered for an always-false condition.
    const FALSE: &'static str = "FALSE";

    fn write_ident(&self, out: &mut String, ident: &str);

    /// Writes the placeholder for the `index`-th (1-based) bind value.
    fn write_placeholder(&self, out: &mut String, index: usize, value: &Value);

    /// Renders one comparison against an already-resolved `column`.
    fn write_comparison(
        &self,
        out: &mut SqlWriter<'_, Self>,
        column: &str,
        comparison: &Comparison,
    ) -> Result<()>;

    fn write_limit(&self, out: &mut String, limit: Option<u64>, offset: Option<u64>) {
        use core::fmt::Write;
        let mut sep = "";
        if let Some(limit) = limit {
            let _ = write!(out, "LIMIT {limit}");
            sep = " ";
        }
        if let Some(offset) = offset {
            let _ = write!(out, "{sep}OFFSET {offset}");
        }
    }
}

/// Quotes a possibly schema-qualified identifier, doubling embedded quotes.
pub fn quote_ident(out: &mut String, ident: &str, quote: char) {
    for (i, part) in ident.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push(quote);
        for ch in part.chars() {
            if ch == quote {
                out.push(quote);
            }
            out.push(ch);
        }
        out.push(quote);
    }
}

/// Statement text and bind values under construction.
pub struct SqlWriter<'d, D: SqlDialect> {
    dialect: &'d D,
    sql: String,
    params: Params,
}

impl<'d, D: SqlDialect> SqlWriter<'d, D> {
    pub fn new(dialect: &'d D) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            params: SmallVec::new(),
        }
    }

    #[inline]
    pub fn dialect(&self) -> &'d D {
        self.dialect
    }

    #[inline]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[inline]
    pub fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    pub fn ident(&mut self, ident: &str) -> &mut Self {
        self.dialect.write_ident(&mut self.sql, ident);
        self
    }

    /// Comma-separated identifiers.
    pub fn idents<'i>(&mut self, idents: impl IntoIterator<Item = &'i str>) -> &mut Self {
        for (i, ident) in idents.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(ident);
        }
        self
    }

    /// Binds `value` and writes its placeholder.
    pub fn param(&mut self, value: Value) -> &mut Self {
        let index = self.params.len() + 1;
        self.dialect.write_placeholder(&mut self.sql, index, &value);
        self.params.push(value);
        self
    }

    /// Comma-separated placeholders, one per value, in input order.
    pub fn params<'v>(&mut self, values: impl IntoIterator<Item = &'v Value>) -> &mut Self {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.param(value.clone());
        }
        self
    }

    /// `column <op> <param>`
    pub fn binary(&mut self, column: &str, op: &str, value: &Value) -> &mut Self {
        self.ident(column).push(" ").push(op).push(" ").param(value.clone())
    }

    /// Renders the comparisons every SQL dialect spells the same way: equality
    /// and ordering (with `NULL` equality as `IS [NOT] NULL`) and `IN` lists.
    ///
    /// Returns `false` for operators the dialect must render itself.
    pub fn common_comparison(&mut self, column: &str, comparison: &Comparison) -> bool {
        let op = match comparison.operator() {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::In => {
                let values = comparison.values().unwrap_or_default();
                if values.is_empty() {
                    self.push(D::FALSE);
                } else {
                    self.ident(column).push(" IN (").params(values).push(")");
                }
                return true;
            }
            _ => return false,
        };
        match (comparison.operator(), comparison.value()) {
            (Operator::Eq, Some(Value::Null)) => {
                self.ident(column).push(" IS NULL");
            }
            (Operator::Ne, Some(Value::Null)) => {
                self.ident(column).push(" IS NOT NULL");
            }
            (_, Some(value)) => {
                self.binary(column, op, value);
            }
            (_, None) => return false,
        }
        true
    }

    /// Renders a filter as a boolean condition.
    pub fn filter(&mut self, filter: &Filter, fields: &Fields) -> Result<()> {
        match filter {
            Filter::Comparison(comparison) => {
                comparison.check()?;
                let column = fields.column(comparison.field())?;
                let dialect = self.dialect;
                dialect.write_comparison(self, column, comparison)
            }
            Filter::Not(inner) => {
                self.push("NOT (");
                self.filter(inner, fields)?;
                self.push(")");
                Ok(())
            }
            Filter::And(operands) => self.junction(operands, " AND ", D::TRUE, fields),
            Filter::Or(operands) => self.junction(operands, " OR ", D::FALSE, fields),
        }
    }

    fn junction(
        &mut self,
        operands: &[Filter],
        separator: &str,
        empty: &str,
        fields: &Fields,
    ) -> Result<()> {
        match operands {
            [] => {
                self.push(empty);
            }
            [single] => self.filter(single, fields)?,
            _ => {
                self.push("(");
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        self.push(separator);
                    }
                    self.filter(operand, fields)?;
                }
                self.push(")");
            }
        }
        Ok(())
    }

    /// Comma-separated `column ASC|DESC` keys.
    pub fn order_by(&mut self, order: &[OrderBy], fields: &Fields) -> Result<()> {
        for (i, key) in order.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            let column = fields.column(&key.field)?;
            self.ident(column).push(" ").push(key.direction.as_sql());
        }
        Ok(())
    }

    /// `WHERE <condition>`, omitted for an always-true filter.
    pub fn where_clause(&mut self, filter: &Filter, fields: &Fields) -> Result<()> {
        if !filter.is_always() {
            self.push(" WHERE ");
            self.filter(filter, fields)?;
        }
        Ok(())
    }

    pub fn finish(self) -> SqlStatement {
        SqlStatement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Compiles a query into its condition, ordering and paging fragments.
pub fn compile<D: SqlDialect>(dialect: &D, query: &Query, fields: &Fields) -> Result<Fragment> {
    let mut condition = SqlWriter::new(dialect);
    condition.filter(&query.filter, fields)?;
    let condition = condition.finish();

    let mut order_by = SqlWriter::new(dialect);
    order_by.order_by(&query.order, fields)?;

    let mut limit = String::new();
    dialect.write_limit(&mut limit, query.limit, query.offset);

    Ok(Fragment {
        condition: condition.sql,
        params: condition.params,
        order_by: order_by.finish().sql,
        limit,
    })
}

/// `SELECT <columns> FROM <table> [WHERE ..] [ORDER BY ..] [LIMIT ..]`
pub fn select<D: SqlDialect>(
    dialect: &D,
    table: &str,
    query: &Query,
    fields: &Fields,
) -> Result<SqlStatement> {
    let fragment = compile(dialect, query, fields)?;
    let mut out = SqlWriter::new(dialect);
    out.push("SELECT ").idents(fields.columns()).push(" FROM ").ident(table);
    if !query.filter.is_always() {
        out.push(" WHERE ").push(&fragment.condition);
    }
    if !fragment.order_by.is_empty() {
        out.push(" ORDER BY ").push(&fragment.order_by);
    }
    if !fragment.limit.is_empty() {
        out.push(" ").push(&fragment.limit);
    }
    let mut statement = out.finish();
    statement.params = fragment.params;
    Ok(statement)
}

/// `SELECT COUNT(*) AS "count" FROM <table> [WHERE ..]`
pub fn count<D: SqlDialect>(
    dialect: &D,
    table: &str,
    filter: &Filter,
    fields: &Fields,
) -> Result<SqlStatement> {
    let mut out = SqlWriter::new(dialect);
    out.push("SELECT COUNT(*) AS ")
        .ident("count")
        .push(" FROM ")
        .ident(table);
    out.where_clause(filter, fields)?;
    Ok(out.finish())
}
