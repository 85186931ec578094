//! Filter expressions: a small predicate algebra over entity fields.
//!
//! A [`Filter`] is an immutable value. Leaves are [`Comparison`]s of one field
//! against a literal; `!`, `&` and `|` build negations, conjunctions and
//! disjunctions. Dialects translate filters into backend fragments; nothing
//! here knows about SQL.
//!
//! ```
//! use quarry_core::Filter;
//!
//! let active_bobs = Filter::starts_with("name", "B") & !Filter::eq("banned", true);
//! assert_eq!(active_bobs.fields(), ["name", "banned"]);
//! ```

use core::fmt;
use core::ops::{BitAnd, BitOr, Not};

use crate::error::{QuarryError, Result, UsageError};
use crate::schema::FieldResolver;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    StartsWith,
    EndsWith,
    Contains,
    IStartsWith,
    IEndsWith,
    IContains,
    Matches,
    IMatches,
    In,
    HasAny,
    /// The address-valued field lies inside a network range.
    IpIn,
}

impl Operator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Contains => "contains",
            Self::IStartsWith => "istartswith",
            Self::IEndsWith => "iendswith",
            Self::IContains => "icontains",
            Self::Matches => "matches",
            Self::IMatches => "imatches",
            Self::In => "in",
            Self::HasAny => "has_any",
            Self::IpIn => "ipin",
        }
    }

    /// Operators whose operand is a set of values rather than one scalar.
    #[inline]
    pub const fn takes_set(self) -> bool {
        matches!(self, Self::In | Self::HasAny)
    }

    /// Text pattern operators (prefix, suffix, substring, regex).
    #[inline]
    pub const fn is_pattern(self) -> bool {
        matches!(
            self,
            Self::StartsWith
                | Self::EndsWith
                | Self::Contains
                | Self::IStartsWith
                | Self::IEndsWith
                | Self::IContains
                | Self::Matches
                | Self::IMatches
        )
    }

    /// Operators that require a text operand.
    #[inline]
    pub const fn takes_text(self) -> bool {
        self.is_pattern() || matches!(self, Self::IpIn)
    }

    /// Pattern operators that ignore letter case.
    #[inline]
    pub const fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            Self::IStartsWith | Self::IEndsWith | Self::IContains | Self::IMatches
        )
    }

    #[inline]
    pub const fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(Value),
    Set(Vec<Value>),
}

/// One `field <operator> operand` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    field: String,
    operator: Operator,
    operand: Operand,
}

impl Comparison {
    /// Builds a comparison, rejecting operands whose shape does not fit the operator.
    pub fn new(field: impl Into<String>, operator: Operator, operand: Operand) -> Result<Self> {
        let comparison = Self::unchecked(field.into(), operator, operand);
        comparison.check()?;
        Ok(comparison)
    }

    #[inline]
    const fn unchecked(field: String, operator: Operator, operand: Operand) -> Self {
        Self {
            field,
            operator,
            operand,
        }
    }

    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    #[inline]
    pub const fn operand(&self) -> &Operand {
        &self.operand
    }

    /// The scalar operand, if this comparison has one.
    pub fn value(&self) -> Option<&Value> {
        match &self.operand {
            Operand::Scalar(value) => Some(value),
            Operand::Set(_) => None,
        }
    }

    /// The set operand, if this comparison has one.
    pub fn values(&self) -> Option<&[Value]> {
        match &self.operand {
            Operand::Set(values) => Some(values),
            Operand::Scalar(_) => None,
        }
    }

    pub fn check(&self) -> Result<()> {
        let malformed =
            |reason: String| Err(QuarryError::Usage(UsageError::MalformedFilter(reason)));

        if self.field.is_empty() {
            return malformed(format!("`{}` comparison has an empty field name", self.operator));
        }

        match (&self.operand, self.operator) {
            (Operand::Set(_), op) if op.takes_set() => Ok(()),
            (Operand::Scalar(value), op) if op.takes_set() => malformed(format!(
                "`{}` on `{}` expects a set of values, got {}",
                op,
                self.field,
                value.type_name()
            )),
            (Operand::Set(_), op) => malformed(format!(
                "`{}` on `{}` expects a single value, got a set",
                op, self.field
            )),
            (Operand::Scalar(Value::Text(_)), op) if op.takes_text() => Ok(()),
            (Operand::Scalar(value), op) if op.takes_text() => malformed(format!(
                "`{}` on `{}` expects text, got {}",
                op,
                self.field,
                value.type_name()
            )),
            (Operand::Scalar(value @ (Value::Null | Value::Array(_))), op) if op.is_ordering() => {
                malformed(format!(
                    "`{}` on `{}` cannot compare against {}",
                    op,
                    self.field,
                    value.type_name()
                ))
            }
            (Operand::Scalar(_), _) => Ok(()),
        }
    }

    fn with_field(&self, field: String) -> Self {
        Self::unchecked(field, self.operator, self.operand.clone())
    }
}

/// A predicate over entity fields.
///
/// An empty [`Filter::And`] is always true and an empty [`Filter::Or`] is
/// always false.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Comparison(Comparison),
    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Default for Filter {
    #[inline]
    fn default() -> Self {
        Self::always()
    }
}

impl From<Comparison> for Filter {
    #[inline]
    fn from(comparison: Comparison) -> Self {
        Self::Comparison(comparison)
    }
}

fn scalar(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Filter {
    Filter::Comparison(Comparison::unchecked(
        field.into(),
        operator,
        Operand::Scalar(value.into()),
    ))
}

fn set<I>(field: impl Into<String>, operator: Operator, values: I) -> Filter
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    Filter::Comparison(Comparison::unchecked(
        field.into(),
        operator,
        Operand::Set(values.into_iter().map(Into::into).collect()),
    ))
}

impl Filter {
    /// Matches every record.
    #[inline]
    pub const fn always() -> Self {
        Self::And(Vec::new())
    }

    /// Matches no record.
    #[inline]
    pub const fn never() -> Self {
        Self::Or(Vec::new())
    }

    /// `field = value`; comparing with `NULL` tests for null.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        scalar(field, Operator::Eq, value)
    }

    /// `field <> value`; comparing with `NULL` tests for non-null.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        scalar(field, Operator::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        scalar(field, Operator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        scalar(field, Operator::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        scalar(field, Operator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        scalar(field, Operator::Lte, value)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        scalar(field, Operator::Eq, Value::Null)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        scalar(field, Operator::Ne, Value::Null)
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        scalar(field, Operator::StartsWith, prefix.into())
    }

    pub fn ends_with(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        scalar(field, Operator::EndsWith, suffix.into())
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        scalar(field, Operator::Contains, needle.into())
    }

    pub fn istarts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        scalar(field, Operator::IStartsWith, prefix.into())
    }

    pub fn iends_with(field: impl Into<String>, suffix: impl Into<String>) -> Self {
        scalar(field, Operator::IEndsWith, suffix.into())
    }

    pub fn icontains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        scalar(field, Operator::IContains, needle.into())
    }

    /// Regular-expression search (unanchored unless the pattern anchors itself).
    pub fn matches(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        scalar(field, Operator::Matches, pattern.into())
    }

    pub fn imatches(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        scalar(field, Operator::IMatches, pattern.into())
    }

    /// Set membership. An empty set matches nothing.
    pub fn is_in<I>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        set(field, Operator::In, values)
    }

    /// Negated set membership. An empty set matches everything.
    pub fn not_in<I>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        !Self::is_in(field, values)
    }

    /// Array overlap: the array-valued field shares at least one element with `values`.
    pub fn has_any<I>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        set(field, Operator::HasAny, values)
    }

    /// The address in `field` lies within `network`, given in CIDR notation
    /// (`10.0.0.0/8`, `2001:db8::/32`). A bare address is a one-host range.
    pub fn ip_in(field: impl Into<String>, network: impl Into<String>) -> Self {
        scalar(field, Operator::IpIn, network.into())
    }

    /// The address in `field` lies outside `network`.
    pub fn not_ip_in(field: impl Into<String>, network: impl Into<String>) -> Self {
        !Self::ip_in(field, network)
    }

    /// Conjunction of `filters`, in order.
    pub fn all_of(filters: impl IntoIterator<Item = Filter>) -> Self {
        filters.into_iter().fold(Self::always(), BitAnd::bitand)
    }

    /// Disjunction of `filters`, in order.
    pub fn any_of(filters: impl IntoIterator<Item = Filter>) -> Self {
        filters.into_iter().fold(Self::never(), BitOr::bitor)
    }

    /// Conjunction of equality tests, the programmatic form of [`lookup!`](crate::lookup).
    pub fn by<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::all_of(pairs.into_iter().map(|(field, value)| Self::eq(field, value)))
    }

    #[inline]
    pub fn negate(self) -> Self {
        !self
    }

    /// `true` for the trivially-true empty conjunction.
    #[inline]
    pub fn is_always(&self) -> bool {
        matches!(self, Self::And(operands) if operands.is_empty())
    }

    /// Field names referenced by this filter, in first-use order.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Comparison(comparison) => {
                if !out.contains(&comparison.field()) {
                    out.push(comparison.field());
                }
            }
            Self::Not(inner) => inner.collect_fields(out),
            Self::And(operands) | Self::Or(operands) => {
                for operand in operands {
                    operand.collect_fields(out);
                }
            }
        }
    }

    /// Checks every comparison's operand shape and that every field resolves.
    pub fn validate(&self, fields: &dyn FieldResolver) -> Result<()> {
        self.visit(&mut |comparison| {
            comparison.check()?;
            fields.column(comparison.field())?;
            Ok(())
        })
    }

    /// Rewrites field names into storage column names.
    pub fn resolve(&self, fields: &dyn FieldResolver) -> Result<Filter> {
        Ok(match self {
            Self::Comparison(comparison) => {
                comparison.check()?;
                let column = fields.column(comparison.field())?;
                Self::Comparison(comparison.with_field(column.to_owned()))
            }
            Self::Not(inner) => Self::Not(Box::new(inner.resolve(fields)?)),
            Self::And(operands) => Self::And(
                operands
                    .iter()
                    .map(|operand| operand.resolve(fields))
                    .collect::<Result<_>>()?,
            ),
            Self::Or(operands) => Self::Or(
                operands
                    .iter()
                    .map(|operand| operand.resolve(fields))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn visit(&self, f: &mut dyn FnMut(&Comparison) -> Result<()>) -> Result<()> {
        match self {
            Self::Comparison(comparison) => f(comparison),
            Self::Not(inner) => inner.visit(f),
            Self::And(operands) | Self::Or(operands) => {
                operands.iter().try_for_each(|operand| operand.visit(f))
            }
        }
    }
}

impl Not for Filter {
    type Output = Filter;

    #[inline]
    fn not(self) -> Self::Output {
        Filter::Not(Box::new(self))
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Self::Output {
        match (self, rhs) {
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), rhs) => {
                left.push(rhs);
                Filter::And(left)
            }
            (lhs, Filter::And(mut right)) => {
                right.insert(0, lhs);
                Filter::And(right)
            }
            (lhs, rhs) => Filter::And(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Self::Output {
        match (self, rhs) {
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), rhs) => {
                left.push(rhs);
                Filter::Or(left)
            }
            (lhs, Filter::Or(mut right)) => {
                right.insert(0, lhs);
                Filter::Or(right)
            }
            (lhs, rhs) => Filter::Or(vec![lhs, rhs]),
        }
    }
}

/// Keyword-equality sugar: `lookup! { id = 1, name = "Bob" }` is
/// `Filter::eq("id", 1) & Filter::eq("name", "Bob")`.
#[macro_export]
macro_rules! lookup {
    ($($field:ident = $value:expr),+ $(,)?) => {
        $crate::Filter::all_of([$($crate::Filter::eq(stringify!($field), $value)),+])
    };
}
