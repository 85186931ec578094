//! Filter evaluation over stored rows.
//!
//! Evaluation follows SQL three-valued logic: a comparison against a missing or
//! `NULL` cell is unknown (`None`), `NOT` keeps unknown unknown, and a row is
//! selected only when its predicate is definitely true. This keeps the store's
//! answers aligned with the SQL backends for the same filter.

use core::cmp::Ordering;
use std::net::IpAddr;

use cidr::{IpCidr, IpInet};
use quarry_core::{Comparison, Filter, Operator, Result, Row, UsageError, Value};
use regex::{Regex, RegexBuilder};

/// A column-space [`Filter`] with its text patterns compiled.
#[derive(Debug, Clone)]
pub enum Predicate {
    Compare {
        column: String,
        operator: Operator,
        value: Value,
    },
    Pattern {
        column: String,
        regex: Regex,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    HasAny {
        column: String,
        values: Vec<Value>,
    },
    Network {
        column: String,
        range: IpCidr,
    },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Compiles a filter whose field names are already resolved to columns.
    pub fn compile(filter: &Filter) -> Result<Self> {
        Ok(match filter {
            Filter::Comparison(comparison) => Self::comparison(comparison)?,
            Filter::Not(inner) => Self::Not(Box::new(Self::compile(inner)?)),
            Filter::And(operands) => Self::And(
                operands
                    .iter()
                    .map(Self::compile)
                    .collect::<Result<_>>()?,
            ),
            Filter::Or(operands) => Self::Or(
                operands
                    .iter()
                    .map(Self::compile)
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn comparison(comparison: &Comparison) -> Result<Self> {
        comparison.check()?;
        let column = comparison.field().to_owned();
        let operator = comparison.operator();

        if operator.takes_set() {
            let values = comparison.values().unwrap_or_default().to_vec();
            return Ok(match operator {
                Operator::HasAny => Self::HasAny { column, values },
                _ => Self::In { column, values },
            });
        }

        let value = comparison.value().cloned().unwrap_or_default();
        if operator == Operator::IpIn {
            let range = value
                .as_str()
                .and_then(parse_inet)
                .ok_or_else(|| {
                    UsageError::MalformedFilter(format!("invalid network range {value}"))
                })?
                .network();
            return Ok(Self::Network { column, range });
        }
        if !operator.is_pattern() {
            return Ok(Self::Compare {
                column,
                operator,
                value,
            });
        }

        let text = value.as_str().ok_or_else(|| {
            UsageError::MalformedFilter(format!("`{operator}` expects a text operand"))
        })?;
        let pattern = match operator {
            Operator::StartsWith | Operator::IStartsWith => format!("^{}", regex::escape(text)),
            Operator::EndsWith | Operator::IEndsWith => format!("{}$", regex::escape(text)),
            Operator::Contains | Operator::IContains => regex::escape(text),
            _ => text.to_owned(),
        };
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(operator.is_case_insensitive())
            .build()
            .map_err(|e| UsageError::MalformedFilter(format!("invalid pattern `{text}`: {e}")))?;
        Ok(Self::Pattern { column, regex })
    }

    /// `Some(true)` / `Some(false)` when decided, `None` when unknown.
    pub fn eval(&self, row: &Row) -> Option<bool> {
        match self {
            Self::Compare {
                column,
                operator,
                value,
            } => compare(cell(row, column), *operator, value),
            Self::Pattern { column, regex } => match cell(row, column) {
                Value::Null => None,
                Value::Text(text) => Some(regex.is_match(text)),
                _ => None,
            },
            Self::Network { column, range } => {
                let inet = cell(row, column).as_str().and_then(parse_inet)?;
                Some(
                    range.contains(&inet.address())
                        && inet.network_length() >= range.network_length(),
                )
            }
            Self::In { column, values } => {
                let cell = cell(row, column);
                if values.is_empty() {
                    return Some(false);
                }
                if cell.is_null() {
                    return None;
                }
                if values.iter().any(|value| same(cell, value)) {
                    Some(true)
                } else if values.iter().any(Value::is_null) {
                    None
                } else {
                    Some(false)
                }
            }
            Self::HasAny { column, values } => match cell(row, column) {
                Value::Null => None,
                Value::Array(items) => Some(
                    items
                        .iter()
                        .any(|item| values.iter().any(|value| same(item, value))),
                ),
                _ => Some(false),
            },
            Self::Not(inner) => inner.eval(row).map(|decided| !decided),
            Self::And(operands) => {
                let mut unknown = false;
                for operand in operands {
                    match operand.eval(row) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown { None } else { Some(true) }
            }
            Self::Or(operands) => {
                let mut unknown = false;
                for operand in operands {
                    match operand.eval(row) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown { None } else { Some(false) }
            }
        }
    }

    /// Whether the row is selected.
    #[inline]
    pub fn matches(&self, row: &Row) -> bool {
        self.eval(row) == Some(true)
    }
}

static NULL: Value = Value::Null;

/// `address[/length]`; a bare address is a single host.
fn parse_inet(text: &str) -> Option<IpInet> {
    let (address, length) = match text.split_once('/') {
        Some((address, length)) => (address, Some(length)),
        None => (text, None),
    };
    let address: IpAddr = address.trim().parse().ok()?;
    let length = match length {
        Some(length) => length.trim().parse().ok()?,
        None if address.is_ipv4() => 32,
        None => 128,
    };
    IpInet::new(address, length).ok()
}

fn cell<'r>(row: &'r Row, column: &str) -> &'r Value {
    row.get(column).unwrap_or(&NULL)
}

/// Equality across numeric representations.
pub(crate) fn same(left: &Value, right: &Value) -> bool {
    match left.compare(right) {
        Some(ordering) => ordering == Ordering::Equal,
        None => !left.is_null() && left == right,
    }
}

fn compare(cell: &Value, operator: Operator, value: &Value) -> Option<bool> {
    match (operator, value) {
        (Operator::Eq, Value::Null) => return Some(cell.is_null()),
        (Operator::Ne, Value::Null) => return Some(!cell.is_null()),
        _ => {}
    }
    if cell.is_null() {
        return None;
    }
    match operator {
        Operator::Eq => Some(same(cell, value)),
        Operator::Ne => Some(!same(cell, value)),
        _ => {
            let ordering = cell.compare(value)?;
            Some(match operator {
                Operator::Gt => ordering == Ordering::Greater,
                Operator::Gte => ordering != Ordering::Less,
                Operator::Lt => ordering == Ordering::Less,
                Operator::Lte => ordering != Ordering::Greater,
                _ => return None,
            })
        }
    }
}

/// Orders cells the way PostgreSQL does by default: `NULL` sorts after every
/// value, and incomparable values keep their relative order.
pub(crate) fn order(left: &Value, right: &Value) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
    }
}

pub(crate) fn column_value<'r>(row: &'r Row, column: &str) -> &'r Value {
    cell(row, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: Option<&str>, age: i64) -> Row {
        Row::new().with("name", name).with("age", age)
    }

    fn eval(filter: Filter, row: &Row) -> Option<bool> {
        Predicate::compile(&filter).unwrap().eval(row)
    }

    #[test]
    fn null_cells_are_unknown() {
        let anonymous = row(None, 30);
        assert_eq!(eval(Filter::eq("name", "Bob"), &anonymous), None);
        assert_eq!(eval(!Filter::eq("name", "Bob"), &anonymous), None);
        assert_eq!(eval(Filter::is_null("name"), &anonymous), Some(true));
        assert_eq!(
            eval(Filter::eq("name", "Bob") | Filter::gt("age", 18), &anonymous),
            Some(true)
        );
        assert_eq!(
            eval(Filter::eq("name", "Bob") & Filter::gt("age", 18), &anonymous),
            None
        );
    }

    #[test]
    fn patterns_escape_their_operands() {
        let dotted = row(Some("a.b"), 1);
        assert_eq!(eval(Filter::starts_with("name", "a."), &dotted), Some(true));
        assert_eq!(eval(Filter::starts_with("name", "a*"), &dotted), Some(false));
        assert_eq!(eval(Filter::iends_with("name", "B"), &dotted), Some(true));
        assert_eq!(eval(Filter::contains("name", "."), &dotted), Some(true));
        assert_eq!(eval(Filter::matches("name", "^a.b$"), &dotted), Some(true));
        assert_eq!(eval(Filter::imatches("name", "^A"), &dotted), Some(true));
    }

    #[test]
    fn patterns_on_non_text_cells_are_unknown() {
        let bob = row(Some("Bob"), 30);
        assert_eq!(eval(Filter::starts_with("age", "3"), &bob), None);
        assert_eq!(eval(!Filter::contains("age", "0"), &bob), None);
    }

    #[test]
    fn addresses_inside_network_ranges() {
        let host = |addr: &str| Row::new().with("addr", addr);
        let lan = Filter::ip_in("addr", "192.168.0.0/16");
        assert_eq!(eval(lan.clone(), &host("192.168.4.20")), Some(true));
        assert_eq!(eval(lan.clone(), &host("192.168.0.0/24")), Some(true));
        assert_eq!(eval(lan.clone(), &host("10.0.0.1")), Some(false));
        assert_eq!(eval(lan.clone(), &host("::1")), Some(false));
        assert_eq!(eval(lan, &host("not an address")), None);
        assert_eq!(
            eval(Filter::not_ip_in("addr", "2001:db8::/32"), &host("2001:db8::7")),
            Some(false)
        );
        assert_eq!(eval(Filter::ip_in("addr", "10.0.0.1"), &host("10.0.0.1")), Some(true));
    }

    #[test]
    fn invalid_network_range_is_a_usage_error() {
        let err = Predicate::compile(&Filter::ip_in("addr", "10.0.0.0/40")).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn invalid_regex_is_a_usage_error() {
        let err = Predicate::compile(&Filter::matches("name", "(")).unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn set_membership() {
        let bob = row(Some("Bob"), 30);
        assert_eq!(eval(Filter::is_in("age", [30, 40]), &bob), Some(true));
        assert_eq!(eval(Filter::is_in("age", Vec::<i64>::new()), &bob), Some(false));
        assert_eq!(eval(Filter::not_in("age", Vec::<i64>::new()), &bob), Some(true));
        assert_eq!(
            eval(Filter::is_in("age", [Value::from(1), Value::Null]), &bob),
            None
        );
        assert_eq!(eval(Filter::is_in("age", [30.0]), &bob), Some(true));

        let tagged = Row::new().with("tags", vec!["a", "b"]);
        assert_eq!(eval(Filter::has_any("tags", ["b", "c"]), &tagged), Some(true));
        assert_eq!(eval(Filter::has_any("tags", ["c"]), &tagged), Some(false));
    }

    #[test]
    fn null_orders_last() {
        let mut values = vec![Value::Null, Value::from(2), Value::from(1)];
        values.sort_by(order);
        assert_eq!(values, [Value::from(1), Value::from(2), Value::Null]);
    }
}
