//! ClickHouse parameter typing and text encoding.
//!
//! Server-side parameters are declared as `{name:Type}` in the statement and
//! sent separately as `param_name=<text>`; the text uses ClickHouse's escaped
//! format.

use core::fmt::Write;

use quarry_core::Value;

/// ClickHouse type used to declare a parameter holding `value`.
pub fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "Nullable(String)".to_owned(),
        Value::Bool(_) => "Bool".to_owned(),
        Value::Integer(_) => "Int64".to_owned(),
        Value::Float(_) => "Float64".to_owned(),
        Value::Text(_) | Value::Bytes(_) => "String".to_owned(),
        Value::Uuid(_) => "UUID".to_owned(),
        Value::Timestamp(_) => "DateTime64(6, 'UTC')".to_owned(),
        Value::Array(values) => {
            let member = values
                .iter()
                .find(|value| !value.is_null())
                .map_or_else(|| "String".to_owned(), type_name);
            if values.iter().any(Value::is_null) {
                format!("Array(Nullable({member}))")
            } else {
                format!("Array({member})")
            }
        }
    }
}

/// Text form of a top-level parameter value.
pub fn encode_param(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Null => out.push_str("\\N"),
        Value::Text(text) => escape_into(&mut out, text, None),
        Value::Bytes(bytes) => escape_into(&mut out, &String::from_utf8_lossy(bytes), None),
        other => write_literal(&mut out, other),
    }
    out
}

/// Writes a value as it appears inside an array literal.
fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{f}");
        }
        Value::Text(text) => quoted(out, text),
        Value::Bytes(bytes) => quoted(out, &String::from_utf8_lossy(bytes)),
        Value::Uuid(uuid) => quoted(out, &uuid.to_string()),
        Value::Timestamp(ts) => quoted(out, &ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        Value::Array(values) => {
            out.push('[');
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_literal(out, value);
            }
            out.push(']');
        }
    }
}

fn quoted(out: &mut String, text: &str) {
    out.push('\'');
    escape_into(out, text, Some('\''));
    out.push('\'');
}

fn escape_into(out: &mut String, text: &str, quote: Option<char>) {
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if Some(c) == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

#[cfg(feature = "http")]
pub(crate) mod json {
    //! Decoding of `FORMAT JSON` result sets.

    use quarry_core::{FromValue, QuarryError, Result, Row, Value};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub(crate) struct JsonResult {
        pub meta: Vec<JsonColumn>,
        pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    }

    #[derive(Debug, Deserialize)]
    pub(crate) struct JsonColumn {
        pub name: String,
        #[serde(rename = "type")]
        pub ty: String,
    }

    pub(crate) fn decode(body: &[u8]) -> Result<Vec<Row>> {
        let result: JsonResult = serde_json::from_slice(body)
            .map_err(|e| QuarryError::Execution(format!("invalid clickhouse response: {e}")))?;
        let mut rows = Vec::with_capacity(result.data.len());
        for mut record in result.data {
            let mut row = Row::with_capacity(result.meta.len());
            for column in &result.meta {
                let raw = record.remove(&column.name).unwrap_or(serde_json::Value::Null);
                row.insert(column.name.as_str(), decode_value(raw, &column.ty)?);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn unwrap_type<'t>(ty: &'t str, wrapper: &str) -> Option<&'t str> {
        ty.strip_prefix(wrapper)?.strip_prefix('(')?.strip_suffix(')')
    }

    /// Converts one JSON cell of ClickHouse type `ty`.
    ///
    /// Integers must fit `i64`; larger `UInt64`/`UInt128` values are a mapping
    /// error rather than a lossy float. Date-times are expected in the ISO form
    /// the executor requests (`date_time_output_format=iso`), which carries an
    /// explicit UTC offset whatever the column's time zone.
    pub(crate) fn decode_value(raw: serde_json::Value, ty: &str) -> Result<Value> {
        use serde_json::Value as Json;

        if let Some(inner) =
            unwrap_type(ty, "Nullable").or_else(|| unwrap_type(ty, "LowCardinality"))
        {
            return decode_value(raw, inner);
        }

        Ok(match raw {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Integer(i),
                (None, Some(u)) => {
                    return Err(QuarryError::Mapping(format!(
                        "{ty} value {u} does not fit a signed 64-bit integer"
                    )));
                }
                _ => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => match ty {
                "UUID" => Value::Uuid(FromValue::from_value(Value::Text(s))?),
                t if t.starts_with("DateTime") || t == "Date" || t == "Date32" => {
                    Value::Timestamp(FromValue::from_value(Value::Text(s))?)
                }
                t if t.starts_with("Int") || t.starts_with("UInt") => s
                    .parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|e| QuarryError::Mapping(format!("invalid {t} `{s}`: {e}")))?,
                _ => Value::Text(s),
            },
            Json::Array(items) => {
                let member = unwrap_type(ty, "Array").unwrap_or("String");
                Value::Array(
                    items
                        .into_iter()
                        .map(|item| decode_value(item, member))
                        .collect::<Result<_>>()?,
                )
            }
            object @ Json::Object(_) => Value::Text(object.to_string()),
        })
    }
}
