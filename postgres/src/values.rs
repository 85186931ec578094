//! Conversions between [`Value`] and the tokio-postgres wire types.

use std::net::IpAddr;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use cidr::{IpCidr, IpInet};
use quarry_core::{QuarryError, Result, Row, Value};
use rust_decimal::Decimal;
use tokio_postgres::types::{FromSql, IsNull, Kind, ToSql, Type, WrongType};
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Sync + Send>;

fn wrong_type<T>(ty: &Type) -> BoxError {
    Box::new(WrongType::new::<T>(ty.clone()))
}

fn is_text(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME)
}

/// Binds a [`Value`] as a statement parameter.
///
/// The wire encoding follows the parameter type the server inferred, so an
/// integer bound to an `int4` column is sent as four bytes. A value that has
/// no encoding for the inferred type fails with [`WrongType`] before anything
/// is sent.
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a Value);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> core::result::Result<IsNull, BoxError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql_checked(ty, out),
            Value::Integer(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::INT8 => i.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                _ if is_text(ty) => i.to_string().to_sql(ty, out),
                _ => Err(wrong_type::<i64>(ty)),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*f)?.to_sql(ty, out),
                _ => Err(wrong_type::<f64>(ty)),
            },
            Value::Text(s) => text_to_sql(s, ty, out),
            Value::Bytes(bytes) => bytes.as_slice().to_sql_checked(ty, out),
            Value::Uuid(uuid) => match *ty {
                Type::UUID => uuid.to_sql(ty, out),
                _ if is_text(ty) => uuid.to_string().to_sql(ty, out),
                _ => Err(wrong_type::<Uuid>(ty)),
            },
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.to_sql(ty, out),
                Type::TIMESTAMP => ts.naive_utc().to_sql(ty, out),
                Type::DATE => ts.date_naive().to_sql(ty, out),
                _ => Err(wrong_type::<DateTime<Utc>>(ty)),
            },
            Value::Array(values) if *ty == Type::BYTEA => byte_string(values, ty)?.to_sql(ty, out),
            Value::Array(values) => match ty.kind() {
                Kind::Array(_) => {
                    let params: Vec<PgParam<'_>> = values.iter().map(PgParam).collect();
                    params.to_sql(ty, out)
                }
                _ => Err(wrong_type::<Vec<Value>>(ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Conversion is decided per value in `to_sql`
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// Text is parsed into the inferred type where PostgreSQL has no implicit
/// conversion from a text parameter.
fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> core::result::Result<IsNull, BoxError> {
    match *ty {
        Type::UUID => Uuid::parse_str(s)?.to_sql(ty, out),
        Type::NUMERIC => s.parse::<Decimal>()?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::INET => parse_inet(s)?.to_sql(ty, out),
        Type::CIDR => s.trim().parse::<IpCidr>()?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIME => s.parse::<NaiveTime>()?.to_sql(ty, out),
        _ => s.to_sql_checked(ty, out),
    }
}

/// `address[/length]`; a bare address is a single host.
fn parse_inet(text: &str) -> core::result::Result<IpInet, BoxError> {
    let (address, length) = match text.trim().split_once('/') {
        Some((address, length)) => (address, Some(length)),
        None => (text.trim(), None),
    };
    let address: IpAddr = address.parse()?;
    let length = match length {
        Some(length) => length.parse()?,
        None if address.is_ipv4() => 32,
        None => 128,
    };
    IpInet::new(address, length).map_err(|e| e.to_string().into())
}

/// An integer array written to a `bytea` parameter, one element per byte.
fn byte_string(values: &[Value], ty: &Type) -> core::result::Result<Vec<u8>, BoxError> {
    values
        .iter()
        .map(|value| {
            value
                .as_i64()
                .and_then(|byte| u8::try_from(byte).ok())
                .ok_or_else(|| wrong_type::<Vec<u8>>(ty))
        })
        .collect()
}

/// Decodes one result row into a column-keyed [`Row`].
pub fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    let mut decoded = Row::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index, column.type_()).map_err(|e| {
            QuarryError::Mapping(format!("column `{}`: {e}", column.name()))
        })?;
        decoded.insert(column.name(), value);
    }
    Ok(decoded)
}

fn date(date: NaiveDate) -> Value {
    Value::Timestamp(date.and_time(NaiveTime::MIN).and_utc())
}

fn text(value: impl ToString) -> Value {
    Value::Text(value.to_string())
}

fn get<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    index: usize,
    convert: impl FnOnce(T) -> Value,
) -> core::result::Result<Value, BoxError> {
    Ok(row
        .try_get::<_, Option<T>>(index)?
        .map_or(Value::Null, convert))
}

fn array<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    index: usize,
    convert: impl Fn(T) -> Value,
) -> core::result::Result<Value, BoxError> {
    Ok(row
        .try_get::<_, Option<Vec<Option<T>>>>(index)?
        .map_or(Value::Null, |items| {
            Value::Array(
                items
                    .into_iter()
                    .map(|item| item.map_or(Value::Null, &convert))
                    .collect(),
            )
        }))
}

/// Every scalar type the decoder understands. NUMERIC, TIME, JSON and network
/// values come back as their canonical text; DATE as a midnight UTC timestamp.
macro_rules! decode_scalar {
    ($read:ident, $row:expr, $index:expr, $ty:expr, $unsupported:expr) => {
        match *$ty {
            Type::BOOL => $read::<bool>($row, $index, Value::Bool),
            Type::INT2 => $read::<i16>($row, $index, Value::from),
            Type::INT4 => $read::<i32>($row, $index, Value::from),
            Type::INT8 => $read::<i64>($row, $index, Value::from),
            Type::OID => $read::<u32>($row, $index, Value::from),
            Type::FLOAT4 => $read::<f32>($row, $index, Value::from),
            Type::FLOAT8 => $read::<f64>($row, $index, Value::from),
            Type::NUMERIC => $read::<Decimal>($row, $index, text),
            Type::BYTEA => $read::<Vec<u8>>($row, $index, Value::Bytes),
            Type::UUID => $read::<Uuid>($row, $index, Value::Uuid),
            Type::TIMESTAMPTZ => $read::<DateTime<Utc>>($row, $index, Value::Timestamp),
            Type::TIMESTAMP => $read::<NaiveDateTime>($row, $index, Value::from),
            Type::DATE => $read::<NaiveDate>($row, $index, date),
            Type::TIME => $read::<NaiveTime>($row, $index, text),
            Type::JSON | Type::JSONB => $read::<serde_json::Value>($row, $index, text),
            Type::INET => $read::<IpInet>($row, $index, text),
            Type::CIDR => $read::<IpCidr>($row, $index, text),
            _ if <String as FromSql>::accepts($ty) => $read::<String>($row, $index, Value::Text),
            _ => $unsupported,
        }
    };
}

fn unsupported(ty: &Type) -> BoxError {
    format!("unsupported column type `{ty}`").into()
}

fn decode_column(
    row: &tokio_postgres::Row,
    index: usize,
    ty: &Type,
) -> core::result::Result<Value, BoxError> {
    match ty.kind() {
        Kind::Array(member) => {
            decode_scalar!(array, row, index, member, Err(unsupported(ty)))
        }
        _ => decode_scalar!(get, row, index, ty, Err(unsupported(ty))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(value: &Value, ty: &Type) -> core::result::Result<Vec<u8>, BoxError> {
        let mut out = BytesMut::new();
        match PgParam(value).to_sql_checked(ty, &mut out)? {
            IsNull::Yes => Ok(Vec::new()),
            IsNull::No => Ok(out.to_vec()),
        }
    }

    #[test]
    fn byte_vectors_bind_as_bytea() {
        assert_eq!(bind(&Value::from(vec![1u8, 2, 3]), &Type::BYTEA).unwrap(), [1, 2, 3]);
        assert_eq!(bind(&Value::Bytes(vec![9, 8]), &Type::BYTEA).unwrap(), [9, 8]);
        assert!(bind(&Value::from(vec![1, 300]), &Type::BYTEA).is_err());
        assert!(bind(&Value::from(vec!["a"]), &Type::BYTEA).is_err());
    }

    #[test]
    fn mismatched_types_are_rejected_before_sending() {
        assert!(bind(&Value::from(vec![1, 2]), &Type::TEXT).is_err());
        assert!(bind(&Value::from(1), &Type::BOOL).is_err());
        assert!(bind(&Value::from(1.5), &Type::INT4).is_err());
        assert!(bind(&Value::from(true), &Type::INT4).is_err());
        assert!(bind(&Value::Bytes(vec![1]), &Type::TEXT).is_err());
        assert!(bind(&Value::from(i64::MAX), &Type::INT4).is_err());
    }

    #[test]
    fn integers_follow_the_inferred_width() {
        assert_eq!(bind(&Value::from(7), &Type::INT2).unwrap(), 7i16.to_be_bytes());
        assert_eq!(bind(&Value::from(7), &Type::INT4).unwrap(), 7i32.to_be_bytes());
        assert_eq!(bind(&Value::from(7), &Type::INT8).unwrap(), 7i64.to_be_bytes());
        assert!(bind(&Value::from(7), &Type::NUMERIC).is_ok());
        assert_eq!(bind(&Value::from(7), &Type::TEXT).unwrap(), b"7");
    }

    #[test]
    fn text_parses_into_structured_types() {
        assert!(bind(&Value::from("12.50"), &Type::NUMERIC).is_ok());
        assert!(bind(&Value::from(r#"{"a":1}"#), &Type::JSONB).is_ok());
        assert!(bind(&Value::from("10.1.2.3"), &Type::INET).is_ok());
        assert!(bind(&Value::from("10.0.0.0/8"), &Type::INET).is_ok());
        assert!(bind(&Value::from("10.0.0.0/8"), &Type::CIDR).is_ok());
        assert!(bind(&Value::from("2024-03-01"), &Type::DATE).is_ok());
        assert!(bind(&Value::from("12:30:00"), &Type::TIME).is_ok());
        assert!(bind(&Value::from("not json"), &Type::JSON).is_err());
        assert!(bind(&Value::from("10.0.0.0/40"), &Type::INET).is_err());
    }

    #[test]
    fn nulls_bind_for_any_type() {
        assert!(bind(&Value::Null, &Type::BYTEA).unwrap().is_empty());
    }
}
