//! Dynamic cell values and the materializer used by map decoding.
//!
//! Map decoding scans each column into a [`Placeholder`] picked from the
//! cursor's type hint, then [`materialize`] turns the placeholder into the
//! [`Value`] stored under the column name.

use crate::core::db::{NativeType, ScanTarget};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value as SqlValue, ValueRef};
use serde::Serialize;
use std::collections::HashMap;

/// A decoded cell as stored in a dynamic row map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

/// Dynamic destination: one decoded value per column name.
pub type RowMap = HashMap<String, Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<SqlValue> for Value {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::Integer(i),
            SqlValue::Real(f) => Value::Real(f),
            SqlValue::Text(s) => Value::Text(s),
            SqlValue::Blob(b) => Value::Bytes(b),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

/// Undecoded bytes of a textual cell.
///
/// Numbers are kept in their decimal text form; `None` marks SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBytes(pub Option<Vec<u8>>);

impl RawBytes {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }
}

impl FromSql for RawBytes {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(RawBytes(match value {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
            ValueRef::Real(f) => Some(f.to_string().into_bytes()),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
        }))
    }
}

/// A scan target able to report its own canonical value.
pub trait CanonicalValue {
    fn canonical_value(&self) -> Value;

    fn as_target(&mut self) -> &mut dyn ScanTarget;
}

/// A nullable typed cell that keeps the driver value when the cell does not
/// convert to `T`.
///
/// SQLite stores whatever a row holds regardless of the declared column
/// type, so a `DATE` column may hold a full timestamp and an `INTEGER`
/// column a real number. Those cells come out as the stored value instead
/// of failing the row.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedCell<T> {
    Typed(Option<T>),
    Stored(SqlValue),
}

impl<T> Default for TypedCell<T> {
    fn default() -> Self {
        TypedCell::Typed(None)
    }
}

impl<T: FromSql> FromSql for TypedCell<T> {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match Option::<T>::column_result(value) {
            Ok(typed) => Ok(TypedCell::Typed(typed)),
            Err(FromSqlError::InvalidType) | Err(FromSqlError::Other(_)) => {
                Ok(TypedCell::Stored(SqlValue::from(value)))
            }
            Err(e) => Err(e),
        }
    }
}

impl<T> CanonicalValue for TypedCell<T>
where
    T: FromSql + Clone + Into<Value> + 'static,
{
    fn canonical_value(&self) -> Value {
        match self {
            TypedCell::Typed(Some(value)) => value.clone().into(),
            TypedCell::Typed(None) => Value::Null,
            TypedCell::Stored(value) => Value::from(value.clone()),
        }
    }

    fn as_target(&mut self) -> &mut dyn ScanTarget {
        self
    }
}

/// Per-column scan destination used on the dynamic map path.
pub enum Placeholder {
    /// Fully generic: keeps whatever storage class the driver returned.
    Generic(SqlValue),
    /// Typed cell that knows how to produce its canonical value, falling back
    /// to the stored value when the cell does not convert.
    Canonical(Box<dyn CanonicalValue>),
    /// Textual cell kept as bytes until materialized.
    RawBytes(RawBytes),
}

impl Placeholder {
    /// Picks the placeholder for a column from the cursor's type hint.
    pub fn for_hint(hint: Option<NativeType>) -> Self {
        match hint {
            Some(NativeType::Integer) => Placeholder::typed::<i64>(),
            Some(NativeType::Real) => Placeholder::typed::<f64>(),
            Some(NativeType::Boolean) => Placeholder::typed::<bool>(),
            Some(NativeType::Date) => Placeholder::typed::<NaiveDate>(),
            Some(NativeType::Timestamp) => Placeholder::typed::<NaiveDateTime>(),
            Some(NativeType::Text) => Placeholder::RawBytes(RawBytes::default()),
            Some(NativeType::Blob) | None => Placeholder::Generic(SqlValue::Null),
        }
    }

    fn typed<T>() -> Self
    where
        T: FromSql + Clone + Into<Value> + 'static,
    {
        Placeholder::Canonical(Box::new(TypedCell::<T>::default()))
    }

    pub fn target(&mut self) -> &mut dyn ScanTarget {
        match self {
            Placeholder::Generic(value) => value,
            Placeholder::Canonical(cell) => cell.as_target(),
            Placeholder::RawBytes(bytes) => bytes,
        }
    }

    fn is_absent(&self) -> bool {
        match self {
            Placeholder::Generic(value) => matches!(value, SqlValue::Null),
            Placeholder::RawBytes(bytes) => bytes.0.is_none(),
            Placeholder::Canonical(_) => false,
        }
    }
}

/// Normalizes one scanned placeholder into a storable [`Value`].
///
/// Absent cells become `Null`; canonical cells report their own value; raw
/// bytes become text; anything else is stored as the driver returned it.
pub fn materialize(cell: Placeholder) -> Value {
    if cell.is_absent() {
        return Value::Null;
    }

    match cell {
        Placeholder::Canonical(cell) => cell.canonical_value(),
        Placeholder::RawBytes(RawBytes(Some(bytes))) => {
            Value::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        Placeholder::RawBytes(RawBytes(None)) => Value::Null,
        Placeholder::Generic(value) => Value::from(value),
    }
}
