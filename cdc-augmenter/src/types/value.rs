use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// A column value as decoded from a binlog row image.
///
/// Values are untyped with respect to the table: integers are always signed, enums
/// and sets arrive as their index and bitmask, and strings as bytes. The column schema
/// gives them meaning, see [`crate::augment::convert`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Int(i64),
    Float(f64),
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    /// 1-based member index, 0 for the empty (invalid) value.
    Enum(u16),
    /// Member bitmask, bit `n` selecting the `n`-th declared member.
    Set(u64),
    Bit(u64),
    Json(serde_json::Value),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl<T> From<Option<T>> for RawValue
where
    T: Into<RawValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Null)
    }
}
