//! String rendering of binlog values according to their column schema.

use std::fmt::Write;

use cdc_mysql::types::{ColumnSchema, DATE_FORMAT, DATETIME_FORMAT, DataType, TIME_FORMAT};

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::RawValue;

/// Renders `value` as stored in `column`. SQL `NULL` yields `None`.
pub fn value_to_string(column: &ColumnSchema, value: &RawValue) -> CdcResult<Option<String>> {
    let rendered = match value {
        RawValue::Null => return Ok(None),
        RawValue::Int(value) => match column.data_type {
            DataType::Enum => enum_member(column, *value)?,
            DataType::Set => set_members(column, *value as u64)?,
            _ => integer(column, *value),
        },
        RawValue::Float(value) => value.to_string(),
        RawValue::Decimal(value) | RawValue::String(value) => value.clone(),
        RawValue::Bytes(bytes) => {
            if column.data_type.is_binary() {
                hex(bytes)
            } else {
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
        RawValue::Date(date) => date.format(DATE_FORMAT).to_string(),
        RawValue::Time(time) => time.format(TIME_FORMAT).to_string(),
        RawValue::DateTime(datetime) => datetime.format(DATETIME_FORMAT).to_string(),
        RawValue::Timestamp(timestamp) => timestamp.format(DATETIME_FORMAT).to_string(),
        RawValue::Enum(index) => enum_member(column, i64::from(*index))?,
        RawValue::Set(mask) => set_members(column, *mask)?,
        RawValue::Bit(bits) => bits.to_string(),
        RawValue::Json(json) => json.to_string(),
    };

    Ok(Some(rendered))
}

/// Unsigned columns arrive sign-extended at their storage width.
fn integer(column: &ColumnSchema, value: i64) -> String {
    if !column.is_unsigned() {
        return value.to_string();
    }

    match column.data_type.integer_bits() {
        Some(bits) if bits < 64 => ((value as u64) & ((1u64 << bits) - 1)).to_string(),
        _ => (value as u64).to_string(),
    }
}

fn enum_member(column: &ColumnSchema, index: i64) -> CdcResult<String> {
    // Index 0 is the empty string MySQL stores for invalid values.
    if index == 0 {
        return Ok(String::new());
    }

    let member = usize::try_from(index - 1)
        .ok()
        .and_then(|index| column.enum_values.get(index));
    match member {
        Some(member) => Ok(member.clone()),
        None => bail!(
            ErrorKind::ConversionError,
            "Enum index is out of range",
            format!("column `{}` has no member {index}", column.name)
        ),
    }
}

fn set_members(column: &ColumnSchema, mask: u64) -> CdcResult<String> {
    let declared = column.set_values.len();
    if declared < 64 && mask >> declared != 0 {
        bail!(
            ErrorKind::ConversionError,
            "Set bitmask selects undeclared members",
            format!("column `{}` declares {declared} members, got mask {mask:#x}", column.name)
        );
    }

    let members: Vec<&str> = column
        .set_values
        .iter()
        .take(64)
        .enumerate()
        .filter(|(bit, _)| mask & (1u64 << bit) != 0)
        .map(|(_, member)| member.as_str())
        .collect();

    Ok(members.join(","))
}

fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }

    hex
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    fn column(data_type: DataType, column_type: &str) -> ColumnSchema {
        ColumnSchema::new("c", data_type, column_type)
    }

    fn render(column: &ColumnSchema, value: RawValue) -> Option<String> {
        value_to_string(column, &value).unwrap()
    }

    #[test]
    fn test_unsigned_integers_are_reinterpreted() {
        assert_eq!(
            render(&column(DataType::TinyInt, "tinyint(3) unsigned"), RawValue::Int(-1)),
            Some("255".to_string())
        );
        assert_eq!(
            render(&column(DataType::MediumInt, "mediumint unsigned"), RawValue::Int(-2)),
            Some("16777214".to_string())
        );
        assert_eq!(
            render(&column(DataType::BigInt, "bigint(20) unsigned"), RawValue::Int(-1)),
            Some(u64::MAX.to_string())
        );
        assert_eq!(
            render(&column(DataType::Int, "int(11)"), RawValue::Int(-7)),
            Some("-7".to_string())
        );
    }

    #[test]
    fn test_enum_and_set_members() {
        let mut status = column(DataType::Enum, "enum('new','paid')");
        status.enum_values = vec!["new".to_string(), "paid".to_string()];
        let mut flags = column(DataType::Set, "set('a','b','c')");
        flags.set_values = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        assert_eq!(render(&status, RawValue::Enum(2)), Some("paid".to_string()));
        assert_eq!(render(&status, RawValue::Enum(0)), Some(String::new()));
        assert_eq!(render(&flags, RawValue::Set(0b101)), Some("a,c".to_string()));
        assert_eq!(render(&flags, RawValue::Set(0)), Some(String::new()));

        let err = value_to_string(&status, &RawValue::Enum(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
        assert!(value_to_string(&flags, &RawValue::Set(0b1000)).is_err());
    }

    #[test]
    fn test_bytes_follow_column_charset() {
        assert_eq!(
            render(&column(DataType::VarBinary, "varbinary(4)"), RawValue::Bytes(vec![0xde, 0xad, 0x01])),
            Some("dead01".to_string())
        );
        assert_eq!(
            render(&column(DataType::Text, "text"), RawValue::Bytes("héllo".as_bytes().to_vec())),
            Some("héllo".to_string())
        );
    }

    #[test]
    fn test_temporal_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let datetime = date.and_hms_micro_opt(13, 5, 9, 250_000).unwrap();
        let timestamp = Utc.with_ymd_and_hms(2024, 2, 29, 13, 5, 9).unwrap();

        assert_eq!(
            render(&column(DataType::Date, "date"), RawValue::Date(date)),
            Some("2024-02-29".to_string())
        );
        assert_eq!(
            render(&column(DataType::DateTime, "datetime(6)"), RawValue::DateTime(datetime)),
            Some("2024-02-29 13:05:09.250".to_string())
        );
        assert_eq!(
            render(&column(DataType::Timestamp, "timestamp"), RawValue::Timestamp(timestamp)),
            Some("2024-02-29 13:05:09".to_string())
        );
    }

    #[test]
    fn test_null_and_plain_values() {
        let text = column(DataType::VarChar, "varchar(16)");

        assert_eq!(render(&text, RawValue::Null), None);
        assert_eq!(render(&text, RawValue::from("10")), Some("10".to_string()));
        assert_eq!(
            render(&column(DataType::Decimal, "decimal(10,2)"), RawValue::Decimal("12.50".to_string())),
            Some("12.50".to_string())
        );
        assert_eq!(
            render(&column(DataType::Json, "json"), RawValue::Json(serde_json::json!({"a": 1}))),
            Some(r#"{"a":1}"#.to_string())
        );
    }
}
