//! Target row keys derived from primary key values.

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::AugmentedRow;

pub const KEY_SEPARATOR: &str = ";";

/// Rendering of a `NULL` key part.
pub const NULL_KEY_PART: &str = "NULL";

/// Key of `row` in the target store.
///
/// Regular rows are keyed by their primary key values joined with [`KEY_SEPARATOR`].
/// With `salted`, the key is prefixed by four hex digits of the MD5 of the first key
/// value, spreading monotonically increasing keys across target partitions. Payload
/// rows are keyed by their transaction UUID.
pub fn row_key(row: &AugmentedRow, salted: bool) -> CdcResult<String> {
    if row.is_payload {
        return payload_row_key(row);
    }

    let values = row.primary_key_values();
    let Some(first) = values.first() else {
        bail!(
            ErrorKind::InvalidData,
            "Row has no primary key",
            format!("{}.{}", row.schema_name, row.table_name)
        );
    };

    let key = values
        .iter()
        .map(|value| value.unwrap_or(NULL_KEY_PART))
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR);

    if !salted {
        return Ok(key);
    }

    Ok(format!(
        "{}{KEY_SEPARATOR}{key}",
        salt(first.unwrap_or(NULL_KEY_PART))
    ))
}

pub fn payload_row_key(row: &AugmentedRow) -> CdcResult<String> {
    match &row.transaction_uuid {
        Some(uuid) => Ok(uuid.clone()),
        None => bail!(
            ErrorKind::InvalidData,
            "Payload row has no transaction UUID",
            format!("{}.{}", row.schema_name, row.table_name)
        ),
    }
}

/// First two bytes of the MD5 digest of `value` as lowercase hex.
pub fn salt(value: &str) -> String {
    let digest = md5::compute(value.as_bytes());

    format!("{:02x}{:02x}", digest[0], digest[1])
}
