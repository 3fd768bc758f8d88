use cdc_config::shared::MutationConfig;
use tracing::warn;
use url::form_urlencoded;

use crate::augment::row_key::{NULL_KEY_PART, row_key};
use crate::error::CdcResult;
use crate::mutation::{Cell, Mutation};
use crate::types::{AugmentedRow, RowEventType};

/// Qualifier of the marker cell recording the kind of change.
pub const ROW_STATUS: &str = "row_status";

/// Literal written for `NULL` column values.
pub const NULL_VALUE: &str = "NULL";

/// Turns augmented rows into versioned cell writes for a wide-column target.
///
/// Every cell of a row is written at the row's version timestamp, so replaying a
/// transaction overwrites the same versions instead of adding new ones.
#[derive(Debug, Clone)]
pub struct MutationGenerator {
    config: MutationConfig,
}

impl MutationGenerator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, row: &AugmentedRow) -> CdcResult<Mutation> {
        let row_key = row_key(row, self.config.salt_row_keys)?;
        let table = self.target_table_name(row);
        let timestamp = row.version_timestamp;

        let mut cells = Vec::new();
        match row.event_type {
            RowEventType::Delete => {}
            RowEventType::Update => {
                for column in &row.columns {
                    if column.before == column.after {
                        continue;
                    }

                    let value = column.after.as_deref().unwrap_or(NULL_VALUE);
                    cells.push(self.cell(&column.name, timestamp, value));
                }
            }
            RowEventType::Insert => {
                for column in &row.columns {
                    let value = column.after.as_deref().unwrap_or(NULL_VALUE);
                    cells.push(self.cell(&column.name, timestamp, value));
                }
            }
        }

        cells.push(self.cell(ROW_STATUS, timestamp, row.event_type.row_status()));
        if let Some(uuid) = &row.transaction_uuid {
            cells.push(self.cell(&self.config.uuid_field, timestamp, uuid));
        }
        if let Some(xid) = row.transaction_xid {
            cells.push(self.cell(&self.config.xid_field, timestamp, &xid.to_string()));
        }

        let source_row_uri = self.source_row_uri(row);
        let target_row_uri = self.target_row_uri(&table, &row_key);

        Ok(Mutation {
            table,
            row_key,
            cells,
            source_row_uri,
            target_row_uri: Some(target_row_uri),
            transaction_uuid: row.transaction_uuid.clone(),
        })
    }

    /// Lower-cased logical table name, prefixed with `namespace:` when configured.
    pub fn target_table_name(&self, row: &AugmentedRow) -> String {
        let table = row.table_name.to_lowercase();
        match self.config.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => {
                format!("{}:{table}", namespace.to_lowercase())
            }
            _ => table,
        }
    }

    /// `mysql://<domain>/<table>?<pk>=<value>&...`, identifying the source row.
    ///
    /// The domain is the configured shard name, or the lower-cased schema. Returns
    /// `None` for rows without primary key columns.
    pub fn source_row_uri(&self, row: &AugmentedRow) -> Option<String> {
        if row.primary_key_columns.is_empty() {
            warn!(
                schema = %row.schema_name,
                table = %row.table_name,
                "row has no primary key, omitting source row uri"
            );

            return None;
        }

        let domain = match self.config.shard_name.as_deref() {
            Some(shard_name) if !shard_name.is_empty() => shard_name.to_string(),
            _ => row.schema_name.to_lowercase(),
        };

        let mut query = form_urlencoded::Serializer::new(String::new());
        for column in &row.primary_key_columns {
            query.append_pair(column, row.value(column).unwrap_or(NULL_KEY_PART));
        }

        Some(format!(
            "mysql://{domain}/{}?{}",
            row.source_table_name(),
            query.finish()
        ))
    }

    /// `<scheme>://<domain>/<table>?row=<key>&cf=<family>`, identifying the target row.
    pub fn target_row_uri(&self, table: &str, row_key: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("row", row_key)
            .append_pair("cf", &self.config.column_family)
            .finish();

        format!(
            "{}://{}/{table}?{query}",
            self.config.target_scheme, self.config.target_domain
        )
    }

    fn cell(&self, qualifier: &str, timestamp: i64, value: &str) -> Cell {
        Cell {
            family: self.config.column_family.clone(),
            qualifier: qualifier.to_string(),
            timestamp,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AugmentedColumn;

    fn generator(salt_row_keys: bool) -> MutationGenerator {
        MutationGenerator::new(MutationConfig {
            salt_row_keys,
            ..MutationConfig::default()
        })
    }

    fn column(name: &str, before: Option<&str>, after: Option<&str>) -> AugmentedColumn {
        AugmentedColumn {
            name: name.to_string(),
            before: before.map(str::to_string),
            after: after.map(str::to_string),
        }
    }

    fn row(event_type: RowEventType, columns: Vec<AugmentedColumn>) -> AugmentedRow {
        AugmentedRow {
            event_type,
            schema_name: "Shop".to_string(),
            table_name: "Orders".to_string(),
            original_table_name: None,
            is_payload: false,
            primary_key_columns: vec!["id".to_string()],
            columns,
            transaction_uuid: Some("uuid-1".to_string()),
            transaction_xid: Some(42),
            commit_timestamp: 1_700_000_000,
            transaction_sequence_number: 3,
            version_timestamp: 1_700_000_000_003,
        }
    }

    fn written(mutation: &Mutation) -> Vec<(&str, &str)> {
        mutation
            .cells
            .iter()
            .map(|cell| (cell.qualifier.as_str(), cell.value.as_str()))
            .collect()
    }

    #[test]
    fn test_update_writes_changed_columns_only() {
        let row = row(
            RowEventType::Update,
            vec![
                column("id", Some("7"), Some("7")),
                column("a", None, Some("5")),
                column("b", Some("5"), None),
                column("c", None, None),
                column("d", Some("5"), Some("6")),
            ],
        );

        let mutation = generator(false).generate(&row).unwrap();

        assert_eq!(
            written(&mutation),
            vec![
                ("a", "5"),
                ("b", "NULL"),
                ("d", "6"),
                ("row_status", "U"),
                ("_transaction_uuid", "uuid-1"),
                ("_transaction_xid", "42"),
            ]
        );
        assert!(mutation.cells.iter().all(|cell| cell.family == "d"));
        assert!(mutation.cells.iter().all(|cell| cell.timestamp == 1_700_000_000_003));
    }

    #[test]
    fn test_insert_writes_every_column() {
        let row = row(
            RowEventType::Insert,
            vec![column("id", None, Some("7")), column("note", None, None)],
        );

        let mutation = generator(false).generate(&row).unwrap();

        assert_eq!(
            written(&mutation),
            vec![
                ("id", "7"),
                ("note", "NULL"),
                ("row_status", "I"),
                ("_transaction_uuid", "uuid-1"),
                ("_transaction_xid", "42"),
            ]
        );
    }

    #[test]
    fn test_delete_writes_marker_and_present_ids() {
        let mut row = row(RowEventType::Delete, vec![column("id", Some("7"), None)]);

        let mutation = generator(false).generate(&row).unwrap();
        assert_eq!(
            written(&mutation),
            vec![("row_status", "D"), ("_transaction_uuid", "uuid-1"), ("_transaction_xid", "42")]
        );
        assert_eq!(mutation.source_row_uri.as_deref(), Some("mysql://shop/Orders?id=7"));

        row.transaction_uuid = None;
        row.transaction_xid = None;
        let mutation = generator(false).generate(&row).unwrap();
        assert_eq!(written(&mutation), vec![("row_status", "D")]);
    }

    #[test]
    fn test_table_names_and_uris() {
        let generator = MutationGenerator::new(MutationConfig {
            namespace: Some("Replica".to_string()),
            shard_name: Some("shard-01".to_string()),
            ..MutationConfig::default()
        });
        let mut row = row(
            RowEventType::Insert,
            vec![column("id", None, Some("a b&c"))],
        );
        row.table_name = "OrderContext".to_string();
        row.original_table_name = Some("order_payload".to_string());

        let mutation = generator.generate(&row).unwrap();

        assert_eq!(mutation.table, "replica:ordercontext");
        assert_eq!(
            mutation.source_row_uri.as_deref(),
            Some("mysql://shard-01/order_payload?id=a+b%26c")
        );
        let expected_key = format!("{};a b&c", crate::augment::row_key::salt("a b&c"));
        assert_eq!(mutation.row_key, expected_key);
        assert_eq!(
            mutation.target_row_uri.as_deref(),
            Some(
                format!(
                    "hbase://hbase-cluster/replica:ordercontext?row={}%3Ba+b%26c&cf=d",
                    crate::augment::row_key::salt("a b&c")
                )
                .as_str()
            )
        );
    }
}
