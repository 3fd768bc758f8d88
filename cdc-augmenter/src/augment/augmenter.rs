use cdc_config::shared::PayloadTableConfig;
use cdc_mysql::types::{ColumnSchema, TableSchema};
use tracing::warn;

use crate::augment::convert::value_to_string;
use crate::error::CdcResult;
use crate::schema::{SchemaCache, SchemaSource};
use crate::types::{AugmentedColumn, AugmentedRow, RawChangeEvent, RawValue, RowEventType};

/// Combines raw row events with the current schema of their table.
#[derive(Debug, Clone)]
pub struct RowAugmenter<S> {
    schema_cache: SchemaCache<S>,
    payload_table: Option<PayloadTableConfig>,
}

impl<S> RowAugmenter<S>
where
    S: SchemaSource + Send + Sync,
{
    pub fn new(schema_cache: SchemaCache<S>, payload_table: Option<PayloadTableConfig>) -> Self {
        Self {
            schema_cache,
            payload_table,
        }
    }

    pub fn schema_cache(&self) -> &SchemaCache<S> {
        &self.schema_cache
    }

    /// Builds the augmented row of `event`, without transaction metadata.
    ///
    /// Returns `None` when the row cannot be interpreted: its table has no schema (it
    /// may have been dropped further down the stream), its images do not match the
    /// column count, or a value does not fit its column.
    pub async fn apply(&self, event: &RawChangeEvent) -> Option<AugmentedRow> {
        let Some(schema) = self.schema_cache.get(&event.table).await else {
            warn!(table = %event.table, event_type = %event.event_type, "no schema for row event, skipping");

            return None;
        };

        let expected = schema.num_columns();
        let images_match = match event.event_type {
            RowEventType::Insert => event.after.len() == expected,
            RowEventType::Update => event.before.len() == expected && event.after.len() == expected,
            RowEventType::Delete => event.before.len() == expected,
        };
        if !images_match {
            warn!(
                table = %event.table,
                event_type = %event.event_type,
                columns = expected,
                before = event.before.len(),
                after = event.after.len(),
                "row image does not match table schema, skipping"
            );

            return None;
        }

        let columns = match build_columns(&schema, event) {
            Ok(columns) => columns,
            Err(err) => {
                warn!(table = %event.table, error = %err, "failed to convert row values, skipping");

                return None;
            }
        };

        let (table_name, original_table_name, is_payload) = match &self.payload_table {
            Some(payload) if payload.name == event.table.name => {
                let logical_name = payload.logical_name().to_string();
                let original = (logical_name != event.table.name).then(|| event.table.name.clone());

                (logical_name, original, true)
            }
            _ => (event.table.name.clone(), None, false),
        };

        Some(AugmentedRow {
            event_type: event.event_type,
            schema_name: event.table.schema.clone(),
            table_name,
            original_table_name,
            is_payload,
            primary_key_columns: schema.primary_key_columns(),
            columns,
            transaction_uuid: None,
            transaction_xid: None,
            commit_timestamp: 0,
            transaction_sequence_number: 0,
            version_timestamp: 0,
        })
    }
}

fn build_columns(
    schema: &TableSchema,
    event: &RawChangeEvent,
) -> CdcResult<Vec<AugmentedColumn>> {
    let mut columns = Vec::with_capacity(schema.num_columns());

    for (index, column) in schema.column_schemas.iter().enumerate() {
        let augmented = match event.event_type {
            // Deletes only carry what identifies the row.
            RowEventType::Delete => {
                if !column.is_primary() {
                    continue;
                }
                AugmentedColumn {
                    name: column.name.clone(),
                    before: render(column, event.before.get(index))?,
                    after: None,
                }
            }
            RowEventType::Update => AugmentedColumn {
                name: column.name.clone(),
                before: render(column, event.before.get(index))?,
                after: render(column, event.after.get(index))?,
            },
            RowEventType::Insert => AugmentedColumn {
                name: column.name.clone(),
                before: None,
                after: render(column, event.after.get(index))?,
            },
        };

        columns.push(augmented);
    }

    Ok(columns)
}

/// Values absent from a partial row image render like `NULL`.
fn render(
    column: &ColumnSchema,
    value: Option<&Option<RawValue>>,
) -> CdcResult<Option<String>> {
    match value {
        Some(Some(value)) => value_to_string(column, value),
        _ => Ok(None),
    }
}
