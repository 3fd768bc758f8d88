use cdc_mysql::types::{TableName, TableSchema};

use crate::error::CdcResult;

/// Introspects table schemas and applies replicated DDL to them.
///
/// [`SchemaSource`] implementations own the database mirroring the replicated tables.
/// They are only reached through [`crate::schema::SchemaCache`], which serializes DDL
/// against reloads of the same table.
pub trait SchemaSource {
    /// Reads the current schema of `table`.
    ///
    /// Returns `None` if the table does not exist.
    fn compute_table_schema(
        &self,
        table: &TableName,
    ) -> impl Future<Output = CdcResult<Option<TableSchema>>> + Send;

    /// Executes a DDL statement issued against `database` in the replicated stream.
    fn execute(
        &self,
        database: &str,
        statement: &str,
    ) -> impl Future<Output = CdcResult<()>> + Send;
}
