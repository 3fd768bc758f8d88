use std::collections::HashMap;
use std::sync::Arc;

use cdc_mysql::types::{ColumnKey, ColumnSchema, DataType, TableName, TableSchema};
use parking_lot::Mutex;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::schema::SchemaSource;

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, TableSchema>,
    executed: Vec<(String, String)>,
    failing_executes: usize,
}

/// [`SchemaSource`] backed by a map the test edits directly.
///
/// Executed statements are recorded but not interpreted, so a test changing a table
/// through DDL sets the resulting schema itself.
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaSource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table(&self, schema: TableSchema) {
        self.inner.lock().tables.insert(schema.name.clone(), schema);
    }

    pub fn drop_table(&self, table: &TableName) {
        self.inner.lock().tables.remove(table);
    }

    /// Makes the next `count` executed statements fail.
    pub fn fail_next_executes(&self, count: usize) {
        self.inner.lock().failing_executes = count;
    }

    /// `(database, statement)` pairs executed successfully, in order.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.inner.lock().executed.clone()
    }
}

impl SchemaSource for MemorySchemaSource {
    async fn compute_table_schema(&self, table: &TableName) -> CdcResult<Option<TableSchema>> {
        Ok(self.inner.lock().tables.get(table).cloned())
    }

    async fn execute(&self, database: &str, statement: &str) -> CdcResult<()> {
        let mut inner = self.inner.lock();
        if inner.failing_executes > 0 {
            inner.failing_executes -= 1;
            bail!(
                ErrorKind::SourceQueryFailed,
                "Injected DDL failure",
                statement.to_string()
            );
        }

        inner
            .executed
            .push((database.to_string(), statement.to_string()));

        Ok(())
    }
}

/// `shop.orders (id int primary key, price decimal(10,2), status varchar(16) null)`.
pub fn orders_schema() -> TableSchema {
    TableSchema::new(
        TableName::new("shop", "orders"),
        vec![
            ColumnSchema::new("id", DataType::Int, "int(11)").with_key(ColumnKey::Primary),
            ColumnSchema::new("price", DataType::Decimal, "decimal(10,2)"),
            ColumnSchema::new("status", DataType::VarChar, "varchar(16)"),
        ],
        "CREATE TABLE `orders` (\n  `id` int(11) NOT NULL,\n  `price` decimal(10,2),\n  `status` varchar(16),\n  PRIMARY KEY (`id`)\n)".to_string(),
    )
}
