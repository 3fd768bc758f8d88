use std::collections::HashMap;
use std::sync::Arc;

use cdc_mysql::types::{TableName, TableSchema};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::schema::SchemaSource;

#[derive(Debug, Default)]
struct CacheEntry {
    schema: Option<Arc<TableSchema>>,
    /// Bumped on every invalidation. A computation only publishes its result if the
    /// generation it started from is still current.
    generation: u64,
}

#[derive(Debug)]
struct Inner<S> {
    source: S,
    entries: RwLock<HashMap<TableName, CacheEntry>>,
    ddl_locks: Mutex<HashMap<TableName, Arc<AsyncMutex<()>>>>,
}

/// Concurrent cache of table schemas in front of a [`SchemaSource`].
///
/// Lookups for different tables never block each other and a miss computes the schema
/// without holding any cache lock. DDL on a table holds that table's DDL lock while the
/// statement runs and the entry is invalidated, so a schema computed before the DDL can
/// never be cached after it.
#[derive(Debug)]
pub struct SchemaCache<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SchemaCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> SchemaCache<S>
where
    S: SchemaSource + Send + Sync,
{
    pub fn new(source: S) -> Self {
        let inner = Inner {
            source,
            entries: RwLock::new(HashMap::new()),
            ddl_locks: Mutex::new(HashMap::new()),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    /// Returns the schema of `table`, computing and caching it on a miss.
    ///
    /// Missing tables and failed computations yield `None` and are not cached, so the
    /// next lookup tries again.
    pub async fn get(&self, table: &TableName) -> Option<Arc<TableSchema>> {
        if let Some(schema) = self.cached(table) {
            return Some(schema);
        }

        let generation = {
            let mut entries = self.inner.entries.write();
            let entry = entries.entry(table.clone()).or_default();
            if let Some(schema) = &entry.schema {
                return Some(schema.clone());
            }

            entry.generation
        };

        match self.inner.source.compute_table_schema(table).await {
            Ok(Some(schema)) => {
                let schema = Arc::new(schema);

                let mut entries = self.inner.entries.write();
                match entries.get_mut(table) {
                    Some(entry) if entry.generation == generation => {
                        entry.schema = Some(schema.clone());
                        debug!(%table, columns = schema.num_columns(), "cached table schema");
                    }
                    _ => {
                        debug!(%table, "table invalidated while computing its schema, not caching");
                    }
                }

                Some(schema)
            }
            Ok(None) => {
                debug!(%table, "table not found in the active schema");

                None
            }
            Err(err) => {
                warn!(%table, error = %err, "failed to compute table schema");

                None
            }
        }
    }

    /// Returns the cached schema of `table` without computing it.
    pub fn cached(&self, table: &TableName) -> Option<Arc<TableSchema>> {
        let entries = self.inner.entries.read();

        entries.get(table).and_then(|entry| entry.schema.clone())
    }

    /// Drops the cached schema of `table`. Computations in flight will not cache.
    pub fn invalidate(&self, table: &TableName) {
        let mut entries = self.inner.entries.write();
        let entry = entries.entry(table.clone()).or_default();
        entry.schema = None;
        entry.generation = entry.generation.wrapping_add(1);
    }

    /// Invalidates `table` and computes its schema again.
    pub async fn reload_after_ddl(&self, table: &TableName) -> Option<Arc<TableSchema>> {
        {
            let _guard = self.ddl_lock(table).lock_owned().await;
            self.invalidate(table);
        }

        self.get(table).await
    }

    /// Executes a replicated DDL statement and refreshes the tables it affects.
    ///
    /// Returns `false` when the statement failed. The cache is left untouched in that
    /// case since the active schema did not change.
    pub async fn execute_ddl(&self, database: &str, tables: &[TableName], statement: &str) -> bool {
        let mut affected = tables.to_vec();
        affected.sort();
        affected.dedup();

        {
            // Locks are taken in table order so concurrent multi-table DDL cannot deadlock.
            let mut guards: Vec<OwnedMutexGuard<()>> = Vec::with_capacity(affected.len());
            for table in &affected {
                guards.push(self.ddl_lock(table).lock_owned().await);
            }

            if let Err(err) = self.inner.source.execute(database, statement).await {
                warn!(database, statement, error = %err, "failed to apply DDL to the active schema");

                return false;
            }

            for table in &affected {
                self.invalidate(table);
            }
        }

        info!(database, tables = affected.len(), "applied DDL to the active schema");

        for table in &affected {
            self.get(table).await;
        }

        true
    }

    fn ddl_lock(&self, table: &TableName) -> Arc<AsyncMutex<()>> {
        let mut ddl_locks = self.inner.ddl_locks.lock();

        ddl_locks
            .entry(table.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cdc_mysql::types::{ColumnKey, ColumnSchema, DataType};
    use tokio::sync::Notify;

    use super::*;
    use crate::error::{CdcResult, ErrorKind};

    #[derive(Debug, Default)]
    struct GatedSource {
        tables: Mutex<HashMap<TableName, TableSchema>>,
        computations: AtomicUsize,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
        /// Restricts the gate to one table. Every table is gated without it.
        gated_table: Option<TableName>,
        fail_execute: bool,
    }

    impl SchemaSource for GatedSource {
        async fn compute_table_schema(&self, table: &TableName) -> CdcResult<Option<TableSchema>> {
            self.computations.fetch_add(1, Ordering::SeqCst);
            let schema = self.tables.lock().get(table).cloned();

            let gated = self.gated_table.as_ref().is_none_or(|gated| gated == table);
            if let Some((entered, release)) = &self.gate
                && gated
            {
                entered.notify_one();
                release.notified().await;
            }

            Ok(schema)
        }

        async fn execute(&self, _database: &str, statement: &str) -> CdcResult<()> {
            if self.fail_execute {
                crate::bail!(ErrorKind::SourceQueryFailed, "Statement failed", statement.to_string());
            }

            Ok(())
        }
    }

    fn orders(columns: usize) -> TableSchema {
        let mut column_schemas =
            vec![ColumnSchema::new("id", DataType::Int, "int").with_key(ColumnKey::Primary)];
        for i in 1..columns {
            column_schemas.push(ColumnSchema::new(format!("c{i}"), DataType::VarChar, "varchar(32)"));
        }

        TableSchema::new(TableName::new("shop", "orders"), column_schemas, String::new())
    }

    fn source_with(schema: TableSchema) -> GatedSource {
        let source = GatedSource::default();
        source.tables.lock().insert(schema.name.clone(), schema);
        source
    }

    #[tokio::test]
    async fn test_get_caches_computed_schema() {
        let table = TableName::new("shop", "orders");
        let cache = SchemaCache::new(source_with(orders(2)));

        assert_eq!(cache.get(&table).await.unwrap().num_columns(), 2);
        assert_eq!(cache.get(&table).await.unwrap().num_columns(), 2);
        assert_eq!(cache.source().computations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_not_cached() {
        let table = TableName::new("shop", "orders");
        let cache = SchemaCache::new(GatedSource::default());

        assert!(cache.get(&table).await.is_none());
        cache.source().tables.lock().insert(table.clone(), orders(3));
        assert_eq!(cache.get(&table).await.unwrap().num_columns(), 3);
        assert_eq!(cache.source().computations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidation_during_computation_is_not_cached() {
        let table = TableName::new("shop", "orders");
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut source = source_with(orders(2));
        source.gate = Some((entered.clone(), release.clone()));
        let cache = SchemaCache::new(source);

        let lookup = tokio::spawn({
            let cache = cache.clone();
            let table = table.clone();
            async move { cache.get(&table).await }
        });

        entered.notified().await;
        cache.source().tables.lock().insert(table.clone(), orders(3));
        cache.invalidate(&table);
        release.notify_one();

        // The stale schema is handed to the caller but never published.
        assert_eq!(lookup.await.unwrap().unwrap().num_columns(), 2);
        assert!(cache.cached(&table).is_none());
    }

    #[tokio::test]
    async fn test_execute_ddl_refreshes_affected_tables() {
        let table = TableName::new("shop", "orders");
        let cache = SchemaCache::new(source_with(orders(2)));
        cache.get(&table).await;

        cache.source().tables.lock().insert(table.clone(), orders(4));
        assert!(
            cache
                .execute_ddl("shop", &[table.clone()], "ALTER TABLE orders ADD c2 INT, ADD c3 INT")
                .await
        );

        assert_eq!(cache.cached(&table).unwrap().num_columns(), 4);
        assert_eq!(cache.reload_after_ddl(&table).await.unwrap().num_columns(), 4);
    }

    #[tokio::test]
    async fn test_failed_ddl_keeps_cache() {
        let table = TableName::new("shop", "orders");
        let mut source = source_with(orders(2));
        source.fail_execute = true;
        let cache = SchemaCache::new(source);
        cache.get(&table).await;

        assert!(!cache.execute_ddl("shop", &[table.clone()], "ALTER TABLE orders BROKEN").await);
        assert_eq!(cache.cached(&table).unwrap().num_columns(), 2);
        assert_eq!(cache.source().computations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reload_is_not_blocked_by_lookup_of_another_table() {
        let orders_table = TableName::new("shop", "orders");
        let customers_table = TableName::new("shop", "customers");
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let mut source = source_with(orders(2));
        source.tables.lock().insert(
            customers_table.clone(),
            TableSchema::new(
                customers_table.clone(),
                vec![ColumnSchema::new("id", DataType::Int, "int").with_key(ColumnKey::Primary)],
                String::new(),
            ),
        );
        source.gate = Some((entered.clone(), release.clone()));
        source.gated_table = Some(customers_table.clone());
        let cache = SchemaCache::new(source);
        assert_eq!(cache.get(&orders_table).await.unwrap().num_columns(), 2);

        let lookup = tokio::spawn({
            let cache = cache.clone();
            let table = customers_table.clone();
            async move { cache.get(&table).await }
        });
        entered.notified().await;

        cache.source().tables.lock().insert(orders_table.clone(), orders(3));
        let reloaded = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            cache.reload_after_ddl(&orders_table),
        )
        .await
        .unwrap();
        assert_eq!(reloaded.unwrap().num_columns(), 3);
        assert_eq!(cache.get(&orders_table).await.unwrap().num_columns(), 3);

        release.notify_one();
        assert_eq!(lookup.await.unwrap().unwrap().num_columns(), 1);
        assert_eq!(cache.cached(&customers_table).unwrap().num_columns(), 1);
    }
}
