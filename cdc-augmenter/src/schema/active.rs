use cdc_config::shared::ActiveSchemaConfig;
use cdc_mysql::replication::db::{connect_to_database, connect_to_server};
use cdc_mysql::replication::schema::{
    create_database_if_not_exists, execute, list_columns, show_create_table,
};
use cdc_mysql::types::{DataType, TableName, TableSchema, parse_member_list};
use regex::Regex;
use sqlx::MySqlPool;
use tracing::{debug, info};

use crate::error::{CdcResult, ErrorKind};
use crate::schema::SchemaSource;
use crate::schema::ddl::rewrite_schema_name;
use crate::{bail, cdc_error};

/// [`SchemaSource`] backed by the active schema database.
///
/// The active schema is a MySQL database holding an empty copy of every replicated
/// table. Replicated DDL is replayed into it, so at any point of the stream its
/// `INFORMATION_SCHEMA` describes the tables as the source had them at that point.
#[derive(Debug, Clone)]
pub struct ActiveSchemaSource {
    pool: MySqlPool,
    database: String,
    enum_pattern: Regex,
    set_pattern: Regex,
}

impl ActiveSchemaSource {
    /// Connects to the active schema, creating its database if needed.
    pub async fn connect(config: &ActiveSchemaConfig) -> CdcResult<Self> {
        let database = config.connection.name.clone();

        let server = connect_to_server(&config.connection).await.map_err(|err| {
            cdc_error!(
                ErrorKind::SourceConnectionFailed,
                "Failed to connect to the active schema server",
                format!("{}:{}", config.connection.host, config.connection.port),
                source: err
            )
        })?;
        create_database_if_not_exists(&server, &database).await?;
        server.close().await;

        let pool = connect_to_database(&config.connection).await.map_err(|err| {
            cdc_error!(
                ErrorKind::SourceConnectionFailed,
                "Failed to connect to the active schema database",
                database.clone(),
                source: err
            )
        })?;

        info!(database, "connected to the active schema");

        Self::new(pool, database, &config.enum_pattern, &config.set_pattern)
    }

    pub fn new(
        pool: MySqlPool,
        database: impl Into<String>,
        enum_pattern: &str,
        set_pattern: &str,
    ) -> CdcResult<Self> {
        let database = database.into();
        if database.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "The active schema database name must not be empty"
            );
        }

        Ok(Self {
            pool,
            database,
            enum_pattern: Regex::new(enum_pattern)?,
            set_pattern: Regex::new(set_pattern)?,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Name of the mirror of `table` in the active schema.
    fn active_table(&self, table: &TableName) -> TableName {
        TableName::new(self.database.clone(), table.name.clone())
    }

    fn members(&self, pattern: &Regex, column_type: &str) -> Vec<String> {
        pattern
            .captures(column_type)
            .and_then(|captures| captures.get(1))
            .map(|members| parse_member_list(members.as_str()))
            .unwrap_or_default()
    }
}

impl SchemaSource for ActiveSchemaSource {
    async fn compute_table_schema(&self, table: &TableName) -> CdcResult<Option<TableSchema>> {
        let active_table = self.active_table(table);

        let mut column_schemas = list_columns(&self.pool, &active_table).await?;
        if column_schemas.is_empty() {
            return Ok(None);
        }

        for column in column_schemas.iter_mut() {
            match column.data_type {
                DataType::Enum => {
                    column.enum_values = self.members(&self.enum_pattern, &column.column_type);
                }
                DataType::Set => {
                    column.set_values = self.members(&self.set_pattern, &column.column_type);
                }
                _ => {}
            }
        }

        let create_statement = show_create_table(&self.pool, &active_table)
            .await?
            .unwrap_or_default();

        Ok(Some(TableSchema::new(
            table.clone(),
            column_schemas,
            create_statement,
        )))
    }

    async fn execute(&self, database: &str, statement: &str) -> CdcResult<()> {
        let statement = rewrite_schema_name(statement, database, &self.database);
        let rows_affected = execute(&self.pool, &statement).await?;

        debug!(database, rows_affected, "executed statement on the active schema");

        Ok(())
    }
}
