//! Schema introspection against the active schema database.

use sqlx::{Executor, MySql, MySqlPool, Row};
use thiserror::Error;
use tracing::debug;

use crate::types::{ColumnKey, ColumnSchema, DataType, TableName};

/// Errors raised by schema introspection and DDL execution.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unexpected SHOW CREATE TABLE result for {table}: {reason}")]
    UnexpectedCreateTable { table: String, reason: String },
}

/// One row per column of the table, ordered by ordinal position.
///
/// Unsigned and text-like metadata columns are cast so they decode the same way on
/// MySQL 5.7 and 8.x.
const LIST_COLUMNS_QUERY: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR) AS column_name,
        CAST(COLUMN_TYPE AS CHAR) AS column_type,
        CAST(COLLATION_NAME AS CHAR) AS collation_name,
        CAST(IS_NULLABLE AS CHAR) AS is_nullable,
        CAST(COLUMN_KEY AS CHAR) AS column_key,
        CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
        CAST(EXTRA AS CHAR) AS extra,
        CAST(DATA_TYPE AS CHAR) AS data_type,
        CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS character_maximum_length,
        CAST(CHARACTER_OCTET_LENGTH AS SIGNED) AS character_octet_length,
        CAST(NUMERIC_PRECISION AS SIGNED) AS numeric_precision,
        CAST(NUMERIC_SCALE AS SIGNED) AS numeric_scale,
        CAST(DATETIME_PRECISION AS SIGNED) AS datetime_precision
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const TABLE_EXISTS_QUERY: &str = r#"
    SELECT COUNT(*) AS table_count
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
"#;

/// Lists the columns of `table`. A missing table yields an empty list.
///
/// `enum_values` and `set_values` are left empty, they are derived from `column_type`
/// by the caller.
pub async fn list_columns(
    pool: &MySqlPool,
    table: &TableName,
) -> Result<Vec<ColumnSchema>, SchemaError> {
    let rows = sqlx::query(LIST_COLUMNS_QUERY)
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_all(pool)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let data_type: String = row.try_get("data_type")?;
        let is_nullable: String = row.try_get("is_nullable")?;
        let column_key: String = row.try_get("column_key")?;
        let extra: Option<String> = row.try_get("extra")?;

        columns.push(ColumnSchema {
            name: row.try_get("column_name")?,
            data_type: DataType::parse(&data_type),
            column_type: row.try_get("column_type")?,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
            key: ColumnKey::parse(&column_key),
            extra: extra.unwrap_or_default(),
            collation: row.try_get("collation_name")?,
            default: row.try_get("column_default")?,
            character_maximum_length: row.try_get("character_maximum_length")?,
            character_octet_length: row.try_get("character_octet_length")?,
            numeric_precision: row.try_get("numeric_precision")?,
            numeric_scale: row.try_get("numeric_scale")?,
            datetime_precision: row.try_get("datetime_precision")?,
            enum_values: Vec::new(),
            set_values: Vec::new(),
        });
    }

    debug!(%table, columns = columns.len(), "listed table columns");

    Ok(columns)
}

pub async fn table_exists(pool: &MySqlPool, table: &TableName) -> Result<bool, SchemaError> {
    let count: i64 = sqlx::query_scalar(TABLE_EXISTS_QUERY)
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

/// Returns the `CREATE TABLE` statement of `table`, or `None` if the table does not exist.
///
/// Checking existence first keeps a reload after `DROP TABLE` from failing.
pub async fn show_create_table(
    pool: &MySqlPool,
    table: &TableName,
) -> Result<Option<String>, SchemaError> {
    if !table_exists(pool, table).await? {
        return Ok(None);
    }

    let query = format!("SHOW CREATE TABLE {}", table.as_quoted_identifier());
    let row = sqlx::query(&query).fetch_one(pool).await?;

    if row.columns().len() != 2 {
        return Err(SchemaError::UnexpectedCreateTable {
            table: table.to_string(),
            reason: format!("expected 2 columns, got {}", row.columns().len()),
        });
    }

    let returned_name: String = row.try_get(0)?;
    if returned_name != table.name {
        return Err(SchemaError::UnexpectedCreateTable {
            table: table.to_string(),
            reason: format!("result describes table `{returned_name}`"),
        });
    }

    Ok(Some(row.try_get(1)?))
}

/// Runs a statement over the text protocol, so statements MySQL refuses to prepare
/// (most DDL) are accepted.
pub async fn execute<'c, E>(executor: E, statement: &'c str) -> Result<u64, SchemaError>
where
    E: Executor<'c, Database = MySql>,
{
    let result = sqlx::raw_sql(statement).execute(executor).await?;

    Ok(result.rows_affected())
}

pub async fn create_database_if_not_exists(
    pool: &MySqlPool,
    database: &str,
) -> Result<(), SchemaError> {
    let statement = format!(
        "CREATE DATABASE IF NOT EXISTS `{}`",
        database.replace('`', "``")
    );
    execute(pool, &statement).await?;

    Ok(())
}
