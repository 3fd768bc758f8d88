use cdc_config::shared::MySqlConnectionConfig;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

/// Connects a pool to the database named in `config`.
pub async fn connect_to_database(config: &MySqlConnectionConfig) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .connect_with(config.with_db())
        .await
}

/// Connects a pool without selecting a database.
pub async fn connect_to_server(config: &MySqlConnectionConfig) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.without_db())
        .await
}
