//! Server-side named locks (`GET_LOCK`), used for leader election.
//!
//! A named lock belongs to the session that acquired it, so every function here takes
//! the one connection that holds, or will hold, the lock.

use std::time::Duration;

use sqlx::MySqlConnection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `GET_LOCK` returned `NULL`, e.g. the session was killed while waiting.
    #[error("lock `{0}` could not be requested")]
    RequestFailed(String),
}

/// Waits up to `timeout` for the lock. Returns `false` if another session kept it.
pub async fn acquire_lock(
    connection: &mut MySqlConnection,
    name: &str,
    timeout: Duration,
) -> Result<bool, LockError> {
    let acquired: Option<i64> = sqlx::query_scalar("SELECT CAST(GET_LOCK(?, ?) AS SIGNED)")
        .bind(name)
        .bind(timeout.as_secs() as i64)
        .fetch_one(&mut *connection)
        .await?;

    match acquired {
        Some(acquired) => Ok(acquired == 1),
        None => Err(LockError::RequestFailed(name.to_string())),
    }
}

/// Releases the lock if this session holds it. Returns whether a lock was released.
pub async fn release_lock(connection: &mut MySqlConnection, name: &str) -> Result<bool, LockError> {
    let released: Option<i64> = sqlx::query_scalar("SELECT CAST(RELEASE_LOCK(?) AS SIGNED)")
        .bind(name)
        .fetch_one(&mut *connection)
        .await?;

    Ok(released == Some(1))
}

/// Whether the lock is currently held by this very session.
pub async fn holds_lock(connection: &mut MySqlConnection, name: &str) -> Result<bool, LockError> {
    let holder: Option<i64> = sqlx::query_scalar("SELECT CAST(IS_USED_LOCK(?) AS SIGNED)")
        .bind(name)
        .fetch_one(&mut *connection)
        .await?;
    let session: i64 = sqlx::query_scalar("SELECT CAST(CONNECTION_ID() AS SIGNED)")
        .fetch_one(&mut *connection)
        .await?;

    Ok(holder == Some(session))
}
