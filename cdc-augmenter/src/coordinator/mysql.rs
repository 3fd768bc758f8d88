use std::time::Duration;

use cdc_config::shared::MySqlConnectionConfig;
use cdc_mysql::replication::db::connect_to_server;
use cdc_mysql::replication::lock::{acquire_lock, holds_lock, release_lock};
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlPool};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cdc_error;
use crate::coordinator::LeaderElection;
use crate::error::{CdcResult, ErrorKind};

/// Election through a MySQL named lock.
///
/// The lock is bound to the session that took it, so the session is kept on a
/// dedicated connection for the whole term. If that session dies the server
/// releases the lock, which the periodic check reports as a loss.
#[derive(Debug)]
pub struct MySqlLeaderElection {
    pool: MySqlPool,
    lock_name: String,
    check_interval: Duration,
    session: Mutex<Option<PoolConnection<MySql>>>,
}

impl MySqlLeaderElection {
    pub async fn connect(
        config: &MySqlConnectionConfig,
        lock_name: impl Into<String>,
        check_interval: Duration,
    ) -> CdcResult<Self> {
        let pool = connect_to_server(config).await.map_err(|err| {
            cdc_error!(
                ErrorKind::LeaderElectionFailed,
                "Failed to connect to the election server",
                format!("{}:{}", config.host, config.port),
                source: err
            )
        })?;

        Ok(Self::new(pool, lock_name, check_interval))
    }

    pub fn new(pool: MySqlPool, lock_name: impl Into<String>, check_interval: Duration) -> Self {
        Self {
            pool,
            lock_name: lock_name.into(),
            check_interval,
            session: Mutex::new(None),
        }
    }

    pub fn lock_name(&self) -> &str {
        &self.lock_name
    }

    fn wait_timeout(&self) -> Duration {
        self.check_interval.max(Duration::from_secs(1))
    }
}

impl LeaderElection for MySqlLeaderElection {
    async fn acquire(&self) -> CdcResult<()> {
        let mut connection = self.pool.acquire().await.map_err(|err| {
            cdc_error!(
                ErrorKind::LeaderElectionFailed,
                "Failed to open the election session",
                source: err
            )
        })?;

        loop {
            if acquire_lock(&mut connection, &self.lock_name, self.wait_timeout()).await? {
                break;
            }

            debug!(lock_name = %self.lock_name, "election lock is held by another session");
        }

        info!(lock_name = %self.lock_name, "acquired election lock");
        *self.session.lock().await = Some(connection);

        Ok(())
    }

    async fn lost(&self) -> CdcResult<()> {
        loop {
            tokio::time::sleep(self.check_interval).await;

            let mut session = self.session.lock().await;
            let Some(connection) = session.as_mut() else {
                return Ok(());
            };

            match holds_lock(connection, &self.lock_name).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(lock_name = %self.lock_name, "election lock is no longer held by this session");
                    *session = None;

                    return Ok(());
                }
                Err(err) => {
                    // A broken session has lost its lock.
                    warn!(lock_name = %self.lock_name, error = %err, "election session failed");
                    if let Some(connection) = session.take() {
                        connection.detach();
                    }

                    return Ok(());
                }
            }
        }
    }

    async fn release(&self) -> CdcResult<()> {
        let Some(mut connection) = self.session.lock().await.take() else {
            return Ok(());
        };

        let released = release_lock(&mut connection, &self.lock_name).await?;
        debug!(lock_name = %self.lock_name, released, "released election lock");

        Ok(())
    }
}
