use std::time::Duration;

use serde::Deserialize;

use crate::shared::base::require_non_empty;
use crate::shared::{MySqlConnectionConfig, ValidationError};

/// How the replicator competes for leadership.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeaderElectionConfig {
    /// Single-process group, the only member is always granted leadership.
    Memory,
    /// Server-side named lock (`GET_LOCK`) held on a dedicated connection.
    #[serde(rename = "mysql")]
    MySql {
        connection: MySqlConnectionConfig,
        #[serde(default = "default_lock_name")]
        lock_name: String,
        /// Interval between checks that the held lock still belongs to this session.
        #[serde(default = "default_check_interval_ms")]
        check_interval_ms: u64,
    },
}

/// Leader coordination settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    pub election: LeaderElectionConfig,
    /// Delay before competing again after a term ended or failed to start.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl CoordinatorConfig {
    pub const DEFAULT_LOCK_NAME: &'static str = "mysql_replicator_leader";
    pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 1_000;
    pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 5_000;

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let LeaderElectionConfig::MySql {
            connection,
            lock_name,
            check_interval_ms,
        } = &self.election
        {
            connection.validate("coordinator.election.connection")?;
            require_non_empty("coordinator.election.lock_name", lock_name)?;

            // MySQL rejects lock names longer than 64 characters.
            if lock_name.len() > 64 {
                return Err(ValidationError::invalid(
                    "coordinator.election.lock_name",
                    "must be at most 64 characters",
                ));
            }
            if *check_interval_ms == 0 {
                return Err(ValidationError::invalid(
                    "coordinator.election.check_interval_ms",
                    "must be greater than 0",
                ));
            }
        }

        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            election: LeaderElectionConfig::Memory,
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

fn default_lock_name() -> String {
    CoordinatorConfig::DEFAULT_LOCK_NAME.to_string()
}

fn default_check_interval_ms() -> u64 {
    CoordinatorConfig::DEFAULT_CHECK_INTERVAL_MS
}

fn default_retry_interval_ms() -> u64 {
    CoordinatorConfig::DEFAULT_RETRY_INTERVAL_MS
}
