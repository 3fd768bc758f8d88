use cdc_config::shared::LeaderElectionConfig;

use crate::coordinator::{LeaderElection, LeaderGroup, MemoryLeaderElection, MySqlLeaderElection};
use crate::error::CdcResult;

/// Election selected through [`LeaderElectionConfig`].
#[derive(Debug)]
pub enum ConfiguredElection {
    Memory(MemoryLeaderElection),
    MySql(MySqlLeaderElection),
}

impl ConfiguredElection {
    /// Builds the configured election. Memory elections join a fresh group, so a lone
    /// instance is always elected.
    pub async fn from_config(config: &LeaderElectionConfig) -> CdcResult<Self> {
        match config {
            LeaderElectionConfig::Memory => Ok(Self::Memory(LeaderGroup::new().member())),
            LeaderElectionConfig::MySql {
                connection,
                lock_name,
                check_interval_ms,
            } => {
                let election = MySqlLeaderElection::connect(
                    connection,
                    lock_name.clone(),
                    std::time::Duration::from_millis(*check_interval_ms),
                )
                .await?;

                Ok(Self::MySql(election))
            }
        }
    }
}

impl LeaderElection for ConfiguredElection {
    async fn acquire(&self) -> CdcResult<()> {
        match self {
            Self::Memory(election) => election.acquire().await,
            Self::MySql(election) => election.acquire().await,
        }
    }

    async fn lost(&self) -> CdcResult<()> {
        match self {
            Self::Memory(election) => election.lost().await,
            Self::MySql(election) => election.lost().await,
        }
    }

    async fn release(&self) -> CdcResult<()> {
        match self {
            Self::Memory(election) => election.release().await,
            Self::MySql(election) => election.release().await,
        }
    }
}
