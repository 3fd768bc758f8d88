use serde::Deserialize;

use crate::Config;
use crate::shared::{
    ActiveSchemaConfig, CheckpointConfig, CoordinatorConfig, MutationConfig, PayloadTableConfig,
    TransactionBufferConfig, ValidationError,
};

/// Complete configuration of a replicator process.
///
/// Loaded once at startup with [`crate::load_config`] and validated with
/// [`ReplicatorConfig::validate`] before any component is constructed. Does not
/// implement `Serialize` because it holds connection secrets.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    pub active_schema: ActiveSchemaConfig,
    #[serde(default)]
    pub transaction: TransactionBufferConfig,
    #[serde(default)]
    pub mutation: MutationConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub payload_table: Option<PayloadTableConfig>,
}

impl ReplicatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.active_schema.validate()?;
        self.transaction.validate()?;
        self.mutation.validate()?;
        self.coordinator.validate()?;
        self.checkpoint.validate()?;

        if let Some(payload_table) = &self.payload_table {
            payload_table.validate()?;
        }

        Ok(())
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use crate::shared::{BufferKind, LeaderElectionConfig};

    use super::*;

    fn parse(json: &str) -> ReplicatorConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"{
                "active_schema": {
                    "connection": {"host": "db", "name": "active_schema", "username": "ro"}
                }
            }"#,
        );

        assert!(config.validate().is_ok());
        assert_eq!(config.transaction.kind, BufferKind::Vec);
        assert_eq!(config.transaction.size_limit, 1000);
        assert_eq!(config.mutation.column_family, "d");
        assert!(config.mutation.salt_row_keys);
        assert!(matches!(config.coordinator.election, LeaderElectionConfig::Memory));
        assert_eq!(config.checkpoint.path, "checkpoint.json");
    }

    #[test]
    fn test_mysql_election_and_overrides() {
        let config = parse(
            r#"{
                "active_schema": {
                    "connection": {"host": "db", "name": "active_schema", "username": "ro"}
                },
                "transaction": {"kind": "deque", "size_limit": 10},
                "coordinator": {
                    "election": {
                        "type": "mysql",
                        "connection": {"host": "db", "username": "coordinator"}
                    }
                },
                "checkpoint": {
                    "path": "/var/lib/replicator/checkpoint",
                    "start_override": {"gtid_set": "3e11fa47-71ca-11e1-9e33-c80aa9429562:1-5"}
                }
            }"#,
        );

        assert!(config.validate().is_ok());
        assert_eq!(config.transaction.kind, BufferKind::Deque);
        match &config.coordinator.election {
            LeaderElectionConfig::MySql { lock_name, .. } => {
                assert_eq!(lock_name, CoordinatorConfig::DEFAULT_LOCK_NAME)
            }
            LeaderElectionConfig::Memory => panic!("expected mysql election"),
        }
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = parse(
            r#"{
                "active_schema": {
                    "connection": {"host": "db", "name": "active_schema", "username": "ro"}
                },
                "transaction": {"size_limit": 0}
            }"#,
        );
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { ref field, .. }) if field == "transaction.size_limit"
        ));

        config.transaction.size_limit = 5;
        config.checkpoint.default = Some(Default::default());
        assert!(config.validate().is_err());
    }
}
