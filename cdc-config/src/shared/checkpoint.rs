use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

/// Binlog coordinates: file name plus byte offset within it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinlogPositionConfig {
    pub filename: String,
    pub position: u64,
}

/// A replication start position given by binlog coordinates, a GTID set, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StartPositionConfig {
    #[serde(default)]
    pub binlog: Option<BinlogPositionConfig>,
    #[serde(default)]
    pub gtid_set: Option<String>,
}

impl StartPositionConfig {
    fn validate(&self, field: &str) -> Result<(), ValidationError> {
        if self.binlog.is_none() && self.gtid_set.is_none() {
            return Err(ValidationError::invalid(
                field,
                "must set `binlog`, `gtid_set` or both",
            ));
        }

        if let Some(binlog) = &self.binlog {
            require_non_empty(&format!("{field}.binlog.filename"), &binlog.filename)?;
        }
        if let Some(gtid_set) = &self.gtid_set {
            require_non_empty(&format!("{field}.gtid_set"), gtid_set)?;
        }

        Ok(())
    }
}

/// Durable checkpoint settings.
///
/// On leadership take the start position is resolved as `start_override`, then the
/// stored checkpoint at `path`, then `default`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CheckpointConfig {
    #[serde(default = "default_path")]
    pub path: String,
    /// Used when nothing is stored at `path` yet.
    #[serde(default)]
    pub default: Option<StartPositionConfig>,
    /// Forces the next leadership term to start here regardless of the stored checkpoint.
    #[serde(default)]
    pub start_override: Option<StartPositionConfig>,
}

impl CheckpointConfig {
    pub const DEFAULT_PATH: &'static str = "checkpoint.json";

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("checkpoint.path", &self.path)?;

        if let Some(default) = &self.default {
            default.validate("checkpoint.default")?;
        }
        if let Some(start_override) = &self.start_override {
            start_override.validate("checkpoint.start_override")?;
        }

        Ok(())
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            default: None,
            start_override: None,
        }
    }
}

fn default_path() -> String {
    CheckpointConfig::DEFAULT_PATH.to_string()
}
