use serde::Deserialize;

use crate::shared::base::require_non_empty;
use crate::shared::{MySqlConnectionConfig, ValidationError};

/// The "active schema": a MySQL database kept in sync with the replicated DDL
/// and queried for column metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveSchemaConfig {
    pub connection: MySqlConnectionConfig,
    /// Regex whose first capture group holds the member list of an `enum(...)` column type.
    #[serde(default = "default_enum_pattern")]
    pub enum_pattern: String,
    /// Regex whose first capture group holds the member list of a `set(...)` column type.
    #[serde(default = "default_set_pattern")]
    pub set_pattern: String,
}

impl ActiveSchemaConfig {
    pub const DEFAULT_ENUM_PATTERN: &'static str = r"(?i)enum\((.*?)\)";

    pub const DEFAULT_SET_PATTERN: &'static str = r"(?i)set\((.*?)\)";

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate("active_schema.connection")?;
        require_non_empty("active_schema.connection.name", &self.connection.name)?;
        require_non_empty("active_schema.enum_pattern", &self.enum_pattern)?;
        require_non_empty("active_schema.set_pattern", &self.set_pattern)
    }
}

fn default_enum_pattern() -> String {
    ActiveSchemaConfig::DEFAULT_ENUM_PATTERN.to_string()
}

fn default_set_pattern() -> String {
    ActiveSchemaConfig::DEFAULT_SET_PATTERN.to_string()
}
