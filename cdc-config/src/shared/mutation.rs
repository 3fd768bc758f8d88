use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

/// Shape of the mutations produced for the target store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MutationConfig {
    /// Column family every cell is written under.
    #[serde(default = "default_column_family")]
    pub column_family: String,
    /// Target namespace, prefixed to table names as `namespace:table`.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Domain used in source row URIs instead of the lower-cased schema name.
    #[serde(default)]
    pub shard_name: Option<String>,
    #[serde(default = "default_target_scheme")]
    pub target_scheme: String,
    #[serde(default = "default_target_domain")]
    pub target_domain: String,
    /// Prefix row keys with an MD5-derived salt to spread monotonic keys.
    #[serde(default = "default_salt_row_keys")]
    pub salt_row_keys: bool,
    #[serde(default = "default_uuid_field")]
    pub uuid_field: String,
    #[serde(default = "default_xid_field")]
    pub xid_field: String,
}

impl MutationConfig {
    pub const DEFAULT_COLUMN_FAMILY: &'static str = "d";
    pub const DEFAULT_TARGET_SCHEME: &'static str = "hbase";
    pub const DEFAULT_TARGET_DOMAIN: &'static str = "hbase-cluster";
    pub const DEFAULT_UUID_FIELD: &'static str = "_transaction_uuid";
    pub const DEFAULT_XID_FIELD: &'static str = "_transaction_xid";

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("mutation.column_family", &self.column_family)?;
        require_non_empty("mutation.target_scheme", &self.target_scheme)?;
        require_non_empty("mutation.target_domain", &self.target_domain)?;
        require_non_empty("mutation.uuid_field", &self.uuid_field)?;
        require_non_empty("mutation.xid_field", &self.xid_field)?;

        if self.uuid_field == self.xid_field {
            return Err(ValidationError::invalid(
                "mutation.xid_field",
                "must differ from `mutation.uuid_field`",
            ));
        }

        Ok(())
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            column_family: default_column_family(),
            namespace: None,
            shard_name: None,
            target_scheme: default_target_scheme(),
            target_domain: default_target_domain(),
            salt_row_keys: default_salt_row_keys(),
            uuid_field: default_uuid_field(),
            xid_field: default_xid_field(),
        }
    }
}

/// A source table whose rows carry per-transaction context rather than entity state.
///
/// Rows of this table are keyed by transaction UUID and can be exposed under a
/// different logical name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PayloadTableConfig {
    pub name: String,
    #[serde(default)]
    pub logical_name: Option<String>,
}

impl PayloadTableConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("payload_table.name", &self.name)?;
        if let Some(logical_name) = &self.logical_name {
            require_non_empty("payload_table.logical_name", logical_name)?;
        }

        Ok(())
    }

    /// Name the rows of this table are emitted under.
    pub fn logical_name(&self) -> &str {
        self.logical_name.as_deref().unwrap_or(&self.name)
    }
}

fn default_column_family() -> String {
    MutationConfig::DEFAULT_COLUMN_FAMILY.to_string()
}

fn default_target_scheme() -> String {
    MutationConfig::DEFAULT_TARGET_SCHEME.to_string()
}

fn default_target_domain() -> String {
    MutationConfig::DEFAULT_TARGET_DOMAIN.to_string()
}

fn default_salt_row_keys() -> bool {
    true
}

fn default_uuid_field() -> String {
    MutationConfig::DEFAULT_UUID_FIELD.to_string()
}

fn default_xid_field() -> String {
    MutationConfig::DEFAULT_XID_FIELD.to_string()
}
