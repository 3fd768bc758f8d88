use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;

use crate::Config;
use crate::shared::ValidationError;
use crate::shared::base::require_non_empty;

/// Connection settings for a MySQL server.
///
/// Does not implement [`Serialize`] so the password cannot leak into serialized output,
/// use [`MySqlConnectionConfigWithoutSecrets`] for that.
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database selected on connect. Empty means no default database.
    #[serde(default)]
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Upper bound of the connection pool built from this config.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl MySqlConnectionConfig {
    pub const DEFAULT_PORT: u16 = 3306;

    pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

    /// Connect options selecting the configured database.
    pub fn with_db(&self) -> MySqlConnectOptions {
        let options = self.without_db();
        if self.name.is_empty() {
            return options;
        }

        options.database(&self.name)
    }

    /// Connect options without a default database, used before the database exists.
    pub fn without_db(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username);

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }

    pub fn validate(&self, section: &str) -> Result<(), ValidationError> {
        require_non_empty(&format!("{section}.host"), &self.host)?;
        require_non_empty(&format!("{section}.username"), &self.username)?;

        if self.max_connections == 0 {
            return Err(ValidationError::invalid(
                &format!("{section}.max_connections"),
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Config for MySqlConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// Same as [`MySqlConnectionConfig`] without the password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MySqlConnectionConfigWithoutSecrets {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub max_connections: u32,
}

impl From<MySqlConnectionConfig> for MySqlConnectionConfigWithoutSecrets {
    fn from(value: MySqlConnectionConfig) -> Self {
        MySqlConnectionConfigWithoutSecrets {
            host: value.host,
            port: value.port,
            name: value.name,
            username: value.username,
            max_connections: value.max_connections,
        }
    }
}

fn default_port() -> u16 {
    MySqlConnectionConfig::DEFAULT_PORT
}

fn default_max_connections() -> u32 {
    MySqlConnectionConfig::DEFAULT_MAX_CONNECTIONS
}
