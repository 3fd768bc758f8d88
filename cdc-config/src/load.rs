use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions tried, in order, for every configuration file stem.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

const ENV_PREFIX: &str = "APP";
const ENV_PREFIX_SEPARATOR: &str = "_";
const ENV_SEPARATOR: &str = "__";
const LIST_SEPARATOR: &str = ",";

/// Implemented by top-level configuration structs loaded with [`load_config`].
pub trait Config {
    /// Keys whose environment variable values are split on `,` into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

#[derive(Debug, Clone, Copy)]
enum ConfigFile {
    Base,
    Environment(Environment),
}

impl ConfigFile {
    fn stem(&self) -> &'static str {
        match self {
            ConfigFile::Base => "base",
            ConfigFile::Environment(env) => env.as_str(),
        }
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFile::Base => f.write_str("base configuration"),
            ConfigFile::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors raised while assembling the layered configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate the base configuration in `{directory}`; attempted: {attempted}")]
    BaseFileMissing { directory: PathBuf, attempted: String },

    #[error("failed to load {description} from `{path}`: {source}")]
    FileLoad {
        description: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to build configuration: {0}")]
    Builder(#[source] config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads `T` from `./configuration` using the environment named by `APP_ENVIRONMENT`.
///
/// Sources are layered as `base.*`, then the optional `<environment>.*` file, then
/// `APP_`-prefixed environment variables where nested keys are separated by `__`
/// (`APP_SOURCE__HOST`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load()?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads `T` from an explicit configuration directory and environment.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base_file = match find_file(directory, ConfigFile::Base) {
        Ok(path) => path,
        Err(attempted) => {
            return Err(LoadConfigError::BaseFileMissing {
                directory: directory.to_path_buf(),
                attempted,
            });
        }
    };

    let mut builder = config::Config::builder();
    builder = add_file(builder, ConfigFile::Base, &base_file)?;

    // The environment layer is optional: a bare `base.*` is a complete configuration.
    let environment_file = ConfigFile::Environment(environment);
    if let Ok(path) = find_file(directory, environment_file) {
        builder = add_file(builder, environment_file, &path)?;
    }

    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in T::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Returns the first existing file for `file`, or the rendered list of attempted paths.
fn find_file(directory: &Path, file: ConfigFile) -> Result<PathBuf, String> {
    let mut attempted = Vec::with_capacity(CONFIG_FILE_EXTENSIONS.len());

    for extension in CONFIG_FILE_EXTENSIONS {
        let path = directory.join(format!("{}.{extension}", file.stem()));
        if path.is_file() {
            return Ok(path);
        }
        attempted.push(format!("`{}`", path.display()));
    }

    Err(attempted.join(", "))
}

/// Adds `path` to the builder, checking eagerly that it parses so errors name the file.
fn add_file(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    file: ConfigFile,
    path: &Path,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, LoadConfigError> {
    let builder = builder.add_source(config::File::from(path.to_path_buf()));

    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::FileLoad {
            description: file.to_string(),
            path: path.to_path_buf(),
            source,
        })?;

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        size: usize,
    }

    impl Config for Sample {
        const LIST_PARSE_KEYS: &'static [&'static str] = &[];
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.yaml"), "name: base\nsize: 1\n").unwrap();
        std::fs::write(dir.path().join("prod.yaml"), "size: 5\n").unwrap();

        let sample: Sample = load_config_from(dir.path(), Environment::Prod).unwrap();

        assert_eq!(sample.name, "base");
        assert_eq!(sample.size, 5);
    }

    #[test]
    fn test_missing_environment_file_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.json"), r#"{"name": "only-base"}"#).unwrap();

        let sample: Sample = load_config_from(dir.path(), Environment::Dev).unwrap();

        assert_eq!(sample.name, "only-base");
        assert_eq!(sample.size, 0);
    }

    #[test]
    fn test_missing_base_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = load_config_from::<Sample>(dir.path(), Environment::Dev).unwrap_err();

        assert!(matches!(err, LoadConfigError::BaseFileMissing { .. }));
    }
}
