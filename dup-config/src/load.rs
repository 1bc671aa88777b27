use serde::de::DeserializeOwned;
use std::path::Path;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Base configuration file loaded for all environments.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested keys, e.g. `APP_RETRY__MAX_ATTEMPTS` sets `retry.max_attempts`.
const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Keys of a configuration type that have to be parsed as lists from environment variables.
pub trait Config {
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Loads configuration from `./configuration` for the current [`Environment`].
///
/// # Panics
/// Panics if the current directory cannot be determined or if `APP_ENVIRONMENT` holds an
/// unsupported value.
pub fn load_config<T>() -> Result<T, config::ConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let environment = Environment::load().expect("Failed to parse APP_ENVIRONMENT.");

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads layered configuration from `directory`.
///
/// Sources are applied in order, later ones overriding earlier ones:
/// 1. `base.yaml`
/// 2. `{environment}.yaml` (optional)
/// 3. environment variables prefixed with `APP_`
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, config::ConfigError>
where
    T: Config + DeserializeOwned,
{
    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    if !<T as Config>::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source.list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(directory.join(BASE_CONFIG_FILE)))
        .add_source(
            config::File::from(directory.join(format!("{environment}.yaml"))).required(false),
        )
        .add_source(environment_source)
        .build()?;

    settings.try_deserialize::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::DuplicationConfig;

    #[test]
    fn environment_file_overrides_base_file() {
        let directory = std::env::temp_dir().join(format!("dup-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&directory).unwrap();
        std::fs::write(
            directory.join(BASE_CONFIG_FILE),
            "meta_root: /meta/apps\npersist_interval_ms: 2000\nretry:\n  max_attempts: 3\n  initial_delay_ms: 10\n  max_delay_ms: 100\n  backoff_factor: 2.0\n",
        )
        .unwrap();
        std::fs::write(directory.join("dev.yaml"), "persist_interval_ms: 250\n").unwrap();

        let config: DuplicationConfig = load_config_from(&directory, Environment::Dev).unwrap();

        assert_eq!(config.meta_root, "/meta/apps");
        assert_eq!(config.persist_interval_ms, 250);
        assert_eq!(config.retry.max_attempts, 3);

        std::fs::remove_dir_all(&directory).unwrap();
    }
}
