use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};
use weave_domain::config::WeaveConfig;
use weave_domain::names::QualifiedName;

/// Prefix of environment overrides (`WEAVE__SCAN__PREFIX` maps to `scan.prefix`).
pub const ENV_PREFIX: &str = "WEAVE";
const ENV_SEPARATOR: &str = "__";

/// Custom error type for config loading.
#[weave_derive::weave_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Invalid configuration{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Overrides taken from somewhere other than the process environment.
pub type EnvSource = config::Map<String, String>;

/// A reusable configuration loader that combines file-based settings with environment overrides.
///
/// Layers, lowest precedence first:
/// 1. **Defaults**: whatever `T::default()` provides through `#[serde(default)]`.
/// 2. **Base File**: the given file, when a path is passed. Its format follows the extension.
/// 3. **Environment Overrides**: variables prefixed with `WEAVE__`, nested keys separated by `__`.
///    `scan.exclusions` accepts a comma-separated list.
///
/// # Errors
/// Returns [`ConfigError::Config`] when the file is missing or unreadable, or when the merged
/// values do not match the structure of `T`.
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    load_config_from(path, None)
}

/// Same as [`load_config`], reading overrides from `env` instead of the process environment.
///
/// # Errors
/// See [`load_config`].
pub fn load_config_from<T>(
    path: Option<impl AsRef<Path>>,
    env: Option<EnvSource>,
) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let mut builder = Config::builder();

    if let Some(path) = path {
        let path = path.as_ref();
        info!("Loading config from {}", path.display());
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("scan.exclusions")
            .source(env),
    );

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}

/// Loads and validates the [`WeaveConfig`] of one run.
///
/// # Errors
/// Everything [`load_config`] reports, plus [`ConfigError::Invalid`] for unusable values.
pub fn load_weave_config(path: Option<impl AsRef<Path>>) -> Result<WeaveConfig, ConfigError> {
    let config = load_config::<WeaveConfig>(path)?;
    validate(&config)?;
    Ok(config)
}

/// Rejects configurations the pipeline cannot run with.
///
/// # Errors
/// Returns [`ConfigError::Invalid`] naming the offending key.
pub fn validate(config: &WeaveConfig) -> Result<(), ConfigError> {
    let qualified = [("marker", &config.marker), ("registry.class", &config.registry.class_name)];
    for (key, value) in qualified {
        QualifiedName::parse(value).map_err(|err| invalid(key, err.to_string()))?;
    }

    for (key, value) in [
        ("registry.routine", &config.registry.routine),
        ("registry.field", &config.registry.field),
        ("registry.method", &config.registry.method),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(key, "must not be empty"));
        }
    }

    if config.workers == 0 {
        return Err(invalid("workers", "must be at least 1"));
    }

    debug!(marker = %config.marker, registry = %config.registry.class_name, "configuration validated");
    Ok(())
}

fn invalid(key: &'static str, message: impl Into<Cow<'static, str>>) -> ConfigError {
    ConfigError::Invalid { message: message.into(), context: Some(Cow::Borrowed(key)) }
}
