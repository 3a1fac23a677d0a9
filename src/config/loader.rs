//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "GNSS_LINK";

/// Config file name
const CONFIG_FILE_NAME: &str = "gnss-link.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "GNSS_LINK_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `GNSS_LINK_CONFIG` environment variable (explicit path)
    /// 2. `./gnss-link.toml` (current directory)
    /// 3. the platform config directory (`~/.config/gnss-link/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values. The result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // A malformed override is ignored here; `load` reports it.
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("No config file path set".to_string()))?;

        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Platform config directory for this tool, e.g. `~/.config/gnss-link`.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "gnss-link").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    apply_overrides(config, |var| std::env::var(var).ok())
}

/// Apply `GNSS_LINK_<SECTION>_<KEY>` overrides, looking variables up through
/// `lookup`.
///
/// Recognised keys:
/// - `GNSS_LINK_CONNECTION_TRANSPORT` (`tcp` / `serial`)
/// - `GNSS_LINK_CONNECTION_HOST`, `GNSS_LINK_CONNECTION_PORT`
/// - `GNSS_LINK_CONNECTION_DEVICE`, `GNSS_LINK_CONNECTION_BAUD_RATE`
/// - `GNSS_LINK_CONNECTION_FLOW_CONTROL` (`true`/`1` enables)
/// - `GNSS_LINK_LOGGING_LEVEL`, `GNSS_LINK_LOGGING_FORMAT`
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| format!("{ENV_PREFIX}_{key}");

    if let Some(val) = lookup(&var("CONNECTION_TRANSPORT")) {
        config.connection.transport = val.parse()?;
    }
    if let Some(val) = lookup(&var("CONNECTION_HOST")) {
        config.connection.host = val;
    }
    if let Some(val) = lookup(&var("CONNECTION_PORT")) {
        config.connection.port = val;
    }
    if let Some(val) = lookup(&var("CONNECTION_DEVICE")) {
        config.connection.device = val;
    }
    if let Some(val) = lookup(&var("CONNECTION_BAUD_RATE")) {
        config.connection.baud_rate = val
            .parse()
            .map_err(|_| ConfigError::env_parse(var("CONNECTION_BAUD_RATE"), "Invalid baud rate"))?;
    }
    if let Some(val) = lookup(&var("CONNECTION_FLOW_CONTROL")) {
        config.connection.flow_control = val.eq_ignore_ascii_case("true") || val == "1";
    }

    if let Some(val) = lookup(&var("LOGGING_LEVEL")) {
        config.logging.level = val;
    }
    if let Some(val) = lookup(&var("LOGGING_FORMAT")) {
        config.logging.format = match val.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => {
                return Err(ConfigError::env_parse(
                    var("LOGGING_FORMAT"),
                    "Expected json, pretty or compact",
                ))
            }
        };
    }

    Ok(())
}
