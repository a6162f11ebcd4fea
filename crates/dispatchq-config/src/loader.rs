//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

const ENV_VAR_PATTERN: &str = r"\$\{([^}]+)\}";

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a file, falling back to defaults when the file is absent.
    ///
    /// Returns the config and whether it was read from disk.
    pub fn load_or_default(path: &Path) -> Result<(Config, bool), ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok((config, true)),
            Err(ConfigError::NotFound(_)) => Ok((Config::default(), false)),
            Err(e) => Err(e),
        }
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::InvalidValue {
            field: "env".to_string(),
            message: e.to_string(),
        })?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.dispatchq/queue.db`).
    pub fn expand_path(path: &Path) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
    }
}
