//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_storage(config, &mut result);
        Self::validate_dispatch(config, &mut result);
        Self::validate_reaper(config, &mut result);

        result
    }

    /// Validate and turn the first error into a `ConfigError`.
    ///
    /// Warnings are returned to the caller for logging.
    pub fn ensure_valid(config: &Config) -> Result<Vec<ValidationWarning>, ConfigError> {
        let result = Self::validate(config);
        match result.errors.into_iter().next() {
            Some(first) => Err(ConfigError::InvalidValue {
                field: first.path,
                message: first.message,
            }),
            None => Ok(result.warnings),
        }
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_storage(config: &Config, result: &mut ValidationResult) {
        if config.storage.database_path.as_os_str().is_empty() {
            result.add_error(ValidationError::new(
                "storage.database_path",
                "database_path cannot be empty",
            ));
        }

        if config.storage.max_retries > 10 {
            result.add_warning(ValidationWarning::new(
                "storage.max_retries",
                "more than 10 storage retries can stall callers for a long time",
            ));
        }

        if config.storage.retry_base_delay_ms > config.storage.retry_max_delay_ms {
            result.add_warning(ValidationWarning::new(
                "storage.retry_base_delay_ms",
                "base delay exceeds max delay; every retry will wait retry_max_delay_ms",
            ));
        }
    }

    fn validate_dispatch(config: &Config, result: &mut ValidationResult) {
        let dispatch = &config.dispatch;
        if dispatch.min_priority > dispatch.max_priority {
            result.add_error(ValidationError::new(
                "dispatch.min_priority",
                "min_priority must not exceed max_priority",
            ));
            return;
        }

        if !(dispatch.min_priority..=dispatch.max_priority).contains(&dispatch.default_priority) {
            result.add_error(ValidationError::new(
                "dispatch.default_priority",
                format!(
                    "default_priority {} is outside [{}, {}]",
                    dispatch.default_priority, dispatch.min_priority, dispatch.max_priority
                ),
            ));
        }
    }

    fn validate_reaper(config: &Config, result: &mut ValidationResult) {
        let reaper = &config.reaper;
        if !reaper.enabled {
            return;
        }

        if reaper.interval_secs == 0 {
            result.add_error(ValidationError::new(
                "reaper.interval_secs",
                "interval_secs must be greater than 0",
            ));
        }

        if reaper.claim_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "reaper.claim_timeout_secs",
                "claim_timeout_secs must be greater than 0",
            ));
        }

        if reaper.claim_timeout_secs > 0 && reaper.claim_timeout_secs < reaper.interval_secs {
            result.add_warning(ValidationWarning::new(
                "reaper.claim_timeout_secs",
                "claim timeout is shorter than the sweep interval; stale claims wait up to one extra interval",
            ));
        }
    }
}
