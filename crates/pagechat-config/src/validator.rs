//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

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
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_openai(config, &mut result);
        Self::validate_router(config, &mut result);
        Self::validate_bridge(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_openai(config: &Config, result: &mut ValidationResult) {
        let openai = &config.openai;

        if openai.model.is_empty() {
            result.add_error(ValidationError::new("openai.model", "Model cannot be empty"));
        }

        if !openai.api_url.starts_with("http://") && !openai.api_url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "openai.api_url",
                "api_url must start with http:// or https://",
            ));
        }

        if openai.max_tokens == 0 {
            result.add_error(ValidationError::new(
                "openai.max_tokens",
                "max_tokens must be greater than 0",
            ));
        }

        if !(0.0..=2.0).contains(&openai.temperature) {
            result.add_error(ValidationError::new(
                "openai.temperature",
                "temperature must be between 0 and 2",
            ));
        }

        if openai.timeout_seconds == 0 {
            result.add_error(ValidationError::new(
                "openai.timeout_seconds",
                "timeout_seconds must be greater than 0",
            ));
        }
    }

    fn validate_router(config: &Config, result: &mut ValidationResult) {
        let router = &config.router;

        if router.history_window == 0 {
            result.add_error(ValidationError::new(
                "router.history_window",
                "history_window must be greater than 0",
            ));
        }

        if router.history_window > 200 {
            result.add_warning(ValidationWarning::new(
                "router.history_window",
                "history_window is very high (>200), requests may exceed the model context",
            ));
        }

        if router.max_page_chars == 0 {
            result.add_warning(ValidationWarning::new(
                "router.max_page_chars",
                "max_page_chars is 0, page context will always be empty",
            ));
        }

        if router.agent_commands {
            result.add_warning(ValidationWarning::new(
                "router.agent_commands",
                "agent commands are enabled, phrasing like \"click ...\" will act on the page",
            ));
        }
    }

    fn validate_bridge(config: &Config, result: &mut ValidationResult) {
        if config.bridge.request_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "bridge.request_timeout_ms",
                "request_timeout_ms must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
