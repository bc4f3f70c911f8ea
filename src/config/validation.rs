//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::Config;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_gateway_config(config, result);
    result = validate_retry_config(config, result);
    result = validate_limits(config, result);

    result
}

fn validate_gateway_config(
    config: &Config,
    mut result: ConfigValidationResult,
) -> ConfigValidationResult {
    let gateway = &config.gateway;

    if gateway.api_key.expose_secret().is_empty() {
        result = result.with_warning(
            ValidationIssue::new(
                "gateway.api_key",
                "No API key configured. Model calls will be rejected.",
            )
            .with_suggestion("Set TRIPAGENT_API_KEY or OPENROUTER_API_KEY"),
        );
    }

    if gateway.model.trim().is_empty() {
        result = result.with_error(ValidationIssue::new("gateway.model", "Model name is empty"));
    }

    match url::Url::parse(&gateway.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => {
            result = result.with_error(ValidationIssue::new(
                "gateway.base_url",
                format!("Unsupported URL scheme: {}", url.scheme()),
            ));
        }
        Err(e) => {
            result = result.with_error(
                ValidationIssue::new("gateway.base_url", format!("Invalid URL: {}", e))
                    .with_suggestion("Use a full URL such as https://openrouter.ai/api/v1"),
            );
        }
    }

    let sampling = &gateway.sampling;
    if !(0.0..=2.0).contains(&sampling.temperature) {
        result = result.with_error(ValidationIssue::new(
            "gateway.sampling.temperature",
            format!("Temperature {} is outside 0.0..=2.0", sampling.temperature),
        ));
    }
    if !(0.0..=1.0).contains(&sampling.top_p) {
        result = result.with_error(ValidationIssue::new(
            "gateway.sampling.top_p",
            format!("top_p {} is outside 0.0..=1.0", sampling.top_p),
        ));
    }
    for (path, value) in [
        ("gateway.sampling.frequency_penalty", sampling.frequency_penalty),
        ("gateway.sampling.presence_penalty", sampling.presence_penalty),
    ] {
        if !(-2.0..=2.0).contains(&value) {
            let message = format!("{} is outside -2.0..=2.0", value);
            result = result.with_error(ValidationIssue::new(path, message));
        }
    }
    if sampling.max_tokens == 0 {
        result = result.with_error(ValidationIssue::new(
            "gateway.sampling.max_tokens",
            "max_tokens must be positive",
        ));
    }

    result
}

fn validate_retry_config(
    config: &Config,
    mut result: ConfigValidationResult,
) -> ConfigValidationResult {
    let retry = &config.gateway.retry;

    if retry.max_retries == 0 {
        result = result.with_warning(
            ValidationIssue::new(
                "gateway.retry.max_retries",
                "max_retries is 0; each call still makes one attempt",
            )
            .with_suggestion("Set max_retries to at least 1"),
        );
    }
    if retry.base_delay_seconds < 0.0 || retry.max_delay_seconds < 0.0 {
        result = result.with_error(ValidationIssue::new(
            "gateway.retry",
            "Delays must not be negative",
        ));
    }
    if retry.max_delay_seconds < retry.base_delay_seconds {
        result = result.with_warning(ValidationIssue::new(
            "gateway.retry.max_delay_seconds",
            "max_delay_seconds is below base_delay_seconds; every delay will be capped",
        ));
    }
    if retry.backoff_multiplier < 1.0 {
        result = result.with_error(ValidationIssue::new(
            "gateway.retry.backoff_multiplier",
            format!("Multiplier {} would shrink delays", retry.backoff_multiplier),
        ));
    }

    result
}

fn validate_limits(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.agent.max_steps == 0 {
        result = result.with_error(ValidationIssue::new(
            "agent.max_steps",
            "max_steps must be at least 1",
        ));
    }
    if config.memory.summarize_threshold < 2 {
        result = result.with_error(ValidationIssue::new(
            "memory.summarize_threshold",
            "summarize_threshold must be at least 2",
        ));
    }
    if config.memory.max_messages < config.memory.summarize_threshold {
        result = result.with_warning(ValidationIssue::new(
            "memory.max_messages",
            "max_messages is below summarize_threshold; pruning will run before summarization",
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = validate_config(&config);

        // Default config only warns about the missing API key
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.iter().any(|w| w.path == "gateway.api_key"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config::default();
        config.gateway.api_key = SecretString::from("sk-test".to_string());
        config.gateway.base_url = "not a url".into();
        config.gateway.sampling.temperature = 3.5;
        config.gateway.retry.backoff_multiplier = 0.5;
        config.agent.max_steps = 0;

        let result = validate_config(&config);
        assert!(!result.valid);
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"gateway.base_url"));
        assert!(paths.contains(&"gateway.sampling.temperature"));
        assert!(paths.contains(&"gateway.retry.backoff_multiplier"));
        assert!(paths.contains(&"agent.max_steps"));
    }

    #[test]
    fn test_non_http_scheme() {
        let mut config = Config::default();
        config.gateway.base_url = "ftp://example.com".into();
        let result = validate_config(&config);
        assert!(result.errors.iter().any(|e| e.message.contains("scheme")));
    }
}
