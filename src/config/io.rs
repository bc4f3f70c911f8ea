//! Configuration I/O - Loading configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    // Load .env file if it exists
    dotenvy::dotenv().ok();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().is_some_and(|ext| ext == "json") {
        // JSON5 is more lenient than strict JSON (comments, trailing commas)
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try TOML first, then JSON5
        toml::from_str(&content)
            .map_err(|e| Error::Config(e.to_string()))
            .or_else(|_| json5::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// `lookup` resolves a variable name to its value; `load_config` passes
/// `std::env::var`, tests pass a map. Unparseable numeric values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    use secrecy::SecretString;

    if let Some(api_key) = lookup("TRIPAGENT_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY")) {
        config.gateway.api_key = SecretString::from(api_key);
    }
    if let Some(model) = lookup("TRIPAGENT_MODEL") {
        config.gateway.model = model;
    }
    if let Some(url) = lookup("TRIPAGENT_BASE_URL") {
        config.gateway.base_url = url;
    }
    if let Some(retries) = lookup("TRIPAGENT_MAX_RETRIES") {
        if let Ok(v) = retries.parse() {
            config.gateway.retry.max_retries = v;
        }
    }
    if let Some(timeout) = lookup("TRIPAGENT_REQUEST_TIMEOUT") {
        if let Ok(v) = humantime_serde::re::humantime::parse_duration(&timeout) {
            config.gateway.request_timeout = v;
        }
    }
    if let Some(steps) = lookup("TRIPAGENT_MAX_STEPS") {
        if let Ok(v) = steps.parse() {
            config.agent.max_steps = v;
        }
    }
    if let Some(policy) = lookup("TRIPAGENT_DEGRADATION") {
        if let Ok(v) = policy.parse() {
            config.flow.degradation = v;
        }
    }

    // Logging overrides
    if let Some(level) = lookup("RUST_LOG") {
        config.log.level = level;
    }
    if let Some(format) = lookup("TRIPAGENT_LOG_FORMAT") {
        config.log.format = format;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DegradationPolicy;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[gateway]
model = "qwen/qwen-2.5-72b"
[memory]
summarize_threshold = 8
"#
        )
        .unwrap();

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.gateway.model, "qwen/qwen-2.5-72b");
        assert_eq!(config.memory.summarize_threshold, 8);
    }

    #[test]
    fn test_load_json5_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(
            file,
            r#"{{
  // comments are allowed
  gateway: {{ retry: {{ max_retries: 7 }} }},
  agent: {{ max_steps: 4 }},
}}"#
        )
        .unwrap();

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.gateway.retry.max_retries, 7);
        assert_eq!(config.agent.max_steps, 4);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[gateway\nmodel = ").unwrap();

        let err = load_config_from_path(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TRIPAGENT_API_KEY", "sk-test"),
            ("TRIPAGENT_MODEL", "anthropic/claude-3.5-haiku"),
            ("TRIPAGENT_MAX_RETRIES", "5"),
            ("TRIPAGENT_REQUEST_TIMEOUT", "90s"),
            ("TRIPAGENT_DEGRADATION", "silent"),
            ("TRIPAGENT_MAX_STEPS", "not-a-number"),
        ]);

        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.gateway.api_key.expose_secret(), "sk-test");
        assert_eq!(config.gateway.model, "anthropic/claude-3.5-haiku");
        assert_eq!(config.gateway.retry.max_retries, 5);
        assert_eq!(config.gateway.request_timeout, std::time::Duration::from_secs(90));
        assert_eq!(config.flow.degradation, DegradationPolicy::Silent);
        // Unparseable values leave the default in place
        assert_eq!(config.agent.max_steps, 10);
    }
}
