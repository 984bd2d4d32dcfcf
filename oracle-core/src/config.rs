//! Oracle configuration, read from the environment.

use crate::generator::{GeneratorConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::prompts::DEFAULT_TONE;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use textgen::Provider;
use thiserror::Error;

pub const DEFAULT_TABLE_PATH: &str = "oracle/oracle.json";
pub const DEFAULT_OUTPUT_DIR: &str = "oracle";

/// Errors from building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key not configured (set {var})")]
    MissingApiKey { var: &'static str },

    #[error("Invalid ORACLE_PROVIDER '{0}' (expected openai or gemini)")]
    InvalidProvider(String),

    #[error("Invalid ORACLE_TIMEOUT_SECS '{0}' (expected a positive number of seconds)")]
    InvalidTimeout(String),
}

/// Everything a session needs to know.
#[derive(Clone)]
pub struct OracleConfig {
    pub provider: Provider,
    /// Only required for generation.
    pub api_key: Option<String>,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    pub table_path: PathBuf,
    pub output_dir: PathBuf,
    pub request_timeout: Duration,
    pub tone: String,
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("table_path", &self.table_path)
            .field("output_dir", &self.output_dir)
            .field("request_timeout", &self.request_timeout)
            .field("tone", &self.tone)
            .finish()
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::new(Provider::OpenAi)
    }
}

impl OracleConfig {
    /// Defaults for `provider`, with no API key.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            api_key: None,
            model: None,
            base_url: None,
            table_path: PathBuf::from(DEFAULT_TABLE_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tone: DEFAULT_TONE.to_string(),
        }
    }

    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("ORACLE_PROVIDER") {
            Some(value) => value
                .parse::<Provider>()
                .map_err(|_| ConfigError::InvalidProvider(value))?,
            None => Provider::OpenAi,
        };

        let mut config = Self::new(provider);
        config.api_key = get(provider.api_key_var());
        config.model = get("ORACLE_MODEL");
        config.base_url = get("ORACLE_BASE_URL");

        if let Some(path) = get("ORACLE_TABLE_PATH") {
            config.table_path = PathBuf::from(path);
        }
        if let Some(dir) = get("ORACLE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(secs) = get("ORACLE_TIMEOUT_SECS") {
            config.request_timeout = match secs.trim().parse::<u64>() {
                Ok(n) if n > 0 => Duration::from_secs(n),
                _ => return Err(ConfigError::InvalidTimeout(secs)),
            };
        }
        if let Some(tone) = get("ORACLE_TONE") {
            config.tone = tone.trim().to_string();
        }

        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_table_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.table_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    /// Build the HTTP client for the configured provider.
    pub fn client(&self) -> Result<textgen::Client, ConfigError> {
        let key = self.api_key.as_ref().ok_or(ConfigError::MissingApiKey {
            var: self.provider.api_key_var(),
        })?;

        let mut client =
            textgen::Client::new(self.provider, key.clone()).with_timeout(self.request_timeout);
        if let Some(model) = &self.model {
            client = client.with_model(model.clone());
        }
        if let Some(url) = &self.base_url {
            client = client.with_base_url(url.clone());
        }
        Ok(client)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::default().with_request_timeout(self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = OracleConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.api_key, None);
        assert_eq!(config.table_path, PathBuf::from("oracle/oracle.json"));
        assert_eq!(config.output_dir, PathBuf::from("oracle"));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.tone, DEFAULT_TONE);
    }

    #[test]
    fn test_gemini_reads_its_own_key() {
        let config = OracleConfig::from_lookup(lookup(&[
            ("ORACLE_PROVIDER", "gemini"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("GEMINI_API_KEY", "g-key"),
            ("ORACLE_TIMEOUT_SECS", "30"),
            ("ORACLE_TONE", " grim "),
        ]))
        .unwrap();

        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.tone, "grim");

        let client = config.client().unwrap();
        assert_eq!(client.model(), textgen::GEMINI_DEFAULT_MODEL);
    }

    #[test]
    fn test_overrides_reach_client() {
        let config = OracleConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("ORACLE_MODEL", "gpt-4o"),
            ("ORACLE_BASE_URL", "http://localhost:8080/"),
        ]))
        .unwrap();

        let client = config.client().unwrap();
        assert_eq!(client.model(), "gpt-4o");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            OracleConfig::from_lookup(lookup(&[("ORACLE_PROVIDER", "anthropic")])),
            Err(ConfigError::InvalidProvider(p)) if p == "anthropic"
        ));
        assert!(matches!(
            OracleConfig::from_lookup(lookup(&[("ORACLE_TIMEOUT_SECS", "0")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            OracleConfig::from_lookup(lookup(&[("ORACLE_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_missing_key_names_variable() {
        let err = OracleConfig::new(Provider::Gemini).client().unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = OracleConfig::default().with_api_key("sk-very-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
