//! Minimal generative text API client.
//!
//! This crate provides a focused, non-streaming client for two backends:
//! - OpenAI-compatible chat completions (`/v1/chat/completions`)
//! - Google Gemini `generateContent`
//!
//! Both are driven through the same [`Request`] and [`Response`] types, so
//! callers pick a [`Provider`] once and never touch the wire formats.

mod gemini;
mod openai;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const OPENAI_API_BASE: &str = "https://api.openai.com";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when using the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Prompt blocked by provider: {0}")]
    Blocked(String),

    #[error("Response contained no generated text")]
    EmptyResponse,

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Which backend the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Provider {
    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_DEFAULT_MODEL,
            Provider::Gemini => GEMINI_DEFAULT_MODEL,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_API_BASE,
            Provider::Gemini => GEMINI_API_BASE,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open_ai" | "gpt" => Ok(Provider::OpenAi),
            "gemini" | "google" => Ok(Provider::Gemini),
            other => Err(Error::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Generative text API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client for the given provider and API key.
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            http: build_http(DEFAULT_TIMEOUT),
            provider,
            api_key: api_key.into(),
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different API host (proxies, local servers, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = build_http(timeout);
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a completion request and return the generated text.
    pub async fn complete(&self, request: &Request) -> Result<Response, Error> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let headers = self.build_headers()?;

        let builder = match self.provider {
            Provider::OpenAi => self
                .http
                .post(openai::endpoint(&self.base_url))
                .json(&openai::ChatRequest::build(model, request)),
            Provider::Gemini => self
                .http
                .post(gemini::endpoint(&self.base_url, model))
                .json(&gemini::GenerateContentRequest::build(request)),
        };

        tracing::debug!(
            provider = %self.provider,
            model,
            prompt_chars = request.prompt.chars().count(),
            temperature = ?request.temperature,
            "sending completion request"
        );

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        let parsed = match self.provider {
            Provider::OpenAi => openai::parse_response(&body),
            Provider::Gemini => gemini::parse_response(&body, model),
        }?;

        tracing::debug!(
            model = %parsed.model,
            output_chars = parsed.text.chars().count(),
            finish_reason = ?parsed.finish_reason,
            "completion received"
        );

        Ok(parsed)
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match self.provider {
            Provider::OpenAi => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                        .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
                );
            }
            Provider::Gemini => {
                headers.insert(
                    "x-goog-api-key",
                    HeaderValue::from_str(&self.api_key)
                        .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
                );
            }
        }
        Ok(headers)
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Network(e.to_string())
        }
    }
}

fn build_http(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ============================================================================
// Public types
// ============================================================================

/// A single-turn completion request.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: Option<f32>,
    /// `None` leaves the output length to the provider.
    pub max_tokens: Option<usize>,
    /// Only sent to providers that understand them (Gemini).
    pub safety_settings: Vec<SafetySetting>,
}

impl Request {
    /// Create a new request with the given user prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            system: None,
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
            safety_settings: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_safety_settings(mut self, settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = settings;
        self
    }
}

/// Content category a safety threshold applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

/// How aggressively the provider blocks a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// A per-category safety threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    pub fn new(category: HarmCategory, threshold: HarmBlockThreshold) -> Self {
        Self {
            category,
            threshold,
        }
    }

    /// `BLOCK_NONE` for every category. Fiction about vengeance and betrayal
    /// trips the default filters constantly.
    pub fn permissive() -> Vec<SafetySetting> {
        [
            HarmCategory::Harassment,
            HarmCategory::HateSpeech,
            HarmCategory::SexuallyExplicit,
            HarmCategory::DangerousContent,
        ]
        .into_iter()
        .map(|category| SafetySetting::new(category, HarmBlockThreshold::BlockNone))
        .collect()
    }
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: Option<String>,
    pub model: String,
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Other,
}

impl FinishReason {
    fn from_openai(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::MaxTokens,
            Some("content_filter") => FinishReason::Safety,
            Some(_) => FinishReason::Other,
        }
    }

    fn from_gemini(reason: Option<&str>) -> Self {
        match reason {
            Some("STOP") | None => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::MaxTokens,
            Some("SAFETY") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
                FinishReason::Safety
            }
            Some(_) => FinishReason::Other,
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Client::new(Provider::OpenAi, "test-key");
        assert_eq!(client.model(), OPENAI_DEFAULT_MODEL);
        assert_eq!(client.base_url(), OPENAI_API_BASE);

        let client = Client::new(Provider::Gemini, "test-key");
        assert_eq!(client.model(), GEMINI_DEFAULT_MODEL);
        assert_eq!(client.base_url(), GEMINI_API_BASE);
    }

    #[test]
    fn test_client_overrides() {
        let client = Client::new(Provider::OpenAi, "test-key")
            .with_model("gpt-4o")
            .with_base_url("http://localhost:11434/")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(client.model(), "gpt-4o");
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = Client::new(Provider::Gemini, "super-secret");
        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("Gemini"));
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(" Gemini ".parse::<Provider>().unwrap(), Provider::Gemini);
        assert!(matches!(
            "claude".parse::<Provider>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new("Hello")
            .with_system("You are a generator of RPG oracle tables.")
            .with_temperature(0.9)
            .with_safety_settings(SafetySetting::permissive());

        assert_eq!(request.prompt, "Hello");
        assert!(request.system.is_some());
        assert_eq!(request.temperature, Some(0.9));
        assert_eq!(request.max_tokens, None);
        assert_eq!(request.safety_settings.len(), 4);
    }

    #[test]
    fn test_permissive_safety_serialization() {
        let json = serde_json::to_value(SafetySetting::permissive()).unwrap();
        assert_eq!(json[0]["category"], "HARM_CATEGORY_HARASSMENT");
        assert_eq!(json[3]["category"], "HARM_CATEGORY_DANGEROUS_CONTENT");
        assert!(json
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_openai(Some("length")), FinishReason::MaxTokens);
        assert_eq!(FinishReason::from_openai(None), FinishReason::Stop);
        assert_eq!(FinishReason::from_gemini(Some("SAFETY")), FinishReason::Safety);
        assert_eq!(FinishReason::from_gemini(Some("RECITATION")), FinishReason::Other);
    }
}
