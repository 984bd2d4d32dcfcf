//! Structured generation: prompts in, decoded JSON out.
//!
//! [`OracleGenerator`] sends prompts to a [`TextGenerator`], passes the raw
//! text through [`extract`](crate::extract::extract) and hands back typed
//! results. Every failure comes back as a [`GenerationError`]; nothing is
//! retried here.

use crate::conflict::{check_schema, ConflictMap};
use crate::extract::{extract, snippet, DecodeError};
use crate::prompts;
use crate::tables::TableSet;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use textgen::{Request, SafetySetting};
use thiserror::Error;

/// Sampling temperature for table generation.
pub const TABLE_TEMPERATURE: f32 = 0.9;

/// Sampling temperature for conflict maps. Lower than the table call to keep
/// the output closer to the schema.
pub const CONFLICT_TEMPERATURE: f32 = 0.8;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Something that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a single-turn request.
    async fn generate(&self, request: &Request) -> Result<String, textgen::Error>;

    /// Model name, for logs.
    fn model(&self) -> &str;
}

#[async_trait]
impl TextGenerator for textgen::Client {
    async fn generate(&self, request: &Request) -> Result<String, textgen::Error> {
        Ok(self.complete(request).await?.text)
    }

    fn model(&self) -> &str {
        textgen::Client::model(self)
    }
}

/// Failure categories of a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    EmptyInput,
    ServiceError,
    DecodeError,
}

/// Errors from a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Could not generate conflict map: no oracle elements were provided")]
    EmptyInput,

    #[error("Error generating content: {0}")]
    Service(String),

    #[error("Error: Could not decode JSON from AI response: {0}")]
    Decode(#[from] DecodeError),
}

impl GenerationError {
    pub fn reason(&self) -> FailureReason {
        match self {
            GenerationError::EmptyInput => FailureReason::EmptyInput,
            GenerationError::Service(_) => FailureReason::ServiceError,
            GenerationError::Decode(_) => FailureReason::DecodeError,
        }
    }
}

/// Settings fixed for the lifetime of a generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub table_temperature: f32,
    pub conflict_temperature: f32,
    /// Upper bound on each service call.
    pub request_timeout: Duration,
    pub safety_settings: Vec<SafetySetting>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            table_temperature: TABLE_TEMPERATURE,
            conflict_temperature: CONFLICT_TEMPERATURE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            safety_settings: SafetySetting::permissive(),
        }
    }
}

impl GeneratorConfig {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Issues generation requests and decodes their responses.
#[derive(Clone)]
pub struct OracleGenerator {
    generator: Arc<dyn TextGenerator>,
    config: GeneratorConfig,
}

impl OracleGenerator {
    pub fn new(generator: impl TextGenerator + 'static, config: GeneratorConfig) -> Self {
        Self {
            generator: Arc::new(generator),
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Ask for four protagonists and their conflicts, built from `elements`.
    ///
    /// An empty (or all-blank) element list fails with
    /// [`GenerationError::EmptyInput`] before any request is made. Missing
    /// `elements`/`characters`/`conflicts` keys in the response become empty
    /// lists rather than errors.
    pub async fn generate_conflict_map(
        &self,
        elements: &[String],
    ) -> Result<ConflictMap, GenerationError> {
        if elements.iter().all(|e| e.trim().is_empty()) {
            return Err(GenerationError::EmptyInput);
        }

        tracing::info!(elements = elements.len(), "generating conflict map");

        let request = Request::new(prompts::conflict_map_prompt(elements))
            .with_system(prompts::CONFLICT_SYSTEM)
            .with_temperature(self.config.conflict_temperature)
            .with_safety_settings(self.config.safety_settings.clone());

        let value = self.request_json(&request).await?;
        let map = ConflictMap::from_value(value);

        for warning in check_schema(&map) {
            tracing::warn!(%warning, "conflict map deviates from schema");
        }

        Ok(map)
    }

    /// Ask for a fresh set of oracle tables in the given tone.
    pub async fn generate_tables(&self, tone: &str) -> Result<TableSet, GenerationError> {
        let tone = match tone.trim() {
            "" => prompts::DEFAULT_TONE,
            tone => tone,
        };
        tracing::info!(tone, "generating oracle tables");

        let request = Request::new(prompts::oracle_tables_prompt(tone))
            .with_system(prompts::TABLES_SYSTEM)
            .with_temperature(self.config.table_temperature)
            .with_safety_settings(self.config.safety_settings.clone());

        let value = self.request_json(&request).await?;
        let rendered = value.to_string();

        TableSet::from_value(value, "the generated oracle").map_err(|e| {
            tracing::warn!(error = %e, "generated oracle tables are unusable");
            GenerationError::Decode(DecodeError::Malformed {
                snippet: snippet(&rendered),
                message: e.to_string(),
            })
        })
    }

    async fn request_json(&self, request: &Request) -> Result<Value, GenerationError> {
        let timeout = self.config.request_timeout;
        let raw = match tokio::time::timeout(timeout, self.generator.generate(request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::warn!(model = self.generator.model(), error = %e, "generation request failed");
                return Err(GenerationError::Service(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(model = self.generator.model(), ?timeout, "generation request timed out");
                return Err(GenerationError::Service(format!(
                    "request timed out after {timeout:?}"
                )));
            }
        };

        tracing::debug!(raw = %raw, "raw generation response");

        extract(&raw).map_err(|e| {
            tracing::warn!(error = %e, "could not decode generation response");
            GenerationError::Decode(e)
        })
    }
}
