//! Gemini `generateContent` wire format.

use crate::{Error, FinishReason, Request, Response, SafetySetting, Usage};
use serde::{Deserialize, Serialize};

pub(crate) fn endpoint(base_url: &str, model: &str) -> String {
    format!("{base_url}/v1beta/models/{model}:generateContent")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

impl GenerateContentRequest {
    pub(crate) fn build(request: &Request) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: system.clone(),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
            safety_settings: request.safety_settings.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

pub(crate) fn parse_response(body: &str, model: &str) -> Result<Response, Error> {
    let api_response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;

    let Some(candidate) = api_response.candidates.into_iter().next() else {
        return Err(match api_response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            Some(reason) => Error::Blocked(reason),
            None => Error::EmptyResponse,
        });
    };

    // Multi-part candidates are concatenated in order
    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    let finish_reason = FinishReason::from_gemini(candidate.finish_reason.as_deref());
    if text.is_empty() {
        return Err(match finish_reason {
            FinishReason::Safety => Error::Blocked(
                candidate
                    .finish_reason
                    .unwrap_or_else(|| "SAFETY".to_string()),
            ),
            _ => Error::EmptyResponse,
        });
    }

    Ok(Response {
        id: None,
        model: api_response
            .model_version
            .unwrap_or_else(|| model.to_string()),
        text,
        finish_reason,
        usage: api_response
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default(),
    })
}
