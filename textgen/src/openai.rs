//! OpenAI-compatible chat completions wire format.

use crate::{Error, FinishReason, Request, Response, Usage};
use serde::{Deserialize, Serialize};

pub(crate) fn endpoint(base_url: &str) -> String {
    format!("{base_url}/v1/chat/completions")
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatRequest {
    pub(crate) fn build(model: &str, request: &Request) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        Self {
            model: model.to_string(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

pub(crate) fn parse_response(body: &str) -> Result<Response, Error> {
    let api_response: ChatResponse =
        serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or(Error::EmptyResponse)?;

    let text = choice.message.content.ok_or(Error::EmptyResponse)?;

    Ok(Response {
        id: api_response.id,
        model: api_response.model,
        text,
        finish_reason: FinishReason::from_openai(choice.finish_reason.as_deref()),
        usage: api_response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_includes_system_message_first() {
        let request = Request::new("Make tables")
            .with_system("You are a generator of RPG oracle tables.")
            .with_temperature(0.9);
        let json = serde_json::to_value(ChatRequest::build("gpt-4o-mini", &request)).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Make tables");
        assert!((json["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_request_without_system() {
        let json = serde_json::to_value(ChatRequest::build("m", &Request::new("hi"))).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(response.text, "{}");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let body = r#"{"model": "gpt-4o-mini", "choices": []}"#;
        assert!(matches!(parse_response(body), Err(Error::EmptyResponse)));
    }

    #[test]
    fn test_parse_response_garbage() {
        assert!(matches!(parse_response("<html>"), Err(Error::Parse(_))));
    }
}
