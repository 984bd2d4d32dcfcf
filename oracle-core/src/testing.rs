//! Testing utilities.
//!
//! - [`MockGenerator`] for deterministic tests without API calls
//! - Fixtures for a conventional table set and a well-formed conflict map

use crate::generator::TextGenerator;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use textgen::Request;

/// A scripted response from the mock generator.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this text.
    Text(String),
    /// Fail with a service error carrying this message.
    Fail(String),
    /// Sleep for this long, then return an empty object.
    Stall(Duration),
}

impl MockResponse {
    pub fn text(text: impl Into<String>) -> Self {
        MockResponse::Text(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockResponse::Fail(message.into())
    }

    pub fn stall(duration: Duration) -> Self {
        MockResponse::Stall(duration)
    }
}

/// A text generator that replays scripted responses and counts calls.
///
/// Clones share the script, the counter and the recorded requests, so a test
/// can hand one clone to the code under test and inspect another.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<Request>>>,
    calls: Arc<AtomicUsize>,
}

impl MockGenerator {
    /// Create a mock that returns `responses` in order.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    /// Add a response to the end of the script.
    pub fn queue_response(&self, response: MockResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(response);
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    fn next_response(&self) -> Option<MockResponse> {
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        (!responses.is_empty()).then(|| responses.remove(0))
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: &Request) -> Result<String, textgen::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match self.next_response() {
            Some(MockResponse::Text(text)) => Ok(text),
            Some(MockResponse::Fail(message)) => Err(textgen::Error::Api {
                status: 500,
                message,
            }),
            Some(MockResponse::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok("{}".to_string())
            }
            None => Err(textgen::Error::EmptyResponse),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}

/// Four tables of thirteen elements, the conventional oracle shape.
pub fn sample_tables_json() -> String {
    let tables = ["Oracle of Ash", "Oracle of Bone", "Oracle of Coin", "Oracle of Dust"];
    let object: serde_json::Map<String, serde_json::Value> = tables
        .iter()
        .map(|name| {
            let short = name.trim_start_matches("Oracle of ");
            let rows = (1..=13)
                .map(|row| serde_json::Value::String(format!("{short} element {row}")))
                .collect();
            (name.to_string(), serde_json::Value::Array(rows))
        })
        .collect();
    serde_json::Value::Object(object).to_string()
}

/// A fenced conflict-map response that satisfies the schema check.
pub fn sample_conflict_map_response() -> String {
    let characters: Vec<serde_json::Value> = ["Ash", "Bone", "Coin", "Dust"]
        .iter()
        .map(|name| {
            serde_json::json!({
                "name": name,
                "origin_element": format!("{name} element 1"),
                "description": format!("{name} walks the ruined road."),
                "particular_strength": "Stubbornness",
                "best_interests": ["survival", "revenge"],
                "approaches": {
                    "covertly": "d12",
                    "directly": "d10",
                    "for myself": "d8",
                    "for others": "d6",
                    "with love": "d6",
                    "with violence": "d4"
                }
            })
        })
        .collect();

    let body = serde_json::json!({
        "elements": ["Ash element 1", "Bone element 1", "Coin element 1", "Dust element 1"],
        "characters": characters,
        "conflicts": [
            {"from": "Ash", "to": "Bone", "animosity_type": "envy"},
            {"from": "Coin", "to": "Dust", "animosity_type": "duty"}
        ]
    });
    format!("```json\n{body:#}\n```")
}
