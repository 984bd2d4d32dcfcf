//! Pulling a JSON document out of generated text.
//!
//! Text services like to wrap structured output in markdown fences
//! (```` ```json ... ``` ````). [`split_fence`] recognizes one leading fence
//! with an optional language hint and its matching trailing fence; [`extract`]
//! parses whatever is left.

use serde_json::Value;
use thiserror::Error;

const FENCE: &str = "```";
const SNIPPET_CHARS: usize = 200;

/// Errors from extracting JSON out of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("the response contained no content")]
    Empty,

    #[error("{message} (in: {snippet})")]
    Malformed { snippet: String, message: String },
}

/// The result of fence tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fenced<'a> {
    /// Language hint after the opening fence, e.g. `json`.
    pub language: Option<&'a str>,
    /// The text between the fences, trimmed.
    pub body: &'a str,
    /// Whether an opening fence was found.
    pub fenced: bool,
    /// Whether a closing fence was found.
    pub closed: bool,
}

/// Split `text` into an optional fence header and its body.
///
/// - No leading fence: the trimmed text is the body.
/// - A leading fence may be followed by a language hint, then whitespace or a
///   newline, or the body directly (`` ```json{...}``` ``).
/// - A trailing fence is stripped with or without a newline before it. A
///   missing trailing fence is tolerated.
pub fn split_fence(text: &str) -> Fenced<'_> {
    let text = text.trim();

    let Some(rest) = text.strip_prefix(FENCE) else {
        return Fenced {
            language: None,
            body: text,
            fenced: false,
            closed: false,
        };
    };

    let hint_len = rest
        .find(|c: char| c.is_whitespace() || matches!(c, '{' | '[' | '`'))
        .unwrap_or(rest.len());
    let (hint, rest) = rest.split_at(hint_len);

    let (body, closed) = match rest.trim_end().strip_suffix(FENCE) {
        Some(body) => (body, true),
        None => (rest, false),
    };

    Fenced {
        language: (!hint.is_empty()).then_some(hint),
        body: body.trim(),
        fenced: true,
        closed,
    }
}

/// Parse generated text as JSON, tolerating a surrounding markdown fence.
pub fn extract(raw: &str) -> Result<Value, DecodeError> {
    let fenced = split_fence(raw);
    if fenced.body.is_empty() {
        return Err(DecodeError::Empty);
    }

    serde_json::from_str(fenced.body).map_err(|e| DecodeError::Malformed {
        snippet: snippet(fenced.body),
        message: e.to_string(),
    })
}

/// A char-safe prefix of `text` for diagnostics.
pub(crate) fn snippet(text: &str) -> String {
    if text.chars().count() > SNIPPET_CHARS {
        let truncated: String = text.chars().take(SNIPPET_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}
