//! OpenAI-compatible chat completions (OpenAI, Groq).
//!
//! SSE format: `data: {"choices":[{"delta":{"content":"hi"}}]}` lines,
//! terminated by `data: [DONE]`.

use async_trait::async_trait;
use buttontalk_core::{ConversationTurn, LanguageModel, LanguageModelError, TokenStream};
use reqwest::Client;
use serde::Serialize;

use crate::lines::lines;
use crate::wire::{StreamLine, WireMessage, content_stream};

pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
pub const GROQ_DEFAULT_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    stream: bool,
}

/// Client for any endpoint that speaks the OpenAI chat-completions API.
pub struct OpenAiCompatible {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    label: String,
}

impl OpenAiCompatible {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        Self {
            label: format!("openai-compatible:{model}"),
            client,
            base_url,
            api_key: api_key.into(),
            model,
        }
    }

    /// Replace the label used in logs and telemetry (e.g. `groq:llama3`).
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatible {
    async fn stream(
        &self,
        turns: &[ConversationTurn],
        temperature: f32,
    ) -> Result<TokenStream, LanguageModelError> {
        let body = ChatRequest {
            model: &self.model,
            messages: WireMessage::from_turns(turns),
            temperature,
            stream: true,
        };
        let url = self.endpoint();
        tracing::debug!(%url, model = %self.model, turns = turns.len(), "Opening chat stream");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LanguageModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LanguageModelError::Request(format!(
                "{status}: {}",
                detail.trim()
            )));
        }

        Ok(content_stream(lines(response.bytes_stream()), parse_sse_line))
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Interpret one line of an OpenAI-style SSE body.
///
/// Lines that are not `data:` fields (comments, `event:` lines, blanks) are
/// skipped, as are chunks whose delta carries no content. An `error` object
/// in the payload becomes a stream error.
pub fn parse_sse_line(line: &str) -> Result<StreamLine, LanguageModelError> {
    let trimmed = line.trim();
    let Some(data) = trimmed.strip_prefix("data:") else {
        return Ok(StreamLine::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamLine::Done);
    }

    let Ok(chunk) = serde_json::from_str::<serde_json::Value>(data) else {
        tracing::debug!(%data, "Skipping unparseable SSE payload");
        return Ok(StreamLine::Skip);
    };
    if let Some(error) = chunk.get("error") {
        let message = error["message"].as_str().map_or_else(|| error.to_string(), str::to_string);
        return Err(LanguageModelError::Stream(message));
    }

    match chunk["choices"][0]["delta"]["content"].as_str() {
        Some(content) if !content.is_empty() => Ok(StreamLine::Content(content.to_string())),
        _ => Ok(StreamLine::Skip),
    }
}
