//! Ollama chat API.
//!
//! NDJSON format: one `{"message":{"content":"hi"},"done":false}` object per
//! line, the last one with `"done":true`.

use async_trait::async_trait;
use buttontalk_core::{ConversationTurn, LanguageModel, LanguageModelError, TokenStream};
use reqwest::Client;
use serde::Serialize;

use crate::lines::lines;
use crate::wire::{StreamLine, WireMessage, content_stream};

pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// Client for a local or remote Ollama server.
pub struct Ollama {
    client: Client,
    base_url: String,
    model: String,
    label: String,
}

impl Ollama {
    pub fn new(client: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            label: format!("ollama:{model}"),
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for Ollama {
    async fn stream(
        &self,
        turns: &[ConversationTurn],
        temperature: f32,
    ) -> Result<TokenStream, LanguageModelError> {
        let body = ChatRequest {
            model: &self.model,
            messages: WireMessage::from_turns(turns),
            stream: true,
            options: ChatOptions { temperature },
        };
        let url = self.endpoint();
        tracing::debug!(%url, model = %self.model, turns = turns.len(), "Opening chat stream");

        let response = self
            .client
            .post(&url)
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

        Ok(content_stream(lines(response.bytes_stream()), parse_ndjson_line))
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Interpret one line of an Ollama NDJSON body.
///
/// Blank lines and objects without content are skipped; an `error` field
/// becomes a stream error, and `"done": true` ends the reply.
pub fn parse_ndjson_line(line: &str) -> Result<StreamLine, LanguageModelError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(StreamLine::Skip);
    }

    let chunk: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| LanguageModelError::Stream(format!("malformed chunk: {e}")))?;
    if let Some(error) = chunk.get("error") {
        let message = error.as_str().map_or_else(|| error.to_string(), str::to_string);
        return Err(LanguageModelError::Stream(message));
    }

    match chunk["message"]["content"].as_str() {
        Some(content) if !content.is_empty() => Ok(StreamLine::Content(content.to_string())),
        _ if chunk["done"].as_bool() == Some(true) => Ok(StreamLine::Done),
        _ => Ok(StreamLine::Skip),
    }
}
