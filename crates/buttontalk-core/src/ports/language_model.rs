//! Language-model port.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::domain::ConversationTurn;

/// Errors from a language-model backend.
#[derive(Debug, Error)]
pub enum LanguageModelError {
    /// The request could not be sent or was rejected.
    #[error("language model request failed: {0}")]
    Request(String),

    /// The stream broke after it started.
    #[error("language model stream failed: {0}")]
    Stream(String),

    /// The backend is misconfigured (missing key, unknown provider).
    #[error("language model misconfigured: {0}")]
    Config(String),
}

/// Lazy, finite, non-restartable sequence of content deltas.
///
/// An `Err` item terminates the stream.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LanguageModelError>> + Send>>;

/// A chat model that streams its reply.
///
/// One implementation per backend, chosen once at construction, so callers
/// never branch on the provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Open a reply stream for the full conversation so far.
    ///
    /// Implementations copy what they need from `turns` before returning.
    async fn stream(
        &self,
        turns: &[ConversationTurn],
        temperature: f32,
    ) -> Result<TokenStream, LanguageModelError>;

    /// Human-readable backend/model label for logs.
    fn name(&self) -> &str;
}
