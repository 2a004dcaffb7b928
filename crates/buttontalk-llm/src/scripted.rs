//! Deterministic offline language model.

use std::time::Duration;

use async_trait::async_trait;
use buttontalk_core::{ConversationTurn, LanguageModel, LanguageModelError, TokenStream};

/// Reply streamed when no other script is given.
pub const SCRIPTED_REPLY: &str = "Thanks. Your audio pipeline is working. This is only a test.";

/// Streams a fixed reply word by word, ignoring the conversation.
///
/// Useful for exercising the speech pipeline without a network or model.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    reply: String,
    token_delay: Duration,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new(SCRIPTED_REPLY)
    }
}

impl ScriptedModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            token_delay: Duration::ZERO,
        }
    }

    /// Pause between tokens to mimic a remote model.
    #[must_use]
    pub const fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// The reply split into tokens: each word followed by a space.
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        self.reply
            .split_whitespace()
            .map(|word| format!("{word} "))
            .collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn stream(
        &self,
        turns: &[ConversationTurn],
        _temperature: f32,
    ) -> Result<TokenStream, LanguageModelError> {
        tracing::debug!(turns = turns.len(), "Scripted reply");
        let delay = self.token_delay;
        let stream = futures_util::stream::unfold(self.tokens().into_iter(), move |mut tokens| async move {
            let token = tokens.next()?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Some((Ok(token), tokens))
        });
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
