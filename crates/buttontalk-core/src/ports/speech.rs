//! Speech synthesis and playback ports.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::SpeechAudio;

/// Failure to synthesize one sentence.
#[derive(Debug, Error)]
#[error("speech synthesis failed: {0}")]
pub struct SynthesisError(pub String);

/// Failure to play one buffer.
#[derive(Debug, Error)]
#[error("audio playback failed: {0}")]
pub struct PlaybackError(pub String);

/// Backend-agnostic text-to-speech engine.
///
/// Called with one sentence at a time; the dispatcher handles ordering.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, SynthesisError>;
}

/// Audio output that plays a buffer to completion.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Resolve once the buffer has finished playing.
    async fn play(&self, audio: &SpeechAudio) -> Result<(), PlaybackError>;
}
