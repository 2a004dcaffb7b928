//! Speech-to-text port.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::RecordingSession;

/// Failure of the transcription engine itself.
///
/// An empty transcript is not an error; it is the normal "no input" result.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("transcription model not loaded")]
    ModelNotLoaded,

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("transcription failed: {0}")]
    Engine(String),
}

/// Backend-agnostic speech-to-text engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a sealed recording (16 kHz mono 16-bit) to final text.
    ///
    /// `on_partial` may be invoked with preview text while decoding; those
    /// calls are advisory only.
    async fn transcribe(
        &self,
        recording: &RecordingSession,
        on_partial: &(dyn for<'p> Fn(&'p str) + Send + Sync),
    ) -> Result<String, TranscriptionError>;
}
