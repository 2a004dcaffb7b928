//! Error types for the turn pipeline.

use buttontalk_core::{PlaybackError, SourceError, SynthesisError};

use crate::session::TurnState;

/// Errors from the capture hand-off.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// A recording is already open; only one may exist at a time.
    #[error("a recording is already open")]
    AlreadyRecording,

    /// `close` was called without a matching `open`.
    #[error("no recording is open")]
    NotRecording,

    /// The producer outran the consumer and at least one chunk was refused.
    #[error("capture buffer overrun: bound of {bound} chunks exceeded after {accepted} chunks")]
    Overrun { bound: usize, accepted: usize },

    /// The consumer task ended abnormally.
    #[error("capture consumer failed: {0}")]
    Consumer(String),
}

/// A per-sentence speech failure, reported on the dispatcher's error channel.
///
/// These never stop later sentences from being spoken.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("sentence {seq}: {source}")]
    Synthesis {
        seq: u64,
        #[source]
        source: SynthesisError,
    },

    #[error("sentence {seq}: {source}")]
    Playback {
        seq: u64,
        #[source]
        source: PlaybackError,
    },
}

impl SpeechError {
    /// Sequence id of the sentence that failed.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        match self {
            Self::Synthesis { seq, .. } | Self::Playback { seq, .. } => *seq,
        }
    }
}

/// Errors surfaced by the session controller's event handlers.
///
/// Collaborator failures inside a turn are not errors here; they end the
/// turn with an apology and an [`crate::TurnOutcome::Aborted`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("event not valid in state {actual:?} (expected {expected:?})")]
    InvalidState {
        expected: TurnState,
        actual: TurnState,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("audio source failed: {0}")]
    Source(#[from] SourceError),
}
