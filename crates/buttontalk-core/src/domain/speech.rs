//! Sentences on their way to the speaker.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A sentence-bounded fragment of a streamed reply.
///
/// `seq` increases monotonically within a turn, starting at 1.
/// `complete` is false only for the trailing remainder flushed at stream end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceChunk {
    pub seq: u64,
    pub text: String,
    pub complete: bool,
}

/// Synthesized speech: 16-bit mono PCM ready for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub duration: Duration,
}

impl SpeechAudio {
    /// Build audio from samples, deriving the duration from the sample rate.
    #[must_use]
    pub fn from_samples(samples: Vec<i16>, sample_rate: u32) -> Self {
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            #[allow(clippy::cast_precision_loss)]
            Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate))
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }
}

/// Lifecycle of one sentence inside the speech dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechJobState {
    Pending,
    Synthesizing,
    Synthesized,
    Playing,
    Done,
    Failed,
}

impl SpeechJobState {
    /// Done and Failed are terminal; nothing happens to the job afterwards.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}
