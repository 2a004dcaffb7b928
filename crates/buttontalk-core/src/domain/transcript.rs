use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a transcript is a live preview or the settled result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptKind {
    Partial,
    Final,
}

/// Text produced by the transcription engine.
///
/// Partial events are advisory (live display only). Exactly one final event
/// is produced per recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub kind: TranscriptKind,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl TranscriptEvent {
    #[must_use]
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            kind: TranscriptKind::Partial,
            text: text.into(),
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            kind: TranscriptKind::Final,
            text: text.into(),
            at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self.kind, TranscriptKind::Final)
    }
}
