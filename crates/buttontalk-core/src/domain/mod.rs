//! Domain types for a single conversational turn.
//!
//! These types are independent of any audio driver, model engine or
//! network client.

mod color;
mod conversation;
mod recording;
mod speech;
mod transcript;

pub use color::Rgb;
pub use conversation::{Conversation, ConversationTurn, Role};
pub use recording::{AudioChunk, RecordingSession, SAMPLE_RATE};
pub use speech::{SentenceChunk, SpeechAudio, SpeechJobState};
pub use transcript::{TranscriptEvent, TranscriptKind};
