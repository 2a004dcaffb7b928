//! Core domain types and port definitions for buttontalk.
//!
//! This crate holds the pure vocabulary of a push-to-talk voice turn
//! (recordings, transcripts, conversation turns, sentences, speech audio)
//! plus the trait ports that every external collaborator implements. Apart
//! from loading an optional settings file it performs no I/O.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AudioChunk, Conversation, ConversationTurn, RecordingSession, Rgb, Role, SAMPLE_RATE,
    SentenceChunk, SpeechAudio, SpeechJobState, TranscriptEvent, TranscriptKind,
};
pub use ports::{
    AudioSource, ChunkSink, ControlEvent, DisplayError, DisplaySurface, LanguageModel,
    LanguageModelError, PlaybackError, PlaybackSink, PushRejected, SourceError,
    SpeechSynthesizer, SynthesisError, TokenStream, Transcriber, TranscriptionError,
};
pub use settings::{ProviderKind, Settings, SettingsError, validate_settings};
