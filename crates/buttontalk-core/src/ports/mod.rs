//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the turn pipeline expects from drivers and
//! engines. They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No audio-driver, model-runtime or HTTP types in any signature
//! - Engines that do real work off-thread are `async` (via `async_trait`)
//! - Hardware surfaces that are cheap and synchronous (display, audio source)
//!   stay synchronous
//! - Every collaborator failure has its own error type so the session
//!   controller can decide locally whether to degrade or abort

mod audio_source;
mod control;
mod display;
mod language_model;
mod speech;
mod transcriber;

pub use audio_source::{AudioSource, ChunkSink, PushRejected, SourceError};
pub use control::ControlEvent;
pub use display::{DisplayError, DisplaySurface};
pub use language_model::{LanguageModel, LanguageModelError, TokenStream};
pub use speech::{PlaybackError, PlaybackSink, SpeechSynthesizer, SynthesisError};
pub use transcriber::{Transcriber, TranscriptionError};
