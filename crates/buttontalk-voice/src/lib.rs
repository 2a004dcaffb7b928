//! Turn pipeline for a push-to-talk voice assistant.
//!
//! ```text
//!   Idle ──pressed──▶ Recording ──released──▶ Transcribing ──text──▶ Responding
//!    ▲                                            │                      │
//!    └──────────── short press / no input ────────┘◀──── drained ────────┘
//! ```
//!
//! [`SessionController`] owns the state machine and composes the pieces:
//! [`AudioCaptureChannel`] hands microphone chunks from the driver thread to
//! an async consumer, [`SentenceSegmenter`] cuts the model's token stream
//! into sentences, [`SpeechDispatcher`] synthesizes and plays them in order,
//! and [`DisplayFeedbackController`] runs the listening/thinking animations.
//! Engines and hardware sit behind the ports in `buttontalk-core`.

#![deny(unused_crate_dependencies)]

pub mod capture;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod segmenter;
pub mod session;
pub mod speech_text;

pub use capture::{AudioCaptureChannel, CaptureConfig, CaptureProducer};
pub use dispatcher::{DispatchSummary, DispatcherConfig, SpeechDispatcher};
pub use display::{DisplayFeedbackController, PulseState};
pub use error::{CaptureError, SessionError, SpeechError};
pub use segmenter::SentenceSegmenter;
pub use session::{
    AbortReason, Collaborators, SessionConfig, SessionController, SessionEvent, TurnOutcome,
    TurnState,
};

// Only exercised by the integration tests under tests/.
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tempfile as _;
