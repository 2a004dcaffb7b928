//! Microphone-side port.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::AudioChunk;

/// Why a pushed chunk was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushRejected {
    /// No recording is open; the chunk arrived before press or after release.
    #[error("no recording is open")]
    Closed,

    /// The hand-off buffer is full; the recording can no longer be complete.
    #[error("capture buffer overrun (bound {bound} chunks)")]
    Overrun { bound: usize },
}

/// Receiving end of a capture hand-off.
///
/// `push` is called from the driver's callback thread and must return
/// quickly; implementations never block on the consumer.
pub trait ChunkSink: Send + Sync {
    fn push(&self, chunk: AudioChunk) -> Result<(), PushRejected>;
}

/// Errors from the audio source driver.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no audio input device found")]
    NoInputDevice,

    #[error("failed to open audio input stream: {0}")]
    Stream(String),
}

/// A device that produces 16-bit mono PCM at a fixed cadence while started.
pub trait AudioSource: Send {
    /// Begin delivering chunks to `sink` until [`stop`](Self::stop).
    fn start(&mut self, sink: Arc<dyn ChunkSink>) -> Result<(), SourceError>;

    /// Stop delivering chunks. Must be safe to call when not started.
    fn stop(&mut self);
}
