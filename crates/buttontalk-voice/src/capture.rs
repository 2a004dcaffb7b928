//! Capture hand-off: driver callback thread → bounded queue → async consumer.
//!
//! The audio driver calls [`CaptureProducer::push`] from its own thread for
//! every block it records. `push` never waits: it hands the chunk to a
//! bounded queue with `try_send`, and a full queue is an overrun that fails
//! the whole recording. A consumer task appends chunks to the open recording
//! in push order and forwards a throttled subset to preview subscribers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use buttontalk_core::{AudioChunk, ChunkSink, PushRejected, RecordingSession, SAMPLE_RATE, Settings};
use buttontalk_telemetry::{Attributes, Telemetry};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use crate::error::CaptureError;

/// Minimum spacing between two preview chunks.
pub const PREVIEW_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for [`AudioCaptureChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate: u32,

    /// Queue bound in chunks. Exceeding it is an overrun.
    pub buffer_chunks: usize,

    pub preview_interval: Duration,
}

impl CaptureConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            sample_rate: settings.sample_rate,
            buffer_chunks: settings.capture_buffer_chunks,
            preview_interval: PREVIEW_INTERVAL,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            buffer_chunks: buttontalk_core::settings::DEFAULT_CAPTURE_BUFFER_CHUNKS,
            preview_interval: PREVIEW_INTERVAL,
        }
    }
}

/// Producer side of an open recording, handed to the audio driver.
///
/// Stays valid after the recording closes; later pushes are rejected with
/// [`PushRejected::Closed`].
#[derive(Debug)]
pub struct CaptureProducer {
    tx: mpsc::Sender<AudioChunk>,
    bound: usize,
    closed: AtomicBool,
    overrun: AtomicBool,
}

impl CaptureProducer {
    /// Whether any push has been refused for lack of space.
    #[must_use]
    pub fn overrun(&self) -> bool {
        self.overrun.load(Ordering::Acquire)
    }
}

impl ChunkSink for CaptureProducer {
    fn push(&self, chunk: AudioChunk) -> Result<(), PushRejected> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PushRejected::Closed);
        }
        match self.tx.try_send(chunk) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                if !self.overrun.swap(true, Ordering::AcqRel) {
                    tracing::warn!(bound = self.bound, "Capture buffer overrun");
                }
                Err(PushRejected::Overrun { bound: self.bound })
            }
            Err(TrySendError::Closed(_)) => Err(PushRejected::Closed),
        }
    }
}

struct OpenRecording {
    id: Uuid,
    started_at: DateTime<Utc>,
    opened: Instant,
    producer: Arc<CaptureProducer>,
    cancel: CancellationToken,
    consumer: JoinHandle<Vec<AudioChunk>>,
}

/// Owns the one recording that may be open at a time.
pub struct AudioCaptureChannel {
    config: CaptureConfig,
    telemetry: Telemetry,
    preview_tx: Option<mpsc::UnboundedSender<AudioChunk>>,
    open: Option<OpenRecording>,
}

impl AudioCaptureChannel {
    #[must_use]
    pub const fn new(config: CaptureConfig, telemetry: Telemetry) -> Self {
        Self {
            config,
            telemetry,
            preview_tx: None,
            open: None,
        }
    }

    /// Receive a throttled copy of the audio of every later recording.
    ///
    /// Replaces any previous subscriber.
    pub fn subscribe_preview(&mut self) -> mpsc::UnboundedReceiver<AudioChunk> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.preview_tx = Some(tx);
        rx
    }

    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.open.is_some()
    }

    /// Open a new recording and return the producer for the audio driver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&mut self) -> Result<Arc<CaptureProducer>, CaptureError> {
        if self.open.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let bound = self.config.buffer_chunks.max(1);
        let (tx, rx) = mpsc::channel(bound);
        let producer = Arc::new(CaptureProducer {
            tx,
            bound,
            closed: AtomicBool::new(false),
            overrun: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let consumer = tokio::spawn(consume(
            rx,
            self.preview_tx.clone(),
            self.config.preview_interval,
            cancel.clone(),
        ));

        let id = Uuid::new_v4();
        tracing::debug!(%id, bound, "Recording opened");
        self.telemetry
            .mark("capture.open", Attributes::new().with("id", id.to_string()));

        self.open = Some(OpenRecording {
            id,
            started_at: Utc::now(),
            opened: Instant::now(),
            producer: Arc::clone(&producer),
            cancel,
            consumer,
        });
        Ok(producer)
    }

    /// Seal the open recording and return it.
    ///
    /// Every chunk accepted by `push` before this call is included, in push
    /// order. Fails with [`CaptureError::Overrun`] if any chunk was refused.
    pub async fn close(&mut self) -> Result<RecordingSession, CaptureError> {
        let open = self.open.take().ok_or(CaptureError::NotRecording)?;
        open.producer.closed.store(true, Ordering::Release);
        open.cancel.cancel();

        let chunks = open
            .consumer
            .await
            .map_err(|e| CaptureError::Consumer(e.to_string()))?;
        let duration = open.opened.elapsed();
        let overrun = open.producer.overrun();

        tracing::debug!(
            id = %open.id,
            chunks = chunks.len(),
            duration_ms = duration.as_millis(),
            overrun,
            "Recording closed"
        );
        self.telemetry.mark(
            "capture.close",
            Attributes::new()
                .with("id", open.id.to_string())
                .with("duration_s", duration.as_secs_f64())
                .with("chunks", chunks.len())
                .with("overrun", overrun),
        );

        if overrun {
            return Err(CaptureError::Overrun {
                bound: open.producer.bound,
                accepted: chunks.len(),
            });
        }

        Ok(RecordingSession {
            id: open.id,
            started_at: open.started_at,
            sample_rate: self.config.sample_rate,
            chunks,
            duration,
        })
    }
}

impl Drop for AudioCaptureChannel {
    fn drop(&mut self) {
        if let Some(open) = self.open.take() {
            open.producer.closed.store(true, Ordering::Release);
            open.cancel.cancel();
        }
    }
}

async fn consume(
    mut rx: mpsc::Receiver<AudioChunk>,
    preview: Option<mpsc::UnboundedSender<AudioChunk>>,
    preview_interval: Duration,
    cancel: CancellationToken,
) -> Vec<AudioChunk> {
    let mut chunks = Vec::new();
    let mut last_preview: Option<Instant> = None;

    let mut accept = |chunk: AudioChunk, chunks: &mut Vec<AudioChunk>| {
        if let Some(preview) = &preview {
            let now = Instant::now();
            if last_preview.is_none_or(|t| now.duration_since(t) >= preview_interval) {
                last_preview = Some(now);
                let _ = preview.send(chunk.clone());
            }
        }
        chunks.push(chunk);
    };

    loop {
        tokio::select! {
            chunk = rx.recv() => match chunk {
                Some(chunk) => accept(chunk, &mut chunks),
                None => break,
            },
            () = cancel.cancelled() => break,
        }
    }

    // Anything accepted before close is still queued.
    rx.close();
    while let Ok(chunk) = rx.try_recv() {
        accept(chunk, &mut chunks);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: i16) -> AudioChunk {
        AudioChunk::new(vec![tag; 4])
    }

    #[test]
    fn push_after_close_is_rejected() {
        tokio_test::block_on(async {
            let mut capture = AudioCaptureChannel::new(CaptureConfig::default(), Telemetry::disabled());
            let producer = capture.open().unwrap();
            producer.push(chunk(1)).unwrap();
            let recording = capture.close().await.unwrap();
            assert_eq!(recording.chunk_count(), 1);
            assert_eq!(producer.push(chunk(2)), Err(PushRejected::Closed));
        });
    }

    #[test]
    fn second_open_is_refused() {
        tokio_test::block_on(async {
            let mut capture = AudioCaptureChannel::new(CaptureConfig::default(), Telemetry::disabled());
            let _producer = capture.open().unwrap();
            assert!(matches!(capture.open(), Err(CaptureError::AlreadyRecording)));
            assert!(capture.is_recording());
            capture.close().await.unwrap();
            assert!(!capture.is_recording());
        });
    }

    #[test]
    fn close_without_open_fails() {
        tokio_test::block_on(async {
            let mut capture = AudioCaptureChannel::new(CaptureConfig::default(), Telemetry::disabled());
            assert!(matches!(capture.close().await, Err(CaptureError::NotRecording)));
        });
    }
}
