//! Ordered synthesis and playback of streamed sentences.
//!
//! Two worker tasks connected by FIFO channels:
//!
//! ```text
//!   submit ──▶ [synthesis worker] ──audio──▶ [playback worker] ──▶ done count
//! ```
//!
//! The synthesis worker takes a lookahead permit before synthesizing and the
//! playback worker returns it once that sentence has finished playing, so at
//! most `lookahead` sentences are in flight between the two. With a
//! lookahead of 1 the dispatcher is strictly sequential; with 2 the next
//! sentence is synthesized while the current one plays. Every job, failed or
//! not, passes through the playback worker, so jobs reach a terminal state in
//! submission order. A collaborator that panics fails its job instead of
//! taking the worker down with it.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use buttontalk_core::{
    PlaybackError, PlaybackSink, SentenceChunk, Settings, SpeechAudio, SpeechJobState,
    SpeechSynthesizer, SynthesisError,
};
use buttontalk_telemetry::{Attributes, Telemetry};
use futures_util::FutureExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub use crate::error::SpeechError;
use crate::speech_text::clean_for_speech;

/// How long [`SpeechDispatcher::shutdown`] waits for each worker.
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Dispatcher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Sentences allowed between synthesis start and playback end.
    pub lookahead: usize,
}

impl DispatcherConfig {
    /// Synthesis of the next sentence overlaps playback of the current one.
    pub const PIPELINED: Self = Self { lookahead: 2 };

    /// Synthesize only after the previous sentence has finished playing.
    pub const SEQUENTIAL: Self = Self { lookahead: 1 };

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lookahead: settings.synthesis_lookahead.max(1),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::PIPELINED
    }
}

/// Outcome of the jobs covered by one [`SpeechDispatcher::drain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Jobs that reached `Done`, including ones with nothing to say.
    pub completed: usize,
    /// Jobs that reached `Failed`.
    pub failed: usize,
}

impl DispatchSummary {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.completed + self.failed
    }
}

struct Job {
    id: u64,
    chunk: SentenceChunk,
}

/// Synthesis result handed to the playback worker.
enum Ready {
    Audio {
        job: Job,
        audio: SpeechAudio,
        permit: OwnedSemaphorePermit,
    },
    /// Nothing to play: either empty after cleanup or synthesis failed.
    Settled {
        job: Job,
        failure: Option<SpeechError>,
    },
}

struct Shared {
    states: Mutex<BTreeMap<u64, SpeechJobState>>,
    finished_tx: watch::Sender<u64>,
    errors: mpsc::UnboundedSender<SpeechError>,
    telemetry: Telemetry,
}

impl Shared {
    fn set_state(&self, id: u64, state: SpeechJobState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, state);
    }

    fn report(&self, error: SpeechError) {
        tracing::warn!(seq = error.seq(), error = %error, "Speech job failed, skipping");
        let _ = self.errors.send(error);
    }

    fn settle(&self, id: u64, state: SpeechJobState) {
        self.set_state(id, state);
        self.finished_tx.send_modify(|finished| *finished = id + 1);
    }
}

/// Speaks sentences in strict submission order.
pub struct SpeechDispatcher {
    job_tx: Option<mpsc::UnboundedSender<Job>>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    drained: AtomicU64,
    workers: Vec<JoinHandle<()>>,
}

impl SpeechDispatcher {
    /// Spawn the worker tasks.
    ///
    /// Returns the dispatcher and a receiver for per-sentence failures.
    /// Must be called from within a tokio runtime.
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        playback: Arc<dyn PlaybackSink>,
        config: DispatcherConfig,
        telemetry: Telemetry,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechError>) {
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let (finished_tx, _) = watch::channel(0);
        let lookahead = Arc::new(Semaphore::new(config.lookahead.max(1)));

        let shared = Arc::new(Shared {
            states: Mutex::new(BTreeMap::new()),
            finished_tx,
            errors: error_tx,
            telemetry,
        });

        let workers = vec![
            tokio::spawn(synthesis_worker(
                job_rx,
                ready_tx,
                synthesizer,
                lookahead,
                Arc::clone(&shared),
            )),
            tokio::spawn(playback_worker(ready_rx, playback, Arc::clone(&shared))),
        ];
        tracing::debug!(lookahead = config.lookahead, "Speech dispatcher started");

        let dispatcher = Self {
            job_tx: Some(job_tx),
            shared,
            next_id: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            workers,
        };
        (dispatcher, error_rx)
    }

    /// Queue a sentence. Returns the job id for [`Self::job_state`].
    pub fn submit(&self, chunk: SentenceChunk) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        self.shared.set_state(id, SpeechJobState::Pending);
        tracing::debug!(id, seq = chunk.seq, "Sentence queued for speech");

        let sent = self
            .job_tx
            .as_ref()
            .is_some_and(|tx| tx.send(Job { id, chunk }).is_ok());
        if !sent {
            tracing::warn!(id, "Speech workers are gone; dropping sentence");
            self.shared.settle(id, SpeechJobState::Failed);
        }
        id
    }

    /// Queue a one-off utterance and wait for it (and anything before it).
    pub async fn say(&self, text: &str) -> DispatchSummary {
        self.submit(SentenceChunk {
            seq: 0,
            text: text.to_string(),
            complete: true,
        });
        self.drain().await
    }

    /// Wait until every job submitted so far is `Done` or `Failed`.
    ///
    /// The summary covers the jobs submitted since the previous drain.
    pub async fn drain(&self) -> DispatchSummary {
        let target = self.next_id.load(Ordering::Acquire);
        let mut finished = self.shared.finished_tx.subscribe();
        if finished.wait_for(|done| *done >= target).await.is_err() {
            tracing::warn!("Speech workers stopped before draining");
        }

        let from = self.drained.swap(target, Ordering::AcqRel);
        let mut states = self
            .shared
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut summary = DispatchSummary::default();
        for id in from..target {
            match states.remove(&id) {
                Some(SpeechJobState::Done) => summary.completed += 1,
                Some(_) | None => summary.failed += 1,
            }
        }
        summary
    }

    /// Current state of a job that has not been drained yet.
    #[must_use]
    pub fn job_state(&self, id: u64) -> Option<SpeechJobState> {
        self.shared
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }

    /// Jobs submitted but not yet terminal.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        let submitted = self.next_id.load(Ordering::Acquire);
        submitted.saturating_sub(*self.shared.finished_tx.borrow())
    }

    /// Finish queued work and stop the workers.
    pub async fn shutdown(mut self) {
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            if tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, worker).await.is_err() {
                tracing::warn!("Speech worker did not stop within {WORKER_SHUTDOWN_TIMEOUT:?}");
            }
        }
        tracing::debug!("Speech dispatcher stopped");
    }
}

impl Drop for SpeechDispatcher {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn synthesis_worker(
    mut jobs: mpsc::UnboundedReceiver<Job>,
    ready: mpsc::UnboundedSender<Ready>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    lookahead: Arc<Semaphore>,
    shared: Arc<Shared>,
) {
    while let Some(job) = jobs.recv().await {
        let text = clean_for_speech(&job.chunk.text);
        if text.is_empty() {
            tracing::debug!(seq = job.chunk.seq, "Nothing speakable in sentence");
            let _ = ready.send(Ready::Settled { job, failure: None });
            continue;
        }

        let Ok(permit) = Arc::clone(&lookahead).acquire_owned().await else {
            break;
        };
        shared.set_state(job.id, SpeechJobState::Synthesizing);

        let started = Instant::now();
        let result = AssertUnwindSafe(synthesizer.synthesize(&text))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(SynthesisError(panic_message(panic.as_ref()))));
        shared.telemetry.record_span(
            "tts.synthesize",
            started.elapsed(),
            Attributes::new()
                .with("seq", job.chunk.seq)
                .with("chars", text.chars().count())
                .with("ok", result.is_ok()),
        );

        let next = match result {
            Ok(audio) => {
                tracing::debug!(
                    seq = job.chunk.seq,
                    samples = audio.samples.len(),
                    duration_ms = audio.duration.as_millis(),
                    "Synthesized sentence"
                );
                shared.set_state(job.id, SpeechJobState::Synthesized);
                Ready::Audio { job, audio, permit }
            }
            Err(source) => {
                let failure = SpeechError::Synthesis {
                    seq: job.chunk.seq,
                    source,
                };
                Ready::Settled {
                    job,
                    failure: Some(failure),
                }
            }
        };
        if ready.send(next).is_err() {
            break;
        }
    }
}

async fn playback_worker(
    mut ready: mpsc::UnboundedReceiver<Ready>,
    playback: Arc<dyn PlaybackSink>,
    shared: Arc<Shared>,
) {
    while let Some(item) = ready.recv().await {
        match item {
            Ready::Settled { job, failure: None } => {
                shared.settle(job.id, SpeechJobState::Done);
            }
            Ready::Settled {
                job,
                failure: Some(error),
            } => {
                shared.report(error);
                shared.settle(job.id, SpeechJobState::Failed);
            }
            Ready::Audio { job, audio, permit } => {
                shared.set_state(job.id, SpeechJobState::Playing);
                let started = Instant::now();
                let result = AssertUnwindSafe(playback.play(&audio))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(PlaybackError(panic_message(panic.as_ref()))));
                shared.telemetry.record_span(
                    "tts.playback",
                    started.elapsed(),
                    Attributes::new()
                        .with("seq", job.chunk.seq)
                        .with("audio_s", audio.duration.as_secs_f64())
                        .with("ok", result.is_ok()),
                );
                drop(permit);

                match result {
                    Ok(()) => shared.settle(job.id, SpeechJobState::Done),
                    Err(source) => {
                        shared.report(SpeechError::Playback {
                            seq: job.chunk.seq,
                            source,
                        });
                        shared.settle(job.id, SpeechJobState::Failed);
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("panicked: {detail}")
}
