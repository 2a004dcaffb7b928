//! Turn state machine.
//!
//! ```text
//!   Idle ──pressed──▶ Recording ──released──▶ Transcribing ──▶ Responding ──▶ Idle
//! ```
//!
//! Every path ends back in `Idle`. Short presses, empty transcripts and
//! collaborator failures end the turn early with a spoken phrase; nothing a
//! collaborator does can leave the controller stuck outside `Idle`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use buttontalk_core::{
    AudioSource, ControlEvent, Conversation, DisplaySurface, LanguageModel, PlaybackSink, Rgb,
    Role, SentenceChunk, Settings, SpeechSynthesizer, TranscriptEvent, Transcriber,
};
use buttontalk_telemetry::{Attributes, Telemetry};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::capture::{AudioCaptureChannel, CaptureConfig};
use crate::dispatcher::{DispatcherConfig, SpeechDispatcher};
use crate::display::DisplayFeedbackController;
pub use crate::error::SessionError;
use crate::error::{CaptureError, SpeechError};
use crate::segmenter::SentenceSegmenter;

/// Minimum spacing between two partial-transcript display updates.
pub const PARTIAL_DISPLAY_INTERVAL: Duration = Duration::from_millis(100);

// ── State and events ───────────────────────────────────────────────

/// Phase of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    /// Waiting for the control to be pressed.
    Idle,

    /// Control held; audio is being captured.
    Recording,

    /// Control released; waiting for the final transcript.
    Transcribing,

    /// Streaming the reply into speech.
    Responding,
}

/// Why a turn was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The capture buffer overflowed; the recording is incomplete.
    CaptureOverrun,
    /// The microphone could not be started or the capture consumer failed.
    CaptureFailed,
    /// The transcription engine failed.
    TranscriptionFailed,
    /// The reply stream failed before producing any content.
    StreamFailed,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Released before the short-press threshold; the greeting was spoken.
    ShortPress,

    /// The transcript was empty.
    NoInput,

    /// The reply was spoken (possibly truncated by a stream error).
    Answered {
        text: String,
        sentences: usize,
        failed_sentences: usize,
        truncated: bool,
    },

    /// The turn was abandoned with an apology.
    Aborted(AbortReason),
}

/// Events emitted by the controller for UIs and logs.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(TurnState),

    /// Live or final transcript text.
    Transcript(TranscriptEvent),

    /// A sentence of the reply was handed to speech.
    SentenceQueued(SentenceChunk),

    /// A canned phrase (greeting, apology, ...) was spoken.
    Utterance(String),

    /// One sentence could not be spoken.
    SpeechFailed { seq: u64, message: String },

    TurnCompleted(TurnOutcome),
}

// ── Configuration ──────────────────────────────────────────────────

/// Configuration for [`SessionController`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub capture: CaptureConfig,
    pub dispatcher: DispatcherConfig,

    /// Holds shorter than this speak the greeting instead of transcribing.
    pub short_press: Duration,

    pub temperature: f32,
    pub system_prompt: String,

    pub online_text: String,
    pub greeting_text: String,
    pub no_input_text: String,
    pub apology_text: String,
    pub goodbye_text: String,

    pub listening_color: Rgb,
    pub thinking_color: Rgb,
    pub pulse_period: Duration,

    pub partial_display_interval: Duration,
}

impl SessionConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            capture: CaptureConfig::from_settings(settings),
            dispatcher: DispatcherConfig::from_settings(settings),
            short_press: Duration::from_millis(settings.short_press_ms),
            temperature: settings.temperature,
            system_prompt: settings.system_prompt.clone(),
            online_text: settings.online_text.clone(),
            greeting_text: settings.greeting_text.clone(),
            no_input_text: settings.no_input_text.clone(),
            apology_text: settings.apology_text.clone(),
            goodbye_text: settings.goodbye_text.clone(),
            listening_color: settings.listening_color,
            thinking_color: settings.thinking_color,
            pulse_period: Duration::from_millis(settings.pulse_period_ms),
            partial_display_interval: PARTIAL_DISPLAY_INTERVAL,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::with_defaults())
    }
}

/// External engines and hardware the controller drives.
pub struct Collaborators {
    pub source: Box<dyn AudioSource>,
    pub transcriber: Arc<dyn Transcriber>,
    pub model: Arc<dyn LanguageModel>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub playback: Arc<dyn PlaybackSink>,
    pub display: Arc<dyn DisplaySurface>,
}

// ── Controller ─────────────────────────────────────────────────────

/// What came back from one reply stream.
struct Reply {
    text: String,
    sentences: usize,
    failed_sentences: usize,
    stream_failed: bool,
}

/// Owns the conversation and runs one turn at a time.
pub struct SessionController {
    state: TurnState,
    config: SessionConfig,
    conversation: Conversation,
    source: Box<dyn AudioSource>,
    capture: AudioCaptureChannel,
    transcriber: Arc<dyn Transcriber>,
    model: Arc<dyn LanguageModel>,
    dispatcher: SpeechDispatcher,
    speech_errors: mpsc::UnboundedReceiver<SpeechError>,
    display: DisplayFeedbackController,
    telemetry: Telemetry,
    turn_started: Option<Instant>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionController {
    /// Create a controller in `Idle`.
    ///
    /// Returns the controller and a receiver for [`SessionEvent`]s. Must be
    /// called from within a tokio runtime.
    pub fn new(
        collaborators: Collaborators,
        config: SessionConfig,
        telemetry: Telemetry,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (dispatcher, speech_errors) = SpeechDispatcher::new(
            collaborators.synthesizer,
            collaborators.playback,
            config.dispatcher,
            telemetry.clone(),
        );
        let conversation = if config.system_prompt.trim().is_empty() {
            Conversation::new()
        } else {
            Conversation::with_system_prompt(config.system_prompt.clone())
        };

        let controller = Self {
            state: TurnState::Idle,
            capture: AudioCaptureChannel::new(config.capture.clone(), telemetry.clone()),
            config,
            conversation,
            source: collaborators.source,
            transcriber: collaborators.transcriber,
            model: collaborators.model,
            dispatcher,
            speech_errors,
            display: DisplayFeedbackController::new(collaborators.display),
            telemetry,
            turn_started: None,
            event_tx,
        };
        (controller, event_rx)
    }

    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub const fn display(&self) -> &DisplayFeedbackController {
        &self.display
    }

    /// Receive throttled copies of captured audio for live previews.
    ///
    /// The controller does not transcribe these itself; live partials shown
    /// during a turn come from the final `transcribe` call. A streaming
    /// engine or UI can subscribe here to preview while the control is held.
    pub fn subscribe_audio_preview(&mut self) -> mpsc::UnboundedReceiver<buttontalk_core::AudioChunk> {
        self.capture.subscribe_preview()
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Speak the startup phrase.
    pub async fn announce_online(&mut self) {
        tracing::info!("Session online");
        self.display.write("Ready");
        let text = self.config.online_text.clone();
        self.say(&text).await;
    }

    /// Process control edges until `shutdown` fires or the sender is dropped.
    ///
    /// Each turn runs to completion before the next edge is read. Edges that
    /// queued up during a turn are collapsed to the latest one, so a control
    /// still held after the reply starts a new recording.
    pub async fn run(
        &mut self,
        mut controls: mpsc::UnboundedReceiver<ControlEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                event = controls.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle_control(event).await;

            if self.state == TurnState::Idle {
                let mut latest = None;
                while let Ok(stale) = controls.try_recv() {
                    latest = Some(stale);
                }
                if latest == Some(ControlEvent::Pressed) {
                    tracing::debug!("Control still held after turn; recording again");
                    self.handle_control(ControlEvent::Pressed).await;
                }
            }
        }
        self.shutdown().await;
    }

    /// Stop animations, abandon an open recording, say goodbye and flush
    /// telemetry.
    pub async fn shutdown(&mut self) {
        tracing::info!("Session shutting down");
        self.display.stop_pulse().await;
        if self.state == TurnState::Recording {
            self.source.stop();
            let _ = self.capture.close().await;
        }
        self.set_state(TurnState::Idle);

        let goodbye = self.config.goodbye_text.clone();
        if !goodbye.trim().is_empty() {
            self.say(&goodbye).await;
        }
        self.display.clear();
        self.display.off();
        self.telemetry.shutdown().await;
    }

    async fn handle_control(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Pressed => {
                if let Err(e) = self.on_pressed().await {
                    tracing::debug!(error = %e, "Ignoring press");
                }
            }
            ControlEvent::Released => match self.on_released().await {
                Ok(outcome) => tracing::info!(?outcome, "Turn finished"),
                Err(e) => tracing::debug!(error = %e, "Ignoring release"),
            },
        }
    }

    // ── Turn phases ────────────────────────────────────────────────

    /// `Idle → Recording`: open a recording and start the microphone.
    pub async fn on_pressed(&mut self) -> Result<(), SessionError> {
        self.expect_state(TurnState::Idle)?;
        self.turn_started = Some(Instant::now());
        self.telemetry.mark("turn.press", Attributes::new());

        let producer = self.capture.open()?;
        if let Err(e) = self.source.start(producer) {
            tracing::warn!(error = %e, "Audio source failed to start");
            let _ = self.capture.close().await;
            self.abort(AbortReason::CaptureFailed).await;
            return Err(e.into());
        }

        self.set_state(TurnState::Recording);
        self.display
            .start_pulse(self.config.listening_color, self.config.pulse_period);
        self.display.write("Listening...");
        Ok(())
    }

    /// `Recording → Transcribing → …→ Idle`: seal the recording and run the
    /// rest of the turn.
    pub async fn on_released(&mut self) -> Result<TurnOutcome, SessionError> {
        self.expect_state(TurnState::Recording)?;
        self.source.stop();
        self.display.stop_pulse().await;
        self.telemetry.mark("turn.release", Attributes::new());
        self.set_state(TurnState::Transcribing);

        let recording = match self.capture.close().await {
            Ok(recording) => recording,
            Err(CaptureError::Overrun { bound, accepted }) => {
                tracing::warn!(bound, accepted, "Recording overran its buffer");
                return Ok(self.abort(AbortReason::CaptureOverrun).await);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Recording could not be sealed");
                return Ok(self.abort(AbortReason::CaptureFailed).await);
            }
        };

        tracing::debug!(
            duration_ms = recording.duration.as_millis(),
            chunks = recording.chunk_count(),
            "Recording sealed"
        );
        if recording.duration < self.config.short_press {
            let greeting = self.config.greeting_text.clone();
            self.say(&greeting).await;
            return Ok(self.finish(TurnOutcome::ShortPress));
        }

        self.display.write("Thinking...");
        let transcript = {
            let _span = self.telemetry.span("stt.transcribe");
            let last_partial: Mutex<Option<Instant>> = Mutex::new(None);
            let display = &self.display;
            let event_tx = &self.event_tx;
            let interval = self.config.partial_display_interval;
            let on_partial = |partial: &str| {
                let now = Instant::now();
                let mut last = last_partial.lock().unwrap_or_else(PoisonError::into_inner);
                if last.is_some_and(|t| now.duration_since(t) < interval) {
                    return;
                }
                *last = Some(now);
                display.write_tail(partial);
                let _ = event_tx.send(SessionEvent::Transcript(TranscriptEvent::partial(partial)));
            };
            self.transcriber.transcribe(&recording, &on_partial).await
        };

        let text = match transcript {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Transcription failed");
                return Ok(self.abort(AbortReason::TranscriptionFailed).await);
            }
        };

        tracing::info!(%text, "Transcribed");
        self.display.write_tail(&text);
        self.emit(SessionEvent::Transcript(TranscriptEvent::final_text(&text)));

        if text.is_empty() {
            let no_input = self.config.no_input_text.clone();
            self.say(&no_input).await;
            return Ok(self.finish(TurnOutcome::NoInput));
        }

        Ok(self.respond(text).await)
    }

    /// Run the reply phase for a transcript that came from somewhere other
    /// than the microphone.
    pub async fn respond_to_text(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        self.expect_state(TurnState::Idle)?;
        let text = text.trim().to_string();
        self.turn_started = Some(Instant::now());
        self.emit(SessionEvent::Transcript(TranscriptEvent::final_text(&text)));

        if text.is_empty() {
            let no_input = self.config.no_input_text.clone();
            self.say(&no_input).await;
            return Ok(self.finish(TurnOutcome::NoInput));
        }
        Ok(self.respond(text).await)
    }

    /// `Responding → Idle`: stream the reply into speech, then record it.
    async fn respond(&mut self, text: String) -> TurnOutcome {
        self.set_state(TurnState::Responding);
        self.conversation.append(Role::User, text);
        self.display
            .start_pulse(self.config.thinking_color, self.config.pulse_period);

        let reply = self.stream_reply().await;
        self.display.stop_pulse().await;

        if !reply.text.is_empty() {
            self.conversation.append(Role::Assistant, reply.text.clone());
        }
        if reply.stream_failed && reply.text.is_empty() {
            return self.abort(AbortReason::StreamFailed).await;
        }

        self.finish(TurnOutcome::Answered {
            text: reply.text,
            sentences: reply.sentences,
            failed_sentences: reply.failed_sentences,
            truncated: reply.stream_failed,
        })
    }

    async fn stream_reply(&mut self) -> Reply {
        let mut reply = Reply {
            text: String::new(),
            sentences: 0,
            failed_sentences: 0,
            stream_failed: false,
        };
        let started = Instant::now();
        let mut stream_span = self.telemetry.span("llm.stream");
        stream_span.attr("model", self.model.name().to_string());

        let stream = self
            .model
            .stream(self.conversation.turns(), self.config.temperature)
            .await;
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, model = self.model.name(), "Reply stream failed to open");
                reply.stream_failed = true;
                return reply;
            }
        };

        let mut segmenter = SentenceSegmenter::new();
        let mut first_token = true;
        while let Some(item) = stream.next().await {
            match item {
                Ok(delta) if delta.is_empty() => {}
                Ok(delta) => {
                    if first_token {
                        first_token = false;
                        self.telemetry.value(
                            "llm.time_to_first_token_s",
                            started.elapsed().as_secs_f64(),
                            Attributes::new().with("model", self.model.name().to_string()),
                        );
                    }
                    reply.text.push_str(&delta);
                    for chunk in segmenter.feed(&delta) {
                        self.queue_sentence(chunk);
                        reply.sentences += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, received = reply.text.len(), "Reply stream failed; keeping partial text");
                    reply.stream_failed = true;
                    break;
                }
            }
        }
        drop(stream);
        if let Some(chunk) = segmenter.flush() {
            self.queue_sentence(chunk);
            reply.sentences += 1;
        }
        stream_span.attr("chars", reply.text.chars().count());
        stream_span.finish();

        let summary = self.dispatcher.drain().await;
        reply.failed_sentences = summary.failed;
        self.forward_speech_errors();

        reply.text = reply.text.trim().to_string();
        reply
    }

    fn queue_sentence(&self, chunk: SentenceChunk) {
        tracing::debug!(seq = chunk.seq, text = %chunk.text, "Sentence ready");
        self.emit(SessionEvent::SentenceQueued(chunk.clone()));
        self.dispatcher.submit(chunk);
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Speak a canned phrase and wait for it to finish.
    async fn say(&mut self, text: &str) {
        self.emit(SessionEvent::Utterance(text.to_string()));
        self.dispatcher.say(text).await;
        self.forward_speech_errors();
    }

    /// End the turn early: stop animations and apologize.
    async fn abort(&mut self, reason: AbortReason) -> TurnOutcome {
        tracing::warn!(?reason, "Turn aborted");
        self.display.stop_pulse().await;
        let apology = self.config.apology_text.clone();
        self.say(&apology).await;
        self.finish(TurnOutcome::Aborted(reason))
    }

    fn finish(&mut self, outcome: TurnOutcome) -> TurnOutcome {
        if let Some(started) = self.turn_started.take() {
            self.telemetry.record_span(
                "turn.total",
                started.elapsed(),
                Attributes::new().with("outcome", outcome_label(&outcome)),
            );
        }
        self.set_state(TurnState::Idle);
        self.emit(SessionEvent::TurnCompleted(outcome.clone()));
        outcome
    }

    fn forward_speech_errors(&mut self) {
        while let Ok(error) = self.speech_errors.try_recv() {
            self.emit(SessionEvent::SpeechFailed {
                seq: error.seq(),
                message: error.to_string(),
            });
        }
    }

    fn expect_state(&self, expected: TurnState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Transition to a new state and emit a state-change event.
    fn set_state(&mut self, new_state: TurnState) {
        if self.state != new_state {
            tracing::debug!(old = ?self.state, new = ?new_state, "Turn state transition");
            self.state = new_state;
            self.emit(SessionEvent::StateChanged(new_state));
        }
    }

    /// Emit a session event (best-effort; a dropped receiver is fine).
    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

const fn outcome_label(outcome: &TurnOutcome) -> &'static str {
    match outcome {
        TurnOutcome::ShortPress => "short_press",
        TurnOutcome::NoInput => "no_input",
        TurnOutcome::Answered { .. } => "answered",
        TurnOutcome::Aborted(_) => "aborted",
    }
}
