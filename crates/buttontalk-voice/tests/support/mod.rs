//! Fake collaborators shared by the integration tests.
//!
//! None of them touch hardware or the network. Each records what it was
//! asked to do in a shared [`Log`] so tests can assert on ordering.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use buttontalk_core::{
    AudioChunk, AudioSource, ChunkSink, ConversationTurn, DisplayError, DisplaySurface,
    LanguageModel, LanguageModelError, PlaybackError, PlaybackSink, RecordingSession, Rgb,
    SourceError, SpeechAudio, SpeechSynthesizer, SynthesisError, TokenStream, Transcriber,
    TranscriptionError,
};
use buttontalk_voice::{Collaborators, SessionConfig};

// ── Shared log ─────────────────────────────────────────────────────

/// Ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries starting with `prefix`, with the prefix removed.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Small deterministic pseudo-random generator for latency schedules.
pub struct Lcg(u64);

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_ms(&mut self, max: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % (max + 1)
    }
}

// ── Speech ─────────────────────────────────────────────────────────

/// Synthesizer that sleeps for a per-text latency and logs start/end.
#[derive(Default)]
pub struct FakeSynth {
    pub log: Log,
    latencies: Mutex<HashMap<String, Duration>>,
    failing: Mutex<Vec<String>>,
}

impl FakeSynth {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn latency(&self, text: &str, latency: Duration) {
        self.latencies.lock().unwrap().insert(text.to_string(), latency);
    }

    pub fn fail_on(&self, text: &str) {
        self.failing.lock().unwrap().push(text.to_string());
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, SynthesisError> {
        self.log.push(format!("synth:start:{text}"));
        let latency = self.latencies.lock().unwrap().get(text).copied().unwrap_or_default();
        tokio::time::sleep(latency).await;
        if self.failing.lock().unwrap().iter().any(|t| t == text) {
            self.log.push(format!("synth:fail:{text}"));
            return Err(SynthesisError(format!("cannot say {text}")));
        }
        self.log.push(format!("synth:end:{text}"));
        // Encode the text length so playback can be matched back to it.
        let samples = vec![0_i16; text.len() * 10];
        Ok(SpeechAudio::from_samples(samples, 16_000))
    }
}

/// Playback sink that "plays" for a fixed or scheduled latency.
#[derive(Default)]
pub struct FakePlayback {
    pub log: Log,
    schedule: Mutex<Vec<Duration>>,
    default_latency: Duration,
    fail_lengths: Mutex<Vec<usize>>,
}

impl FakePlayback {
    pub fn new(log: Log, default_latency: Duration) -> Self {
        Self {
            log,
            default_latency,
            ..Self::default()
        }
    }

    /// Latencies used for successive `play` calls before falling back to the default.
    pub fn schedule(&self, latencies: Vec<Duration>) {
        *self.schedule.lock().unwrap() = latencies;
    }

    /// Fail playback of audio synthesized from text of this many bytes.
    pub fn fail_text_len(&self, len: usize) {
        self.fail_lengths.lock().unwrap().push(len);
    }
}

#[async_trait]
impl PlaybackSink for FakePlayback {
    async fn play(&self, audio: &SpeechAudio) -> Result<(), PlaybackError> {
        let text_len = audio.samples.len() / 10;
        self.log.push(format!("play:start:{text_len}"));
        let latency = {
            let mut schedule = self.schedule.lock().unwrap();
            if schedule.is_empty() {
                self.default_latency
            } else {
                schedule.remove(0)
            }
        };
        tokio::time::sleep(latency).await;
        if self.fail_lengths.lock().unwrap().contains(&text_len) {
            self.log.push(format!("play:fail:{text_len}"));
            return Err(PlaybackError("device busy".to_string()));
        }
        self.log.push(format!("play:end:{text_len}"));
        Ok(())
    }
}

// ── Language model ─────────────────────────────────────────────────

/// What the scripted model does when asked to stream.
#[derive(Clone)]
pub enum Script {
    Tokens(Vec<String>),
    /// Stream these tokens, then fail.
    TokensThenError(Vec<String>),
    /// Fail to open the stream.
    OpenError,
}

pub struct FakeModel {
    script: Script,
    pub calls: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl FakeModel {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Split `text` on spaces like a token streamer, keeping the spaces.
    pub fn words(text: &str) -> Self {
        Self::new(Script::Tokens(
            text.split(' ').map(|w| format!("{w} ")).collect(),
        ))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn stream(
        &self,
        turns: &[ConversationTurn],
        _temperature: f32,
    ) -> Result<TokenStream, LanguageModelError> {
        self.calls.lock().unwrap().push(turns.to_vec());
        let items: Vec<Result<String, LanguageModelError>> = match &self.script {
            Script::Tokens(tokens) => tokens.iter().cloned().map(Ok).collect(),
            Script::TokensThenError(tokens) => tokens
                .iter()
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(LanguageModelError::Stream(
                    "connection reset".to_string(),
                ))))
                .collect(),
            Script::OpenError => {
                return Err(LanguageModelError::Request("connection refused".to_string()));
            }
        };
        Ok(Box::pin(futures_util::stream::iter(items)))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ── Transcriber ────────────────────────────────────────────────────

pub struct FakeTranscriber {
    result: Mutex<Option<Result<String, TranscriptionError>>>,
    partials: Vec<String>,
    pub seen_samples: Mutex<Vec<usize>>,
}

impl FakeTranscriber {
    pub fn text(text: &str) -> Self {
        Self {
            result: Mutex::new(Some(Ok(text.to_string()))),
            partials: Vec::new(),
            seen_samples: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Mutex::new(Some(Err(TranscriptionError::Engine("decoder crashed".to_string())))),
            partials: Vec::new(),
            seen_samples: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_partials(mut self, partials: &[&str]) -> Self {
        self.partials = partials.iter().map(|p| (*p).to_string()).collect();
        self
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        recording: &RecordingSession,
        on_partial: &(dyn for<'p> Fn(&'p str) + Send + Sync),
    ) -> Result<String, TranscriptionError> {
        self.seen_samples.lock().unwrap().push(recording.sample_count());
        for partial in &self.partials {
            on_partial(partial);
        }
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

// ── Audio source ───────────────────────────────────────────────────

/// Audio source whose sink is exposed so tests can push chunks by hand.
#[derive(Clone, Default)]
pub struct FakeSource {
    sink: Arc<Mutex<Option<Arc<dyn ChunkSink>>>>,
    pub fail_start: bool,
    pub log: Log,
}

impl FakeSource {
    pub fn push(&self, chunk: AudioChunk) -> bool {
        let sink = self.sink.lock().unwrap().clone();
        sink.is_some_and(|s| s.push(chunk).is_ok())
    }
}

impl AudioSource for FakeSource {
    fn start(&mut self, sink: Arc<dyn ChunkSink>) -> Result<(), SourceError> {
        if self.fail_start {
            return Err(SourceError::NoInputDevice);
        }
        self.log.push("source:start");
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.push("source:stop");
    }
}

// ── Display ────────────────────────────────────────────────────────

/// Display that records text writes and colors.
#[derive(Default)]
pub struct FakeDisplay {
    pub texts: Mutex<Vec<String>>,
    pub colors: Mutex<Vec<Rgb>>,
}

impl FakeDisplay {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn last_color(&self) -> Option<Rgb> {
        self.colors.lock().unwrap().last().copied()
    }
}

impl DisplaySurface for FakeDisplay {
    fn set_color(&self, color: Rgb) -> Result<(), DisplayError> {
        self.colors.lock().unwrap().push(color);
        Ok(())
    }

    fn write_text(&self, text: &str) -> Result<(), DisplayError> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), DisplayError> {
        Ok(())
    }

    fn off(&self) -> Result<(), DisplayError> {
        Ok(())
    }
}

// ── Assembly ───────────────────────────────────────────────────────

/// Handles to every fake wired into a controller.
pub struct Rig {
    pub log: Log,
    pub source: FakeSource,
    pub synth: Arc<FakeSynth>,
    pub playback: Arc<FakePlayback>,
    pub model: Arc<FakeModel>,
    pub transcriber: Arc<FakeTranscriber>,
    pub display: Arc<FakeDisplay>,
}

impl Rig {
    pub fn new(model: FakeModel, transcriber: FakeTranscriber) -> Self {
        let log = Log::default();
        Self {
            source: FakeSource {
                log: log.clone(),
                ..FakeSource::default()
            },
            synth: Arc::new(FakeSynth::new(log.clone())),
            playback: Arc::new(FakePlayback::new(log.clone(), Duration::from_millis(5))),
            model: Arc::new(model),
            transcriber: Arc::new(transcriber),
            display: Arc::new(FakeDisplay::default()),
            log,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            source: Box::new(self.source.clone()),
            transcriber: self.transcriber.clone(),
            model: self.model.clone(),
            synthesizer: self.synth.clone(),
            playback: self.playback.clone(),
            display: self.display.clone(),
        }
    }

    /// Sentences that reached the synthesizer, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.log.with_prefix("synth:end:")
    }
}

/// Session config with short, test-friendly timings.
pub fn test_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.pulse_period = Duration::from_millis(200);
    config
}
