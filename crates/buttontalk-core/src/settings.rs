//! Settings domain types and validation.
//!
//! Settings are plain data: defaults live here, a JSON file may override
//! them, and a handful of environment variables override the file. Nothing
//! in this module touches a device.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Rgb, SAMPLE_RATE};

/// Default short-press threshold: holds shorter than this are treated as a tap.
pub const DEFAULT_SHORT_PRESS_MS: u64 = 500;

/// Default number of capture chunks buffered between driver and consumer.
pub const DEFAULT_CAPTURE_BUFFER_CHUNKS: usize = 512;

/// Which language-model backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    #[default]
    Ollama,
    /// Deterministic offline streamer.
    Scripted,
}

impl ProviderKind {
    /// Parse a provider name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "groq" => Some(Self::Groq),
            "ollama" => Some(Self::Ollama),
            "scripted" | "mock" => Some(Self::Scripted),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Ollama => "ollama",
            Self::Scripted => "scripted",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Capture sample rate in Hz (mono, 16-bit).
    pub sample_rate: u32,

    /// Capture hand-off bound, in chunks. Exceeding it aborts the turn.
    pub capture_buffer_chunks: usize,

    /// Holds shorter than this skip transcription and speak the greeting.
    pub short_press_ms: u64,

    /// Sampling temperature passed to the language model.
    pub temperature: f32,

    /// First turn of every conversation.
    pub system_prompt: String,

    pub provider: ProviderKind,
    pub model: String,

    /// Override the provider's default endpoint.
    pub base_url: Option<String>,

    pub online_text: String,
    pub greeting_text: String,
    pub no_input_text: String,
    pub apology_text: String,
    pub goodbye_text: String,

    pub listening_color: Rgb,
    pub thinking_color: Rgb,

    /// One full fade-in/fade-out cycle of the thinking pulse.
    pub pulse_period_ms: u64,

    /// How many sentences may be synthesized but not yet played.
    /// 1 = strictly sequential, 2 = synthesize the next sentence during playback.
    pub synthesis_lookahead: usize,

    pub telemetry_enabled: bool,

    /// Metrics file (JSON lines, append-only). Defaults to the temp dir.
    pub telemetry_path: Option<PathBuf>,

    pub telemetry_flush_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            capture_buffer_chunks: DEFAULT_CAPTURE_BUFFER_CHUNKS,
            short_press_ms: DEFAULT_SHORT_PRESS_MS,
            temperature: 0.7,
            system_prompt: "You are a helpful AI assistant. Answer short and friendly.".to_string(),
            provider: ProviderKind::Ollama,
            model: "gemma3:1b".to_string(),
            base_url: None,
            online_text: "Hello! I'm online and ready to hang out".to_string(),
            greeting_text: "Hello! I'm ready when you are.".to_string(),
            no_input_text: "I didn't catch anything. Please try again.".to_string(),
            apology_text: "Sorry, something went wrong. Please try again.".to_string(),
            goodbye_text: "Goodbye!".to_string(),
            listening_color: Rgb::new(0, 255, 0),
            thinking_color: Rgb::new(0, 100, 255),
            pulse_period_ms: 2_000,
            synthesis_lookahead: 2,
            telemetry_enabled: true,
            telemetry_path: None,
            telemetry_flush_interval_ms: 2_000,
        }
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let settings: Self =
            serde_json::from_str(&raw).map_err(|e| SettingsError::Parse(e.to_string()))?;
        tracing::debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), SettingsError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognised variables: `BUTTONTALK_PROVIDER`, `BUTTONTALK_MODEL`,
    /// `BUTTONTALK_BASE_URL`, `BUTTONTALK_METRICS_PATH` and `BENCH`
    /// (`0`, `false`, `False` or empty disables telemetry).
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        if let Some(raw) = lookup("BUTTONTALK_PROVIDER") {
            self.provider =
                ProviderKind::parse(&raw).ok_or(SettingsError::UnknownProvider(raw))?;
        }
        if let Some(model) = lookup("BUTTONTALK_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("BUTTONTALK_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(path) = lookup("BUTTONTALK_METRICS_PATH") {
            self.telemetry_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = lookup("BENCH") {
            self.telemetry_enabled = !matches!(flag.as_str(), "0" | "false" | "False" | "");
        }
        Ok(())
    }

    /// Effective metrics file path.
    #[must_use]
    pub fn effective_telemetry_path(&self) -> PathBuf {
        self.telemetry_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("buttontalk_metrics.jsonl"))
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Invalid settings file: {0}")]
    Parse(String),

    #[error("Unknown language model provider: {0}")]
    UnknownProvider(String),

    #[error("Sample rate must be positive")]
    InvalidSampleRate,

    #[error("Capture buffer must hold at least one chunk")]
    InvalidCaptureBuffer,

    #[error("Temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),

    #[error("Pulse period must be at least 100 ms, got {0} ms")]
    InvalidPulsePeriod(u64),

    #[error("Synthesis lookahead must be at least 1")]
    InvalidLookahead,

    #[error("Telemetry flush interval must be positive")]
    InvalidFlushInterval,

    #[error("Model name must not be empty")]
    EmptyModel,
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if settings.sample_rate == 0 {
        return Err(SettingsError::InvalidSampleRate);
    }
    if settings.capture_buffer_chunks == 0 {
        return Err(SettingsError::InvalidCaptureBuffer);
    }
    if !(0.0..=2.0).contains(&settings.temperature) {
        return Err(SettingsError::InvalidTemperature(settings.temperature));
    }
    if settings.pulse_period_ms < 100 {
        return Err(SettingsError::InvalidPulsePeriod(settings.pulse_period_ms));
    }
    if settings.synthesis_lookahead == 0 {
        return Err(SettingsError::InvalidLookahead);
    }
    if settings.telemetry_flush_interval_ms == 0 {
        return Err(SettingsError::InvalidFlushInterval);
    }
    if settings.model.trim().is_empty() && settings.provider != ProviderKind::Scripted {
        return Err(SettingsError::EmptyModel);
    }
    Ok(())
}
