use std::path::PathBuf;
use std::time::Duration;

use buttontalk_core::Settings;

/// Telemetry recorder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub enabled: bool,

    /// JSON-lines output, opened in append mode on first flush.
    pub path: PathBuf,

    /// Minimum time between two writes to `path`.
    pub flush_interval: Duration,
}

impl TelemetryConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enabled: settings.telemetry_enabled,
            path: settings.effective_telemetry_path(),
            flush_interval: Duration::from_millis(settings.telemetry_flush_interval_ms),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::with_defaults())
    }
}
