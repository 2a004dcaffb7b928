//! CLI composition root.
//!
//! Settings resolve in layers: defaults, then the `--settings` file, then
//! environment variables, then command-line flags. The result is validated
//! once and everything else is built from it.

use std::sync::Arc;

use buttontalk_core::{LanguageModel, ProviderKind, Settings, validate_settings};
use buttontalk_llm::{ProviderConfig, build_provider};
use buttontalk_telemetry::{Telemetry, TelemetryConfig};
use buttontalk_voice::{Collaborators, SessionConfig, SessionController, SessionEvent};
use tokio::sync::mpsc;

use crate::console::{ConsoleDisplay, ConsoleSpeaker, NoMicrophone, SharedOutput, TypedInput};
use crate::error::CliError;
use crate::parser::Cli;

/// Everything a command handler needs.
pub struct CliContext {
    pub settings: Settings,
    pub model: Arc<dyn LanguageModel>,
    pub telemetry: Telemetry,
    /// Where spoken sentences are printed.
    pub speech_out: SharedOutput,
    /// Where display text is mirrored.
    pub status_out: SharedOutput,
    pub paced: bool,
}

impl CliContext {
    /// Wire a session controller from console adapters.
    pub fn session(
        &self,
        config: SessionConfig,
    ) -> (SessionController, mpsc::UnboundedReceiver<SessionEvent>) {
        let speaker = Arc::new(ConsoleSpeaker::new(Arc::clone(&self.speech_out), self.paced));
        let collaborators = Collaborators {
            source: Box::new(NoMicrophone),
            transcriber: Arc::new(TypedInput),
            model: Arc::clone(&self.model),
            synthesizer: speaker.clone(),
            playback: speaker,
            display: Arc::new(ConsoleDisplay::new(Arc::clone(&self.status_out))),
        };
        SessionController::new(collaborators, config, self.telemetry.clone())
    }
}

/// Resolve settings from every layer and validate them.
pub fn load_settings(cli: &Cli) -> Result<Settings, CliError> {
    load_settings_with(cli, |key| std::env::var(key).ok())
}

/// [`load_settings`] with an arbitrary environment lookup.
pub fn load_settings_with(
    cli: &Cli,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings, CliError> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::from_json_file(path)?,
        None => Settings::with_defaults(),
    };
    settings.apply_env_from(lookup)?;

    if let Some(provider) = cli.provider {
        settings.provider = provider;
    }
    if let Some(model) = &cli.model {
        settings.model.clone_from(model);
    }
    if cli.mock_llm {
        settings.provider = ProviderKind::Scripted;
    }

    validate_settings(&settings)?;
    tracing::debug!(provider = %settings.provider, model = %settings.model, "Settings resolved");
    Ok(settings)
}

/// Build the CLI context. Must be called from within a tokio runtime.
pub fn bootstrap(
    cli: &Cli,
    speech_out: SharedOutput,
    status_out: SharedOutput,
) -> Result<CliContext, CliError> {
    let settings = load_settings(cli)?;
    let model = build_provider(&ProviderConfig::from_settings(&settings)).map_err(CliError::Provider)?;

    let telemetry = Telemetry::new(TelemetryConfig::from_settings(&settings));
    telemetry.start();

    Ok(CliContext {
        settings,
        model,
        telemetry,
        speech_out,
        status_out,
        paced: cli.paced,
    })
}
