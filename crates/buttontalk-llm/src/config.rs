//! Provider selection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use buttontalk_core::{LanguageModel, LanguageModelError, ProviderKind, Settings};

use crate::ollama::{OLLAMA_DEFAULT_URL, Ollama};
use crate::openai::{GROQ_DEFAULT_URL, OPENAI_DEFAULT_URL, OpenAiCompatible};
use crate::scripted::ScriptedModel;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to construct one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    /// Override the provider's default endpoint.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Build from settings, reading the API key from the process environment.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::from_settings_with(settings, |key| std::env::var(key).ok())
    }

    /// Build from settings with an arbitrary variable lookup for the API key.
    pub fn from_settings_with(settings: &Settings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = api_key_var(settings.provider)
            .and_then(lookup)
            .filter(|key| !key.trim().is_empty());
        Self {
            kind: settings.provider,
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            api_key,
        }
    }

    fn url_or(&self, default: &str) -> String {
        self.base_url.clone().unwrap_or_else(|| default.to_string())
    }
}

/// Environment variable holding the API key for hosted providers.
const fn api_key_var(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
        ProviderKind::Groq => Some("GROQ_API_KEY"),
        ProviderKind::Ollama | ProviderKind::Scripted => None,
    }
}

/// Construct the backend named by `config`.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn LanguageModel>> {
    if config.kind == ProviderKind::Scripted {
        tracing::info!("Using scripted language model");
        return Ok(Arc::new(ScriptedModel::default()));
    }

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let model: Arc<dyn LanguageModel> = match config.kind {
        ProviderKind::OpenAi => Arc::new(
            OpenAiCompatible::new(
                client,
                config.url_or(OPENAI_DEFAULT_URL),
                require_key(config)?,
                &config.model,
            )
            .with_label(format!("openai:{}", config.model)),
        ),
        ProviderKind::Groq => Arc::new(
            OpenAiCompatible::new(
                client,
                config.url_or(GROQ_DEFAULT_URL),
                require_key(config)?,
                &config.model,
            )
            .with_label(format!("groq:{}", config.model)),
        ),
        ProviderKind::Ollama => Arc::new(Ollama::new(
            client,
            config.url_or(OLLAMA_DEFAULT_URL),
            &config.model,
        )),
        ProviderKind::Scripted => Arc::new(ScriptedModel::default()),
    };
    tracing::info!(provider = %config.kind, model = model.name(), "Language model ready");
    Ok(model)
}

fn require_key(config: &ProviderConfig) -> Result<String> {
    let var = api_key_var(config.kind).unwrap_or("API key");
    config.api_key.clone().ok_or_else(|| {
        LanguageModelError::Config(format!("{var} is not set for provider {}", config.kind))
            .into()
    })
}
