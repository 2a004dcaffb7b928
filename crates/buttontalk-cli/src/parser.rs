//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use buttontalk_core::ProviderKind;
use clap::Parser;

use crate::commands::Commands;

/// Push-to-talk voice assistant, driven from the terminal.
#[derive(Parser)]
#[command(name = "buttontalk")]
#[command(about = "Talk to a language model one turn at a time")]
#[command(version)]
pub struct Cli {
    /// Language-model provider (openai, groq, ollama, scripted)
    #[arg(long, global = true, value_parser = parse_provider)]
    pub provider: Option<ProviderKind>,

    /// Model name for the provider
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// JSON settings file
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Use the scripted offline model instead of a real provider
    #[arg(long = "mock-llm", global = true)]
    pub mock_llm: bool,

    /// Print sentences at speaking pace instead of all at once
    #[arg(long, global = true)]
    pub paced: bool,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

fn parse_provider(raw: &str) -> Result<ProviderKind, String> {
    ProviderKind::parse(raw)
        .ok_or_else(|| format!("unknown provider '{raw}' (expected openai, groq, ollama or scripted)"))
}
