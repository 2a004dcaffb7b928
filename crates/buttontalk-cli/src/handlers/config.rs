//! Config command handler.

use anyhow::{Context, Result};
use buttontalk_core::Settings;

/// Print the effective settings as pretty JSON.
pub fn execute(settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    println!("{json}");
    eprintln!("metrics file: {}", settings.effective_telemetry_path().display());
    Ok(())
}
