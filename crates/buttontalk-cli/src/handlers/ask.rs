//! Ask command handler: one text-driven turn.

use anyhow::Result;
use buttontalk_voice::{SessionConfig, TurnOutcome};

use crate::bootstrap::CliContext;
use crate::handlers::{describe_outcome, spawn_event_log};

/// Run one turn with `prompt` as the transcript and speak the reply.
pub async fn execute(ctx: &CliContext, prompt: &str) -> Result<TurnOutcome> {
    let mut config = SessionConfig::from_settings(&ctx.settings);
    // A single question needs no farewell.
    config.goodbye_text.clear();

    let (mut session, events) = ctx.session(config);
    let log = spawn_event_log(events);

    let outcome = session.respond_to_text(prompt).await?;
    if let Some(note) = describe_outcome(&outcome) {
        eprintln!("{note}");
    }

    session.shutdown().await;
    drop(session);
    let _ = log.await;
    Ok(outcome)
}
