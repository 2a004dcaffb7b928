//! Command handlers.

pub mod ask;
pub mod chat;
pub mod config;

use buttontalk_voice::{SessionEvent, TurnOutcome};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Log session events until the controller is dropped.
pub fn spawn_event_log(mut events: mpsc::UnboundedReceiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged(state) => tracing::debug!(?state, "State"),
                SessionEvent::Transcript(transcript) => {
                    tracing::debug!(text = %transcript.text, "Transcript");
                }
                SessionEvent::SentenceQueued(chunk) => {
                    tracing::debug!(seq = chunk.seq, text = %chunk.text, "Sentence queued");
                }
                SessionEvent::Utterance(text) => tracing::debug!(%text, "Utterance"),
                SessionEvent::SpeechFailed { seq, message } => {
                    tracing::warn!(seq, %message, "Sentence not spoken");
                }
                SessionEvent::TurnCompleted(outcome) => tracing::debug!(?outcome, "Turn completed"),
            }
        }
    })
}

/// One-line summary of a finished turn for the terminal.
pub fn describe_outcome(outcome: &TurnOutcome) -> Option<String> {
    match outcome {
        TurnOutcome::Answered {
            truncated: true, ..
        } => Some("(reply was cut short by a provider error)".to_string()),
        TurnOutcome::Answered {
            failed_sentences, ..
        } if *failed_sentences > 0 => Some(format!("({failed_sentences} sentence(s) could not be spoken)")),
        TurnOutcome::Aborted(reason) => Some(format!("(turn aborted: {reason:?})")),
        _ => None,
    }
}
