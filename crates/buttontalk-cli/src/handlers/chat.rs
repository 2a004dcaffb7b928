//! Chat command handler: an interactive text-driven session.

use std::io::Write;

use anyhow::{Context, Result};
use buttontalk_core::{Conversation, Role};
use buttontalk_voice::SessionConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::bootstrap::CliContext;
use crate::handlers::{describe_outcome, spawn_event_log};

/// What one typed line asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplInput {
    Say(String),
    History,
    Quit,
    Blank,
}

pub fn parse_input(line: &str) -> ReplInput {
    match line.trim() {
        "" => ReplInput::Blank,
        "/quit" | "/exit" => ReplInput::Quit,
        "/history" => ReplInput::History,
        text => ReplInput::Say(text.to_string()),
    }
}

/// Run turns from stdin until EOF, `/quit` or Ctrl-C.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let (mut session, events) = ctx.session(SessionConfig::from_settings(&ctx.settings));
    let log = spawn_event_log(events);

    println!("Using {}. Type a message, /history or /quit.", ctx.model.name());
    session.announce_online().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush().context("Failed to write prompt")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match parse_input(&line) {
            ReplInput::Blank => {}
            ReplInput::Quit => break,
            ReplInput::History => print_history(session.conversation()),
            ReplInput::Say(text) => {
                let outcome = session.respond_to_text(&text).await?;
                if let Some(note) = describe_outcome(&outcome) {
                    eprintln!("{note}");
                }
            }
        }
    }

    session.shutdown().await;
    drop(session);
    let _ = log.await;
    Ok(())
}

fn print_history(conversation: &Conversation) {
    for turn in conversation.turns() {
        let who = match turn.role {
            Role::System => "system",
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("{:>3} {who:>9}: {}", turn.index, turn.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_and_text_are_told_apart() {
        assert_eq!(parse_input("  "), ReplInput::Blank);
        assert_eq!(parse_input("/quit"), ReplInput::Quit);
        assert_eq!(parse_input("/exit\n"), ReplInput::Quit);
        assert_eq!(parse_input("/history"), ReplInput::History);
        assert_eq!(
            parse_input(" what is two plus two \n"),
            ReplInput::Say("what is two plus two".to_string())
        );
    }
}
