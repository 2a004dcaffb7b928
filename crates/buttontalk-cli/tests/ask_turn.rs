//! Text-driven turns through the console adapters.

use std::io::Write;
use std::sync::{Arc, Mutex};

use buttontalk_cli::CliContext;
use buttontalk_cli::console::shared_output;
use buttontalk_cli::handlers::ask;
use buttontalk_core::{ProviderKind, Settings};
use buttontalk_llm::ScriptedModel;
use buttontalk_telemetry::Telemetry;
use buttontalk_voice::TurnOutcome;

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Buffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn context(speech: &Buffer, status: &Buffer) -> CliContext {
    let mut settings = Settings::with_defaults();
    settings.provider = ProviderKind::Scripted;
    CliContext {
        settings,
        model: Arc::new(ScriptedModel::default()),
        telemetry: Telemetry::disabled(),
        speech_out: shared_output(speech.clone()),
        status_out: shared_output(status.clone()),
        paced: false,
    }
}

#[tokio::test]
async fn ask_speaks_the_scripted_reply_sentence_by_sentence() {
    let speech = Buffer::default();
    let status = Buffer::default();
    let ctx = context(&speech, &status);

    let outcome = ask::execute(&ctx, "is this thing on").await.unwrap();

    assert_eq!(
        speech.text(),
        "🔊 Thanks.\n🔊 Your audio pipeline is working.\n🔊 This is only a test.\n"
    );
    assert!(matches!(
        outcome,
        TurnOutcome::Answered {
            sentences: 3,
            failed_sentences: 0,
            truncated: false,
            ..
        }
    ));
}

#[tokio::test]
async fn blank_prompt_speaks_the_no_input_phrase() {
    let speech = Buffer::default();
    let status = Buffer::default();
    let ctx = context(&speech, &status);

    let outcome = ask::execute(&ctx, "   ").await.unwrap();

    assert_eq!(outcome, TurnOutcome::NoInput);
    assert_eq!(speech.text(), "🔊 I didn't catch anything. Please try again.\n");
}

#[tokio::test]
async fn chat_session_keeps_history_between_turns() {
    let speech = Buffer::default();
    let status = Buffer::default();
    let ctx = context(&speech, &status);
    let (mut session, _events) = ctx.session(buttontalk_voice::SessionConfig::from_settings(&ctx.settings));

    session.announce_online().await;
    session.respond_to_text("first").await.unwrap();
    session.respond_to_text("second").await.unwrap();
    session.shutdown().await;

    assert_eq!(session.conversation().len(), 5);
    let spoken = speech.text();
    assert!(spoken.starts_with("🔊 Hello! I'm online and ready to hang out\n"));
    assert!(spoken.ends_with("🔊 Goodbye!\n"));
    assert_eq!(status.text(), "[Ready]\n");
}
