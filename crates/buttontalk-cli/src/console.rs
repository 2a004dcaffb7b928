//! Console stand-ins for the device-facing ports.
//!
//! The terminal has no button, microphone, speaker or backlit display, so the
//! CLI wires these adapters in their place: speech becomes printed lines and
//! display text goes to a status stream.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use buttontalk_core::{
    AudioSource, ChunkSink, DisplayError, DisplaySurface, PlaybackError, PlaybackSink,
    RecordingSession, Rgb, SourceError, SpeechAudio, SpeechSynthesizer, SynthesisError,
    Transcriber, TranscriptionError,
};

/// Writer shared between adapters and tasks.
pub type SharedOutput = Arc<Mutex<Box<dyn Write + Send>>>;

pub fn shared_output(writer: impl Write + Send + 'static) -> SharedOutput {
    Arc::new(Mutex::new(Box::new(writer)))
}

fn write_line(out: &SharedOutput, line: &str) -> std::io::Result<()> {
    let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
    writeln!(out, "{line}")?;
    out.flush()
}

// ── Speaker ────────────────────────────────────────────────────────

/// Sample rate of the placeholder audio; only its duration matters.
const PLACEHOLDER_RATE: u32 = 1_000;

/// Characters per second used to estimate how long a sentence takes to say.
const SPEAKING_RATE: f64 = 15.0;

/// Prints each sentence when it would have been played.
///
/// Acts as both synthesizer and playback sink. Synthesis queues the text and
/// returns silent audio of the estimated speaking length; playback prints the
/// oldest queued text. The dispatcher plays in synthesis order, so the queue
/// lines up.
pub struct ConsoleSpeaker {
    queue: Mutex<VecDeque<String>>,
    out: SharedOutput,
    paced: bool,
}

impl ConsoleSpeaker {
    pub fn new(out: SharedOutput, paced: bool) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            out,
            paced,
        }
    }
}

/// Estimated time to say `text` aloud.
pub fn speaking_time(text: &str) -> Duration {
    #[allow(clippy::cast_precision_loss)]
    let chars = text.chars().count() as f64;
    Duration::from_secs_f64(chars / SPEAKING_RATE)
}

#[async_trait]
impl SpeechSynthesizer for ConsoleSpeaker {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, SynthesisError> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let samples = (speaking_time(text).as_secs_f64() * f64::from(PLACEHOLDER_RATE)) as usize;
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(text.to_string());
        Ok(SpeechAudio::from_samples(vec![0; samples], PLACEHOLDER_RATE))
    }
}

#[async_trait]
impl PlaybackSink for ConsoleSpeaker {
    async fn play(&self, audio: &SpeechAudio) -> Result<(), PlaybackError> {
        let text = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| PlaybackError("nothing queued to say".to_string()))?;
        write_line(&self.out, &format!("🔊 {text}")).map_err(|e| PlaybackError(e.to_string()))?;
        if self.paced {
            tokio::time::sleep(audio.duration).await;
        }
        Ok(())
    }
}

// ── Display ────────────────────────────────────────────────────────

/// Mirrors display text to a status stream, skipping repeats.
pub struct ConsoleDisplay {
    out: SharedOutput,
    last: Mutex<Option<String>>,
}

impl ConsoleDisplay {
    pub fn new(out: SharedOutput) -> Self {
        Self {
            out,
            last: Mutex::new(None),
        }
    }
}

impl DisplaySurface for ConsoleDisplay {
    fn set_color(&self, color: Rgb) -> Result<(), DisplayError> {
        tracing::trace!(%color, "Backlight");
        Ok(())
    }

    fn write_text(&self, text: &str) -> Result<(), DisplayError> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() == Some(text) {
            return Ok(());
        }
        write_line(&self.out, &format!("[{text}]")).map_err(|e| DisplayError::Write(e.to_string()))?;
        *last = Some(text.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), DisplayError> {
        Ok(())
    }

    fn off(&self) -> Result<(), DisplayError> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ── Input side ─────────────────────────────────────────────────────

/// Audio source for a terminal with no microphone attached.
pub struct NoMicrophone;

impl AudioSource for NoMicrophone {
    fn start(&mut self, _sink: Arc<dyn ChunkSink>) -> Result<(), SourceError> {
        Err(SourceError::NoInputDevice)
    }

    fn stop(&mut self) {}
}

/// Transcriber for text-driven sessions, where typed lines replace speech.
pub struct TypedInput;

#[async_trait]
impl Transcriber for TypedInput {
    async fn transcribe(
        &self,
        _recording: &RecordingSession,
        _on_partial: &(dyn for<'p> Fn(&'p str) + Send + Sync),
    ) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::ModelNotLoaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn speaker_prints_sentences_in_synthesis_order() {
        let buffer = Buffer::default();
        let speaker = ConsoleSpeaker::new(shared_output(buffer.clone()), false);

        tokio_test::block_on(async {
            let first = speaker.synthesize("Four.").await.unwrap();
            let second = speaker.synthesize("That's basic math.").await.unwrap();
            speaker.play(&first).await.unwrap();
            speaker.play(&second).await.unwrap();
        });

        assert_eq!(buffer.text(), "🔊 Four.\n🔊 That's basic math.\n");
    }

    #[test]
    fn placeholder_audio_lasts_the_speaking_time() {
        let speaker = ConsoleSpeaker::new(shared_output(Buffer::default()), false);
        let audio = tokio_test::block_on(speaker.synthesize("fifteen chars!!")).unwrap();
        assert_eq!(audio.duration, Duration::from_secs(1));
    }

    #[test]
    fn play_without_synthesis_fails() {
        let speaker = ConsoleSpeaker::new(shared_output(Buffer::default()), false);
        let audio = SpeechAudio::from_samples(vec![0; 10], PLACEHOLDER_RATE);
        assert!(tokio_test::block_on(speaker.play(&audio)).is_err());
    }

    #[test]
    fn display_skips_repeated_text() {
        let buffer = Buffer::default();
        let display = ConsoleDisplay::new(shared_output(buffer.clone()));

        display.write_text("Ready").unwrap();
        display.write_text("Ready").unwrap();
        display.write_text("Listening...").unwrap();
        display.off().unwrap();
        display.write_text("Listening...").unwrap();

        assert_eq!(buffer.text(), "[Ready]\n[Listening...]\n[Listening...]\n");
    }

    #[test]
    fn no_microphone_refuses_to_start() {
        struct Sink;
        impl ChunkSink for Sink {
            fn push(&self, _chunk: buttontalk_core::AudioChunk) -> Result<(), buttontalk_core::PushRejected> {
                Ok(())
            }
        }
        let mut source = NoMicrophone;
        assert!(matches!(
            source.start(Arc::new(Sink)),
            Err(SourceError::NoInputDevice)
        ));
    }
}
