//! Incremental sentence splitting over a streamed reply.
//!
//! A sentence ends at the first `.`, `!` or `?` that is followed by
//! whitespace. Text after the last such boundary stays buffered until more
//! deltas arrive or the stream ends and [`SentenceSegmenter::flush`] is
//! called. Newlines are ordinary whitespace.

use buttontalk_core::SentenceChunk;

/// Stateful splitter for one turn's token stream.
#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    buffer: String,
    next_seq: u64,
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SentenceSegmenter {
    /// Sequence ids start at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
            next_seq: 1,
        }
    }

    /// Append a delta and return every sentence it completes, in order.
    pub fn feed(&mut self, delta: &str) -> Vec<SentenceChunk> {
        self.buffer.push_str(delta);

        let mut out = Vec::new();
        while let Some((sentence_end, rest_start)) = find_boundary(&self.buffer) {
            let sentence = self.buffer[..sentence_end].trim().to_string();
            self.buffer.drain(..rest_start);
            if let Some(chunk) = self.emit(sentence, true) {
                out.push(chunk);
            }
        }
        out
    }

    /// End of stream: emit whatever is left if it has non-whitespace content.
    pub fn flush(&mut self) -> Option<SentenceChunk> {
        let rest = std::mem::take(&mut self.buffer);
        self.emit(rest.trim().to_string(), false)
    }

    /// Text waiting for a sentence boundary.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Drop buffered text and restart sequence ids for a new turn.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.next_seq = 1;
    }

    fn emit(&mut self, text: String, complete: bool) -> Option<SentenceChunk> {
        if !has_speakable_content(&text) {
            if !text.is_empty() {
                tracing::trace!(%text, "Discarding punctuation-only fragment");
            }
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Some(SentenceChunk {
            seq,
            text,
            complete,
        })
    }
}

/// Byte offsets of the first sentence end (exclusive) and the start of the
/// remaining text, or `None` if no boundary is buffered yet.
fn find_boundary(buffer: &str) -> Option<(usize, usize)> {
    let mut chars = buffer.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(_, next)) = chars.peek() else {
            return None;
        };
        if next.is_whitespace() {
            let sentence_end = i + c.len_utf8();
            let rest = buffer[sentence_end..].trim_start();
            return Some((sentence_end, buffer.len() - rest.len()));
        }
    }
    None
}

fn has_speakable_content(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}
