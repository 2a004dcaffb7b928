//! Shared request and response pieces of the chat wire formats.

use buttontalk_core::{ConversationTurn, LanguageModelError, TokenStream};
use futures_util::{Stream, StreamExt};
use serde::Serialize;

/// One chat message in a request body.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

impl WireMessage {
    pub fn from_turns(turns: &[ConversationTurn]) -> Vec<Self> {
        turns
            .iter()
            .map(|turn| Self {
                role: turn.role.as_str(),
                content: turn.content.clone(),
            })
            .collect()
    }
}

/// Meaning of one line of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// A non-empty content delta.
    Content(String),
    /// The provider signalled the end of the reply.
    Done,
    /// Keep-alives, comments, role-only deltas and other lines without content.
    Skip,
}

/// Parser for one line of a provider's streaming format.
pub(crate) type LineParser = fn(&str) -> Result<StreamLine, LanguageModelError>;

/// Drive a line stream through `parse`, yielding content deltas.
///
/// Ends at the first `Done`, at the end of the body, or after the first
/// error item.
pub(crate) fn content_stream<L>(lines: L, parse: LineParser) -> TokenStream
where
    L: Stream<Item = Result<String, LanguageModelError>> + Send + 'static,
{
    let state = (lines.boxed(), false);
    let stream = futures_util::stream::unfold(state, move |(mut lines, done)| async move {
        if done {
            return None;
        }
        loop {
            let line = match lines.next().await? {
                Ok(line) => line,
                Err(e) => return Some((Err(e), (lines, true))),
            };
            match parse(&line) {
                Ok(StreamLine::Content(delta)) => return Some((Ok(delta), (lines, false))),
                Ok(StreamLine::Done) => return None,
                Ok(StreamLine::Skip) => {}
                Err(e) => return Some((Err(e), (lines, true))),
            }
        }
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buttontalk_core::Role;

    fn parse_plain(line: &str) -> Result<StreamLine, LanguageModelError> {
        match line {
            "" => Ok(StreamLine::Skip),
            "END" => Ok(StreamLine::Done),
            "BAD" => Err(LanguageModelError::Stream("bad line".to_string())),
            other => Ok(StreamLine::Content(other.to_string())),
        }
    }

    fn run(lines: &[&str]) -> Vec<Result<String, String>> {
        let items: Vec<Result<String, LanguageModelError>> =
            lines.iter().map(|l| Ok((*l).to_string())).collect();
        let stream = content_stream(futures_util::stream::iter(items), parse_plain);
        tokio_test::block_on(stream.map(|r| r.map_err(|e| e.to_string())).collect())
    }

    #[test]
    fn stops_at_done() {
        let out = run(&["a", "", "b", "END", "c"]);
        assert_eq!(out, vec![Ok("a".to_string()), Ok("b".to_string())]);
    }

    #[test]
    fn error_is_the_last_item() {
        let out = run(&["a", "BAD", "c"]);
        assert_eq!(out.len(), 2);
        assert!(out[1].is_err());
    }

    #[test]
    fn body_end_without_done_finishes_quietly() {
        assert_eq!(run(&["a"]), vec![Ok("a".to_string())]);
    }

    #[test]
    fn messages_keep_roles_and_order() {
        let turns = vec![
            ConversationTurn {
                role: Role::System,
                content: "be brief".to_string(),
                index: 0,
            },
            ConversationTurn {
                role: Role::User,
                content: "hi".to_string(),
                index: 1,
            },
        ];
        let json = serde_json::to_value(WireMessage::from_turns(&turns)).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ])
        );
    }
}
