//! Split a streamed HTTP body into text lines.
//!
//! Both wire formats are line oriented, but network chunks do not respect
//! line boundaries: one chunk may carry half a line or several lines.

use bytes::{Bytes, BytesMut};
use buttontalk_core::LanguageModelError;
use futures_util::{Stream, StreamExt};

/// State threaded through the `unfold` stream.
struct LineState {
    stream: futures_util::stream::BoxStream<'static, Result<Bytes, String>>,
    buf: BytesMut,
    done: bool,
}

/// Turn a byte stream into a stream of lines without their terminators.
///
/// A final line without a trailing newline is still emitted. A transport
/// error ends the stream with a single `Err` item.
pub(crate) fn lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, LanguageModelError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    let state = LineState {
        stream: byte_stream.map(|r| r.map_err(|e| e.to_string())).boxed(),
        buf: BytesMut::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        loop {
            if let Some(pos) = st.buf.iter().position(|&b| b == b'\n') {
                let line = st.buf.split_to(pos + 1);
                return Some((Ok(decode(&line)), st));
            }

            match st.stream.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Response body stream failed");
                    st.done = true;
                    return Some((Err(LanguageModelError::Stream(e)), st));
                }
                None => {
                    st.done = true;
                    if st.buf.is_empty() {
                        return None;
                    }
                    let rest = st.buf.split();
                    return Some((Ok(decode(&rest)), st));
                }
            }
        }
    })
}

fn decode(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunks: Vec<Result<&'static str, &'static str>>) -> Vec<Result<String, String>> {
        let stream = futures_util::stream::iter(
            chunks
                .into_iter()
                .map(|c| c.map(|s| Bytes::from_static(s.as_bytes()))),
        );
        tokio_test::block_on(
            lines(stream)
                .map(|r| r.map_err(|e| e.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn lines_split_across_chunks_are_joined() {
        let out = collect(vec![Ok("data: a"), Ok("bc\ndata: "), Ok("d\r\n\n")]);
        assert_eq!(
            out,
            vec![
                Ok("data: abc".to_string()),
                Ok("data: d".to_string()),
                Ok(String::new()),
            ]
        );
    }

    #[test]
    fn trailing_line_without_newline_is_emitted() {
        let out = collect(vec![Ok("{\"a\":1}\n{\"b\":2}")]);
        assert_eq!(
            out,
            vec![Ok("{\"a\":1}".to_string()), Ok("{\"b\":2}".to_string())]
        );
    }

    #[test]
    fn transport_error_ends_the_stream() {
        let out = collect(vec![Ok("one\n"), Err("reset"), Ok("never\n")]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok("one".to_string()));
        assert!(out[1].as_ref().is_err_and(|e| e.contains("reset")));
    }
}
