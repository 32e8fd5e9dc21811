//! Incremental decoder for the NDJSON body of `/api/chat`.
//!
//! Bytes are buffered only until the next newline; every complete line is
//! parsed and surfaced as soon as it arrives. The returned stream is lazy, so
//! a consumer that stops polling stops the reads too. `idle` bounds each
//! read, not the whole body: a generation may run as long as it keeps talking.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use olama_core::{ChatDelta, ChatStream, ErrorKind, OllamaError};
use tracing::{debug, warn};

use crate::ollama::error::map_body_err;
use crate::ollama::wire::ChatChunk;

/// What one non-blank line said.
#[derive(Debug, PartialEq, Eq)]
pub struct Record {
    pub fragment: Option<String>,
    pub done: bool,
}

pub fn decode_ndjson<'a, S, B>(body: S, idle: Duration) -> ChatStream<'a>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'a,
    B: AsRef<[u8]> + Send + 'a,
{
    let s = async_stream::stream! {
        let mut body = Box::pin(body);
        let mut buf = BytesMut::new();
        let mut eof = false;
        loop {
            while let Some(line) = next_line(&mut buf, eof) {
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(rec)) => {
                        if let Some(text) = rec.fragment {
                            yield Ok(ChatDelta::Text(text));
                        }
                        if rec.done {
                            debug!(target:"providers::ollama","stream reported done");
                            yield Ok(ChatDelta::Done);
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(target:"providers::ollama","bad stream line: {} ({:?})", e, e.cause);
                        yield Err(e);
                        return;
                    }
                }
            }
            if eof {
                yield Err(OllamaError::parse("Failed to parse streaming response")
                    .with_cause("stream ended before completion"));
                return;
            }
            match tokio::time::timeout(idle, body.next()).await {
                Ok(Some(Ok(chunk))) => buf.extend_from_slice(chunk.as_ref()),
                Ok(Some(Err(e))) => {
                    warn!(target:"providers::ollama","stream interrupted: {}", e);
                    yield Err(map_body_err(e));
                    return;
                }
                Ok(None) => eof = true,
                Err(_) => {
                    warn!(target:"providers::ollama","no data for {:?}, giving up", idle);
                    yield Err(OllamaError::timeout()
                        .with_cause(format!("no data received for {idle:?}")));
                    return;
                }
            }
        }
    };
    Box::pin(s)
}

/// Pops the next complete line (without its terminator). At end of input the
/// unterminated tail counts as a line.
fn next_line(buf: &mut BytesMut, eof: bool) -> Option<Bytes> {
    if let Some(pos) = twoway::find_bytes(&buf[..], b"\n") {
        let mut line = buf.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(pos - 1);
        }
        return Some(line.freeze());
    }
    if eof && !buf.is_empty() {
        return Some(buf.split().freeze());
    }
    None
}

/// `Ok(None)` for blank lines; anything not shaped like a chat chunk is a
/// parse error. A chunk carrying `error` is the server giving up mid-stream.
pub fn parse_line(line: &[u8]) -> Result<Option<Record>, OllamaError> {
    let text = std::str::from_utf8(line)
        .map_err(|e| OllamaError::parse("Failed to parse streaming response").with_cause(e))?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    let chunk: ChatChunk = serde_json::from_str(text)
        .map_err(|e| OllamaError::parse("Failed to parse streaming response").with_cause(e))?;
    if let Some(err) = chunk.error {
        return Err(OllamaError::new(ErrorKind::ServerError, err));
    }
    Ok(Some(Record {
        fragment: chunk.message.map(|m| m.content).filter(|c| !c.is_empty()),
        done: chunk.done,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(chunks: &[&'static str]) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(chunks: &[&'static str]) -> Vec<Result<ChatDelta, OllamaError>> {
        decode_ndjson(body(chunks), Duration::from_secs(5)).collect().await
    }

    fn text(s: &str) -> Result<ChatDelta, OllamaError> {
        Ok(ChatDelta::Text(s.to_string()))
    }

    #[test]
    fn blank_line_is_skipped() {
        assert_eq!(parse_line(b"   ").unwrap(), None);
        assert_eq!(parse_line(b"").unwrap(), None);
    }

    #[test]
    fn empty_fragment_is_not_a_token() {
        let rec = parse_line(br#"{"message":{"role":"assistant","content":""},"done":false}"#)
            .unwrap()
            .unwrap();
        assert_eq!(rec, Record { fragment: None, done: false });
    }

    #[test]
    fn message_without_content_is_malformed() {
        let err = parse_line(br#"{"message":{"role":"assistant"},"done":false}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
    }

    #[test]
    fn error_record_is_server_error() {
        let err = parse_line(br#"{"error":"out of memory"}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert_eq!(err.detail, "out of memory");
    }

    #[tokio::test]
    async fn fragments_arrive_in_order_then_done() {
        let out = collect(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo, \"},\"done\":false}\n\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"world\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        ])
        .await;
        assert_eq!(out, vec![text("Hel"), text("lo, "), text("world"), Ok(ChatDelta::Done)]);
    }

    #[tokio::test]
    async fn lines_split_across_chunks_are_reassembled() {
        let out = collect(&[
            "{\"message\":{\"content\":\"a",
            "b\"},\"done\":false}\r\n{\"message\":{\"con",
            "tent\":\"c\"},\"done\":true}",
        ])
        .await;
        assert_eq!(out, vec![text("ab"), text("c"), Ok(ChatDelta::Done)]);
    }

    #[tokio::test]
    async fn lines_after_done_are_ignored() {
        let out = collect(&[
            "{\"done\":true}\n",
            "not json at all\n",
        ])
        .await;
        assert_eq!(out, vec![Ok(ChatDelta::Done)]);
    }

    #[tokio::test]
    async fn malformed_line_stops_the_stream() {
        let out = collect(&[
            "{\"message\":{\"content\":\"ok\"},\"done\":false}\n",
            "{\"message\": oops\n",
            "{\"message\":{\"content\":\"never\"},\"done\":true}\n",
        ])
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], text("ok"));
        assert_eq!(out[1].as_ref().unwrap_err().kind, ErrorKind::ParseError);
    }

    #[tokio::test]
    async fn silent_body_times_out_after_idle_period() {
        let first: Result<Bytes, reqwest::Error> =
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"hi\"},\"done\":false}\n"));
        let stalled = stream::iter(vec![first]).chain(stream::pending());
        let out: Vec<_> = tokio::time::timeout(
            Duration::from_secs(5),
            decode_ndjson(stalled, Duration::from_millis(100)).collect::<Vec<_>>(),
        )
        .await
        .expect("idle timeout should end the stream");
        assert_eq!(out[0], text("hi"));
        assert_eq!(out[1].as_ref().unwrap_err().kind, ErrorKind::Timeout);
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn steady_slow_body_outlives_idle_period() {
        let lines = ["{\"message\":{\"content\":\"a\"},\"done\":false}\n", "{\"done\":true}\n"];
        let slow = stream::iter(lines).then(|l| async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            Ok::<_, reqwest::Error>(Bytes::from_static(l.as_bytes()))
        });
        let out: Vec<_> = decode_ndjson(slow, Duration::from_millis(100)).collect().await;
        assert_eq!(out, vec![text("a"), Ok(ChatDelta::Done)]);
    }

    #[tokio::test]
    async fn truncated_body_is_a_parse_error() {
        let out = collect(&["{\"message\":{\"content\":\"half\"},\"done\":false}\n"]).await;
        assert_eq!(out[0], text("half"));
        assert_eq!(out[1].as_ref().unwrap_err().kind, ErrorKind::ParseError);
    }
}
