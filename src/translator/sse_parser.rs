//! Server-Sent Events parsing for streamed chat completions.

use bytes::Bytes;
use futures_util::Stream;
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// What a single SSE line means to the reader.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum SseLine {
    Text(String),
    Done,
    Skip,
}

/// Turns a raw SSE byte stream into the text deltas it carries.
///
/// Lines may be split across chunks; the stream ends at `data: [DONE]` or
/// when the body ends.
pub(super) fn sse_to_text_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send {
    async_stream::stream! {
        use futures_util::StreamExt;

        let mut byte_stream = std::pin::pin!(byte_stream);
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    yield Err(Error::Backend(format!("stream error: {e}")));
                    return;
                }
            };
            pending.extend_from_slice(&chunk);

            // Split on raw bytes so multi-byte characters across chunks stay intact.
            while let Some(line_end) = pending.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = pending.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&raw);

                match parse_sse_line(line.trim()) {
                    SseLine::Text(text) => yield Ok(text),
                    SseLine::Done => return,
                    SseLine::Skip => {}
                }
            }
        }

        let tail = String::from_utf8_lossy(&pending);
        if let SseLine::Text(text) = parse_sse_line(tail.trim()) {
            yield Ok(text);
        }
    }
}

/// Classifies one trimmed SSE line such as `data: {"choices":[...]}`.
pub(super) fn parse_sse_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
        return SseLine::Skip;
    };
    if payload == "[DONE]" {
        return SseLine::Done;
    }

    let Ok(response) = serde_json::from_str::<StreamResponse>(payload) else {
        return SseLine::Skip;
    };

    let content: String = response
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();

    if content.is_empty() {
        SseLine::Skip
    } else {
        SseLine::Text(content)
    }
}
