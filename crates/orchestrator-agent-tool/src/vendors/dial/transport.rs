use serde_json::Value;
use tracing::warn;

use crate::delta::{DeltaEvent, decode_chunk};
use crate::errors::TransportError;
use crate::model::AgentId;

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE framer; network chunks may split frames anywhere.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, delim_len)) = find_frame_end(&self.buf) {
            let frame_bytes: Vec<u8> = self.buf.drain(..end + delim_len).take(end).collect();
            if let Some(frame) = parse_sse_frame(&frame_bytes) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Returns a trailing frame left without a blank-line terminator.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buf);
        parse_sse_frame(&rest)
    }
}

fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    (0..buf.len()).find_map(|i| {
        if buf[i..].starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if buf[i..].starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

fn parse_sse_frame(bytes: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data_lines = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start().to_string());
        }
    }
    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
    })
}

/// Maps one SSE frame to delta events.
///
/// `[DONE]` and empty frames yield nothing; frames that are not JSON are
/// skipped with a warning. An `error` object inside a chunk fails the stream.
pub(crate) fn map_dial_frame_to_events(
    agent: &AgentId,
    frame: &SseFrame,
) -> Result<Vec<DeltaEvent>, TransportError> {
    let data = frame.data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(Vec::new());
    }
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => {
            warn!(agent = %agent, error = %err, "skipping SSE frame that is not JSON");
            return Ok(Vec::new());
        }
    };
    map_dial_chunk_to_events(agent, &value)
}

pub(crate) fn map_dial_chunk_to_events(
    agent: &AgentId,
    chunk: &Value,
) -> Result<Vec<DeltaEvent>, TransportError> {
    if let Some(error) = chunk.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("agent stream error");
        let status_code = error
            .get("code")
            .and_then(|code| {
                code.as_u64()
                    .or_else(|| code.as_str().and_then(|s| s.parse().ok()))
            })
            .and_then(|code| u16::try_from(code).ok());
        return Err(TransportError::provider(agent.clone(), message, status_code));
    }
    Ok(decode_chunk(chunk))
}
