//! Decoded stream deltas.
//!
//! A chat-completion chunk may carry text, attachments, state and stage
//! updates at once. `decode_chunk` splits it into single-purpose
//! `DeltaEvent`s (in that order) so the aggregator can match exhaustively.

use serde_json::Value;
use tracing::debug;

use crate::content::Attachment;

/// One incremental unit of a streamed agent response.
#[derive(Clone, Debug, PartialEq)]
pub enum DeltaEvent {
    /// Text fragment to append to the reply.
    Content(String),
    /// Reply-level attachments, in arrival order.
    Attachments(Vec<Attachment>),
    /// Continuation state; the last one received wins.
    State(Value),
    /// Stage updates, applied in the order given.
    Stages(Vec<StageDelta>),
}

/// Update addressed to the stage identified by `index`.
#[derive(Clone, Debug, PartialEq)]
pub struct StageDelta {
    pub index: u64,
    pub action: StageAction,
}

impl StageDelta {
    pub fn new(index: u64, action: StageAction) -> Self {
        Self { index, action }
    }
}

/// The single operation a `StageDelta` carries.
#[derive(Clone, Debug, PartialEq)]
pub enum StageAction {
    /// No recognized payload. Opens an unseen stage, otherwise ignored.
    Open,
    AppendName(String),
    AppendContent(String),
    AddAttachments(Vec<Attachment>),
    Complete,
}

/// Decodes one chat-completion chunk into ordered delta events.
///
/// Only `choices[0].delta` is interpreted. Unrecognized or malformed parts
/// are skipped.
pub fn decode_chunk(chunk: &Value) -> Vec<DeltaEvent> {
    let Some(delta) = chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
    else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(text) = delta.get("content").and_then(Value::as_str)
        && !text.is_empty()
    {
        events.push(DeltaEvent::Content(text.to_string()));
    }

    let Some(custom) = delta.get("custom_content").filter(|v| v.is_object()) else {
        return events;
    };
    let attachments = decode_attachments(custom.get("attachments"));
    if !attachments.is_empty() {
        events.push(DeltaEvent::Attachments(attachments));
    }
    if let Some(state) = custom.get("state").filter(|v| is_truthy(v)) {
        events.push(DeltaEvent::State(state.clone()));
    }
    if let Some(raw_stages) = custom.get("stages").and_then(Value::as_array) {
        let stages: Vec<StageDelta> = raw_stages.iter().filter_map(decode_stage).collect();
        if !stages.is_empty() {
            events.push(DeltaEvent::Stages(stages));
        }
    }
    events
}

/// Picks the stage operation by field precedence: name, content,
/// attachments, then a `completed` status.
fn decode_stage(raw: &Value) -> Option<StageDelta> {
    let Some(index) = raw.get("index").and_then(Value::as_u64) else {
        debug!(stage = %raw, "skipping stage delta without a valid index");
        return None;
    };
    let non_empty_str = |key: &str| {
        raw.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    };

    let attachments = decode_attachments(raw.get("attachments"));

    let action = if let Some(name) = non_empty_str("name") {
        StageAction::AppendName(name)
    } else if let Some(content) = non_empty_str("content") {
        StageAction::AppendContent(content)
    } else if !attachments.is_empty() {
        StageAction::AddAttachments(attachments)
    } else if raw.get("status").and_then(Value::as_str) == Some("completed") {
        StageAction::Complete
    } else {
        StageAction::Open
    };
    Some(StageDelta { index, action })
}

fn decode_attachments(raw: Option<&Value>) -> Vec<Attachment> {
    let Some(items) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(attachment) => Some(attachment),
            Err(err) => {
                debug!(error = %err, "skipping malformed attachment");
                None
            }
        })
        .collect()
}

/// Emptiness test used for optional JSON payloads: `null`, `false`, zero,
/// empty strings and empty containers count as absent.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
