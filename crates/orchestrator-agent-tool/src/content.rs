use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// File or link attached to a reply or to a stage.
///
/// Kept as the raw JSON object it arrived as, so it is forwarded unchanged.
/// The accessors only read well-known string fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attachment(Map<String, Value>);

impl Attachment {
    /// Creates a link attachment.
    pub fn link(url: impl Into<String>, title: Option<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("url".into(), Value::String(url.into()));
        if let Some(title) = title {
            fields.insert("title".into(), Value::String(title));
        }
        Self(fields)
    }

    /// MIME type, from the `type` field.
    pub fn kind(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn url(&self) -> Option<&str> {
        self.str_field("url")
    }

    pub fn data(&self) -> Option<&str> {
        self.str_field("data")
    }

    pub fn reference_url(&self) -> Option<&str> {
        self.str_field("reference_url")
    }

    /// Raw value of any field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for Attachment {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Non-text payload carried by a turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomContent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Continuation state. On transcript assistant turns this is a map keyed
    /// by agent identity; on replayed turns it is the single agent's own blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One message of the orchestrator's transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_content: Option<CustomContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Fields this crate does not interpret (`tool_calls`, `name`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationTurn {
    /// Creates a turn with text content and nothing else.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            custom_content: None,
            tool_call_id: None,
            extra: Map::new(),
        }
    }

    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attaches custom content.
    pub fn with_custom_content(mut self, custom_content: CustomContent) -> Self {
        self.custom_content = Some(custom_content);
        self
    }

    /// Attaches continuation state, creating custom content if needed.
    pub fn with_state(mut self, state: Value) -> Self {
        self.custom_content.get_or_insert_with(CustomContent::default).state = Some(state);
        self
    }

    /// Returns the continuation state, if any.
    pub fn state(&self) -> Option<&Value> {
        self.custom_content.as_ref().and_then(|cc| cc.state.as_ref())
    }
}

/// Function call issued by the orchestrating model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Function name, matched against registered agent identities.
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attachment_keeps_unknown_fields_verbatim() {
        let raw = json!({"type": "image/png", "url": "files/a.png", "preview": {"w": 10}});
        let attachment: Attachment = serde_json::from_value(raw.clone()).expect("attachment");
        assert_eq!(attachment.kind(), Some("image/png"));
        assert_eq!(serde_json::to_value(&attachment).expect("serialize"), raw);
    }

    #[test]
    fn attachment_round_trips_fields_of_any_shape() {
        let raw = json!([
            {"url": "a.md", "title": {"en": "Report"}},
            {"url": "b.md", "title": null, "type": "text/markdown"}
        ]);
        let attachments: Vec<Attachment> =
            serde_json::from_value(raw.clone()).expect("attachments");
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].title(), None);
        assert_eq!(attachments[0].get("title"), Some(&json!({"en": "Report"})));
        assert_eq!(attachments[1].url(), Some("b.md"));
        assert_eq!(serde_json::to_value(&attachments).expect("serialize"), raw);
    }

    #[test]
    fn turn_serialization_omits_absent_fields() {
        let turn = ConversationTurn::user("hi");
        assert_eq!(
            serde_json::to_value(&turn).expect("serialize"),
            json!({"role": "user", "content": "hi"})
        );
    }

    #[test]
    fn turn_passes_through_tool_calls() {
        let raw = json!({
            "role": "assistant",
            "tool_calls": [{"id": "c1", "type": "function"}],
            "custom_content": {"state": {"web_search_agent": {"k": 1}}}
        });
        let turn: ConversationTurn = serde_json::from_value(raw.clone()).expect("turn");
        assert!(turn.content.is_none());
        assert_eq!(turn.state(), Some(&json!({"web_search_agent": {"k": 1}})));
        assert_eq!(serde_json::to_value(&turn).expect("serialize"), raw);
    }
}
