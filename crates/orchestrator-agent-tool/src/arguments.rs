use serde_json::{Map, Value};

use crate::errors::ToolError;

const PROMPT: &str = "prompt";
const PROPAGATE_HISTORY: &str = "propagate_history";

/// Parsed arguments of a delegated tool call.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallArguments {
    pub prompt: String,
    pub propagate_history: bool,
    /// Every other key, forwarded verbatim as the downstream agent's
    /// configuration.
    pub configuration: Map<String, Value>,
}

impl ToolCallArguments {
    /// Parses the raw JSON arguments of a tool call.
    ///
    /// A missing, non-string or blank `prompt` is a `MissingArgument` error.
    /// `propagate_history` must be a JSON boolean when present and defaults
    /// to `false`.
    pub fn parse(raw: &str) -> Result<Self, ToolError> {
        let value: Value = if raw.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))?
        };
        let Value::Object(mut configuration) = value else {
            return Err(ToolError::InvalidArguments(
                "tool arguments must be a JSON object".into(),
            ));
        };

        let prompt = match configuration.remove(PROMPT) {
            Some(Value::String(prompt)) if !prompt.trim().is_empty() => prompt,
            _ => return Err(ToolError::MissingArgument(PROMPT.into())),
        };
        let propagate_history = match configuration.remove(PROPAGATE_HISTORY) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return Err(ToolError::InvalidArguments(format!(
                    "`{PROPAGATE_HISTORY}` must be a boolean, got {other}"
                )));
            }
        };

        Ok(Self {
            prompt,
            propagate_history,
            configuration,
        })
    }
}
