use std::fmt;
use std::time::Duration;

/// Stable identity of a downstream agent (for example `web_search_agent`).
///
/// The identity doubles as the tool name exposed to the orchestrating model
/// and as the key under which the agent's continuation state is stored in
/// the transcript.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Creates an agent id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the agent id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Per-tool invocation behavior.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct InvokeOptions {
    /// Upper bound on how long one delegated call may stream.
    ///
    /// Expiry is handled like cancellation: open stages are closed and the
    /// call fails with `ToolError::TimedOut`.
    pub timeout: Option<Duration>,
}

impl InvokeOptions {
    /// Sets the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_displays_raw_value() {
        assert_eq!(AgentId::from("web_search_agent").to_string(), "web_search_agent");
    }

    #[test]
    fn invoke_options_default_has_no_timeout() {
        assert!(InvokeOptions::default().timeout.is_none());
        let options = InvokeOptions::default().timeout(Duration::from_secs(5));
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }
}
