use crate::model::AgentId;

/// Errors raised by an `AgentTransport` while starting or reading a stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The downstream agent answered with a failure (HTTP status or an
    /// in-stream error object).
    #[error("agent error ({agent}): {message}")]
    Provider {
        agent: AgentId,
        message: String,
        status_code: Option<u16>,
    },
    /// Request or stream I/O failed.
    #[error("transport error ({agent}): {message}")]
    Transport { agent: AgentId, message: String },
    /// Response shape was invalid.
    #[error("protocol error ({agent}): {message}")]
    Protocol { agent: AgentId, message: String },
}

impl TransportError {
    /// Creates an agent-level error.
    pub fn provider(
        agent: impl Into<AgentId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Provider {
            agent: agent.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(agent: impl Into<AgentId>, message: impl Into<String>) -> Self {
        Self::Transport {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(agent: impl Into<AgentId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Returns the agent associated with this error.
    pub fn agent_id(&self) -> &AgentId {
        match self {
            Self::Provider { agent, .. }
            | Self::Transport { agent, .. }
            | Self::Protocol { agent, .. } => agent,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }
}

/// Top-level error type for delegated agent calls.
///
/// Only argument validation and transport-level failures are fatal; stream
/// anomalies (unknown stage, late fragments, double close) never surface here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// A required tool-call argument is absent.
    #[error("missing required argument: {0}")]
    MissingArgument(String),
    /// Tool-call arguments are not a JSON object.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),
    /// Invalid tool or client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// No registered tool matches the requested function name.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    /// The downstream call or its stream failed.
    #[error(transparent)]
    Transport(TransportError),
    /// The caller cancelled the call.
    #[error("cancelled")]
    Cancelled,
    /// The call exceeded its configured timeout.
    #[error("timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },
}

impl From<TransportError> for ToolError {
    fn from(value: TransportError) -> Self {
        ToolError::Transport(value)
    }
}
