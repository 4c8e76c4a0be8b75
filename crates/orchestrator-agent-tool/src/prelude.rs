//! Common imports for typical usage.
//!
//! Exports the types needed to register agent tools, invoke them and observe
//! their progress.
pub use crate::{
    AbortHandle, AgentId, AgentSpec, AgentTool, AgentToolset, AgentTransport, Attachment,
    ConversationTurn, InvocationContext, InvokeOptions, ProgressEvent, ProgressSink, Role,
    ToolCall, ToolError, TransportError,
};
