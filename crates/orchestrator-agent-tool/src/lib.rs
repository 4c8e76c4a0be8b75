//! Delegation of sub-tasks to specialized agents reachable as streaming
//! chat-completion endpoints.
//!
//! A delegated call replays (optionally) the previous exchanges with the same
//! agent, streams the agent's answer, and folds the incremental deltas into a
//! single tool reply: text, attachments, progress stages and an opaque
//! continuation state.
//!
//! # Usage (DIAL transport)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use orchestrator_agent_tool::prelude::*;
//! use orchestrator_agent_tool::progress::NoopSink;
//! use orchestrator_agent_tool::vendors::dial::DialTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ToolError> {
//! let transport = Arc::new(DialTransport::from_env()?);
//! let toolset = AgentToolset::builder()
//!     .register(AgentTool::new(AgentSpec::web_search(), transport))
//!     .build()?;
//!
//! let transcript = vec![ConversationTurn::user("What changed in Rust lately?")];
//! let call = ToolCall::new("call-1", "web_search_agent", r#"{"prompt":"latest Rust release"}"#);
//! let reply = toolset
//!     .dispatch(&call, InvocationContext::new(&transcript, &NoopSink))
//!     .await?;
//!
//! println!("{}", reply.content.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

/// Folding of one delta stream into an aggregate result.
pub mod aggregator;
/// Inbound tool-call argument parsing.
pub mod arguments;
/// Conversation turns, attachments and tool calls.
pub mod content;
/// Decoded stream deltas and the chunk decoding boundary.
pub mod delta;
/// Public error types.
pub mod errors;
/// Replay of previous exchanges with the same agent.
pub mod history;
/// Agent descriptions and the delegating tool.
pub mod invoker;
/// Agent identifiers and invocation options.
pub mod model;
/// Process-wide tracing setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Live progress events and sinks.
pub mod progress;
/// Registration and dispatch of several agent tools.
pub mod registry;
/// Stage lifecycle tracking.
pub mod stage;
/// Transport contract used to reach downstream agents.
pub mod transport;
/// Vendor-specific transports.
pub mod vendors;

pub use aggregator::{AbortHandle, AbortSignal, AggregateResult, StreamAggregator};
pub use arguments::ToolCallArguments;
pub use content::{Attachment, ConversationTurn, CustomContent, Role, ToolCall};
pub use delta::{DeltaEvent, StageAction, StageDelta, decode_chunk};
pub use errors::{ToolError, TransportError};
pub use history::{ReplayPair, reconstruct_history};
pub use invoker::{AgentSpec, AgentTool, InvocationContext, build_messages};
pub use model::{AgentId, InvokeOptions};
pub use observability::{DEFAULT_LOG_FILTER, LogSettings, init_observability};
pub use progress::{ChannelSink, NoopSink, ProgressEvent, ProgressSink};
pub use registry::{AgentToolset, AgentToolsetBuilder};
pub use stage::{Stage, StageError, StageState, StageTracker};
pub use transport::{AgentTransport, CompletionRequest, DeltaStream};
