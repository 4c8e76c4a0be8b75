use std::pin::Pin;

use serde_json::{Map, Value};

use crate::content::ConversationTurn;
use crate::delta::DeltaEvent;
use crate::errors::TransportError;
use crate::model::AgentId;

/// Decoded delta stream of one downstream call.
pub type DeltaStream =
    Pin<Box<dyn futures::Stream<Item = Result<DeltaEvent, TransportError>> + Send + 'static>>;

/// Outbound request for one delegated call.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Agent being called, used for logging and error attribution.
    pub agent: AgentId,
    /// Deployment the transport should address.
    pub deployment: String,
    /// Replayed history followed by the new user turn.
    pub messages: Vec<ConversationTurn>,
    /// Pass-through tool arguments.
    pub configuration: Map<String, Value>,
    /// Opaque identifier used by the transport for correlation.
    pub conversation_id: String,
}

/// Connection to downstream agents.
///
/// Implementations own wire encoding, authentication and HTTP concerns and
/// hand back already-decoded `DeltaEvent`s.
#[async_trait::async_trait]
pub trait AgentTransport: Send + Sync {
    async fn start_stream(&self, request: CompletionRequest) -> Result<DeltaStream, TransportError>;
}
