use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::delta::DeltaEvent;
use crate::errors::{ToolError, TransportError};
use crate::model::AgentId;
use crate::transport::{AgentTransport, CompletionRequest, DeltaStream};

use super::config::DialClientConfig;
use super::transport::{SseDecoder, map_dial_frame_to_events};

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Streams chat completions from DIAL deployments.
pub struct DialTransport {
    client: reqwest::Client,
    config: DialClientConfig,
}

impl DialTransport {
    /// Creates a transport from explicit client configuration.
    pub fn new(config: DialClientConfig) -> Result<Self, ToolError> {
        if config.endpoint.trim().is_empty() {
            return Err(ToolError::Config(
                "DIAL client config endpoint must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ToolError::Config(format!("failed to build DIAL client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport using `DIAL_ENDPOINT` and `DIAL_API_KEY`.
    pub fn from_env() -> Result<Self, ToolError> {
        Self::new(DialClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl AgentTransport for DialTransport {
    async fn start_stream(&self, request: CompletionRequest) -> Result<DeltaStream, TransportError> {
        let agent = request.agent.clone();
        let body = build_request_body(&request);
        debug!(
            agent = %agent,
            deployment = %request.deployment,
            conversation_id = %request.conversation_id,
            "starting DIAL chat completion stream"
        );

        let response = self
            .client
            .post(self.config.completions_url(&request.deployment))
            .header("api-key", &self.config.api_key)
            .header("x-conversation-id", &request.conversation_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::transport(agent.clone(), format!("DIAL request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::provider(
                agent,
                format!("DIAL completion request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(Box::pin(dial_event_stream(agent, bytes_stream)))
    }
}

pub(crate) fn build_request_body(request: &CompletionRequest) -> serde_json::Value {
    serde_json::json!({
        "messages": request.messages,
        "stream": true,
        "custom_fields": {
            "configuration": request.configuration,
        },
    })
}

fn dial_event_stream(
    agent: AgentId,
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<DeltaEvent, TransportError>> + Send {
    struct State {
        agent: AgentId,
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<DeltaEvent>,
        done: bool,
    }

    stream::try_unfold(
        State {
            agent,
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes_stream.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            let events = map_dial_frame_to_events(&state.agent, &frame)?;
                            state.pending.extend(events);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(TransportError::transport(
                            state.agent,
                            format!("DIAL streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        if let Some(frame) = state.decoder.finish() {
                            let events = map_dial_frame_to_events(&state.agent, &frame)?;
                            state.pending.extend(events);
                        }
                        state.done = true;
                    }
                }
            }
        },
    )
}
