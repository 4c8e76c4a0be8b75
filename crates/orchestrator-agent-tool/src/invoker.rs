use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::aggregator::{
    AbortSignal, Deadline, StreamAggregator, timed_out, wait_for_abort, wait_for_deadline,
};
use crate::arguments::ToolCallArguments;
use crate::content::{ConversationTurn, Role, ToolCall};
use crate::errors::ToolError;
use crate::history::reconstruct_history;
use crate::model::{AgentId, InvokeOptions};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::transport::{AgentTransport, CompletionRequest};

const HISTORY_FLAG_DESCRIPTION: &str = "Flag to enable including the previous conversation history or not.\n\
If true - all the previous messages will be sent for context continuity.\n\
If false - send an individual message without historical context.\n\
Notes:\n \
- Only the conversation history between these two agents is shared; interactions with other agents are never included.\n \
- Should be set to `true` only when the `prompt` lacks sufficient context and the required context exists in the conversation history.";

/// Static description of a downstream agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSpec {
    /// Tool name and state key.
    pub name: AgentId,
    /// Deployment addressed by the transport.
    pub deployment_name: String,
    /// Tool description shown to the orchestrating model.
    pub description: String,
    /// Short label used in the `prompt` parameter description.
    pub display_name: String,
}

impl AgentSpec {
    pub fn new(
        name: impl Into<AgentId>,
        deployment_name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            deployment_name: deployment_name.into(),
            display_name: display_name.into(),
            description: description.into(),
        }
    }

    /// Agent that searches the web and synthesizes findings.
    pub fn web_search() -> Self {
        Self::new(
            "web_search_agent",
            "web-search-agent",
            "WEB Search Agent",
            "Agent that can performs complex web search. Ask it to find some information, \
             verify facts, or synthesize information from multiple sources",
        )
    }

    /// Agent that reads, analyzes and searches attached files.
    pub fn content_management() -> Self {
        Self::new(
            "content_management_agent",
            "content-management-agent",
            "Content Management Agent",
            "Agent that can work with files. Ask it when you need to:\n \
             - extract and analyze files content.\n \
             - performs RAG Search through files content.",
        )
    }
}

/// Per-call inputs owned by the orchestrating caller.
pub struct InvocationContext<'a> {
    /// Full transcript so far; its last turn is the current user request.
    pub transcript: &'a [ConversationTurn],
    /// Receives live progress for this call only.
    pub sink: &'a dyn ProgressSink,
    /// Correlation id forwarded to the transport. Generated when absent.
    pub conversation_id: Option<String>,
    pub abort: Option<AbortSignal>,
}

impl<'a> InvocationContext<'a> {
    pub fn new(transcript: &'a [ConversationTurn], sink: &'a dyn ProgressSink) -> Self {
        Self {
            transcript,
            sink,
            conversation_id: None,
            abort: None,
        }
    }

    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }
}

/// Tool that delegates a prompt to one downstream agent.
#[derive(Clone)]
pub struct AgentTool {
    spec: AgentSpec,
    transport: Arc<dyn AgentTransport>,
    options: InvokeOptions,
}

impl AgentTool {
    pub fn new(spec: AgentSpec, transport: Arc<dyn AgentTransport>) -> Self {
        Self {
            spec,
            transport,
            options: InvokeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InvokeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn name(&self) -> &AgentId {
        &self.spec.name
    }

    /// Function definition advertised to the orchestrating model.
    pub fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.spec.name.as_str(),
                "description": self.spec.description,
                "parameters": {
                    "type": "object",
                    "properties": {
                        "prompt": {
                            "type": "string",
                            "description": format!(
                                "The query or instruction to send to the {}.",
                                self.spec.display_name
                            ),
                        },
                        "propagate_history": {
                            "type": "boolean",
                            "default": false,
                            "description": HISTORY_FLAG_DESCRIPTION,
                        },
                    },
                    "required": ["prompt"],
                },
            },
        })
    }

    /// Runs one delegated call and returns the tool reply.
    ///
    /// Reply attachments are also forwarded one by one to the sink.
    pub async fn invoke(
        &self,
        call: &ToolCall,
        ctx: InvocationContext<'_>,
    ) -> Result<ConversationTurn, ToolError> {
        let args = ToolCallArguments::parse(&call.arguments)?;
        ctx.sink
            .emit(ProgressEvent::Title(format!(": {}", args.prompt)))
            .await;

        let messages = build_messages(&args, ctx.transcript, &self.spec.name);
        let conversation_id = ctx
            .conversation_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        info!(
            agent = %self.spec.name,
            call_id = %call.id,
            conversation_id = %conversation_id,
            messages = messages.len(),
            propagate_history = args.propagate_history,
            "delegating to agent"
        );

        let request = CompletionRequest {
            agent: self.spec.name.clone(),
            deployment: self.spec.deployment_name.clone(),
            messages,
            configuration: args.configuration,
            conversation_id,
        };
        // One deadline covers both connecting and draining.
        let deadline = self.options.timeout.map(Deadline::after);
        let mut abort = ctx.abort;
        let started = tokio::select! {
            biased;
            () = wait_for_abort(abort.as_mut()) => Err(ToolError::Cancelled),
            () = wait_for_deadline(deadline) => Err(timed_out(deadline)),
            started = self.transport.start_stream(request) => started.map_err(ToolError::from),
        };
        let result = match started {
            Ok(stream) => {
                StreamAggregator::new(ctx.sink)
                    .drain_until(stream, abort, deadline)
                    .await
            }
            Err(err) => Err(err),
        }
        .inspect_err(|err| warn!(agent = %self.spec.name, call_id = %call.id, error = %err, "agent call failed"))?;

        for attachment in &result.attachments {
            ctx.sink
                .emit(ProgressEvent::Attachment(attachment.clone()))
                .await;
        }
        info!(
            agent = %self.spec.name,
            call_id = %call.id,
            content_len = result.content.len(),
            attachments = result.attachments.len(),
            stages = result.stages.len(),
            has_state = result.state.is_some(),
            "agent call completed"
        );
        Ok(result.into_reply(&self.spec.name, call.id.clone()))
    }
}

/// Builds the outbound messages: replayed exchanges with `agent` (when
/// requested) followed by a user turn carrying the prompt and the custom
/// content of the transcript's last turn.
pub fn build_messages(
    args: &ToolCallArguments,
    transcript: &[ConversationTurn],
    agent: &AgentId,
) -> Vec<ConversationTurn> {
    let mut messages = Vec::new();
    if args.propagate_history {
        messages.extend(
            reconstruct_history(transcript, agent)
                .into_iter()
                .flat_map(|pair| pair.into_turns()),
        );
        debug!(agent = %agent, replayed = messages.len(), "history propagated");
    }

    let mut prompt = ConversationTurn::new(Role::User, args.prompt.clone());
    prompt.custom_content = transcript.last().and_then(|turn| turn.custom_content.clone());
    messages.push(prompt);
    messages
}
