use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::content::{ConversationTurn, ToolCall};
use crate::errors::ToolError;
use crate::invoker::{AgentTool, InvocationContext};
use crate::model::AgentId;

/// Set of agent tools the orchestrator can dispatch calls to.
#[derive(Clone)]
pub struct AgentToolset {
    tools: HashMap<AgentId, AgentTool>,
    order: Vec<AgentId>,
}

impl AgentToolset {
    /// Starts a builder for registering agent tools.
    pub fn builder() -> AgentToolsetBuilder {
        AgentToolsetBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&AgentTool> {
        self.tools.get(&AgentId::new(name))
    }

    /// Function definitions in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(AgentTool::definition)
            .collect()
    }

    /// Routes `call` to the tool registered under its function name.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        ctx: InvocationContext<'_>,
    ) -> Result<ConversationTurn, ToolError> {
        let tool = self.get(&call.name).ok_or_else(|| ToolError::UnknownTool {
            name: call.name.clone(),
        })?;
        tool.invoke(call, ctx).await
    }
}

/// Builder used to register agent tools before creating an `AgentToolset`.
#[derive(Default)]
pub struct AgentToolsetBuilder {
    tools: Vec<AgentTool>,
}

impl AgentToolsetBuilder {
    /// Registers a tool. Names must be unique.
    pub fn register(mut self, tool: AgentTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// Builds the toolset and rejects duplicate tool names.
    pub fn build(self) -> Result<AgentToolset, ToolError> {
        let mut tools = HashMap::new();
        let mut order = Vec::new();
        let mut seen: HashSet<AgentId> = HashSet::new();
        for tool in self.tools {
            let name = tool.name().clone();
            if !seen.insert(name.clone()) {
                return Err(ToolError::Config(format!(
                    "duplicate agent tool registration: {name}"
                )));
            }
            order.push(name.clone());
            tools.insert(name, tool);
        }
        Ok(AgentToolset { tools, order })
    }
}
