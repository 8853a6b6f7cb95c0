//! # Agents
//!
//! An `Agent` is a named participant in a workflow: instructions, tools,
//! handoff edges to other agents, MCP servers whose tools it borrows and an
//! optional structured output type. Agents are declared with a builder and
//! finished with [`Agent::build`], which rejects malformed declarations before
//! anything runs.

use std::sync::Arc;

use crate::config::DEFAULT_MODEL;
use crate::error::{AgentsError, Result};
use crate::handoff::Handoff;
use crate::items::Message;
use crate::mcp::McpServerStdio;
use crate::output::OutputSchema;
use crate::tool::{ensure_unique_names, Tool};

/// Defines the complete configuration for an [`Agent`].
#[derive(Clone)]
pub struct AgentConfig {
    /// The name of the agent, used for identification, routing and logs.
    pub name: String,

    /// The system instructions that guide the agent's behavior.
    pub instructions: String,

    /// Shown to other agents that can hand off to this one.
    pub handoff_description: Option<String>,

    pub tools: Vec<Arc<dyn Tool>>,

    pub handoffs: Vec<Handoff>,

    /// MCP servers whose tools are offered alongside `tools`. Connecting them
    /// is the caller's job; see [`McpServerStdio::scoped`].
    pub mcp_servers: Vec<Arc<McpServerStdio>>,

    pub model: String,

    /// Model calls allowed in a run that starts at this agent, counted across
    /// every handoff. [`RunConfig::with_max_turns`](crate::RunConfig::with_max_turns)
    /// overrides it; a specialist's own value is not consulted.
    pub max_turns: Option<usize>,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,

    /// When set, the final answer must be JSON of this shape.
    pub output_schema: Option<OutputSchema>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            instructions: "You are a helpful assistant.".to_string(),
            handoff_description: None,
            tools: vec![],
            handoffs: vec![],
            mcp_servers: vec![],
            model: DEFAULT_MODEL.to_string(),
            max_turns: Some(10),
            temperature: None,
            max_tokens: None,
            output_schema: None,
        }
    }
}

/// An LLM-backed agent.
///
/// ```rust
/// use apprise_agents::{Agent, Handoff};
/// use apprise_agents::marketplace::support_tools;
///
/// let billing = Agent::simple("Billing Agent", "You handle billing questions.")
///     .with_handoff_description("Specialist agent for billing inquiries");
///
/// let triage = Agent::simple("Customer Service", "Route the customer to the right specialist.")
///     .with_tools(support_tools())
///     .with_handoff(Handoff::to(billing))
///     .build()
///     .unwrap();
///
/// assert_eq!(triage.handoffs()[0].tool_name, "transfer_to_billing_agent");
/// ```
#[derive(Clone)]
pub struct Agent {
    pub config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Creates an agent with just a name and instructions.
    pub fn simple(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self::new(AgentConfig {
            name: name.into(),
            instructions: instructions.into(),
            ..Default::default()
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_handoff_description(mut self, description: impl Into<String>) -> Self {
        self.config.handoff_description = Some(description.into());
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.config.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.config.tools.extend(tools);
        self
    }

    pub fn with_handoff(mut self, handoff: Handoff) -> Self {
        self.config.handoffs.push(handoff);
        self
    }

    pub fn with_handoffs(mut self, handoffs: Vec<Handoff>) -> Self {
        self.config.handoffs.extend(handoffs);
        self
    }

    pub fn with_mcp_server(mut self, server: Arc<McpServerStdio>) -> Self {
        self.config.mcp_servers.push(server);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.config.max_turns = Some(max_turns);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Require the final answer to be JSON shaped like `T`.
    pub fn with_output_type<T: schemars::JsonSchema>(mut self) -> Self {
        self.config.output_schema = Some(OutputSchema::of::<T>());
        self
    }

    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.config.output_schema = Some(schema);
        self
    }

    /// Finish the declaration.
    ///
    /// Fails with [`AgentsError::InvalidAgent`] on an empty name and with
    /// [`AgentsError::DuplicateTool`] when two tools, two handoffs, or a tool
    /// and a handoff share a name.
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// The checks [`Agent::build`] runs, without consuming the agent.
    pub fn validate(&self) -> Result<()> {
        if self.config.name.trim().is_empty() {
            return Err(AgentsError::InvalidAgent {
                message: "agent name must not be empty".to_string(),
            });
        }
        let tool_names = self.config.tools.iter().map(|t| t.name());
        let handoff_names = self.config.handoffs.iter().map(|h| h.tool_name.as_str());
        ensure_unique_names(&self.config.name, tool_names.chain(handoff_names))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn instructions(&self) -> &str {
        &self.config.instructions
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.config.tools
    }

    pub fn handoffs(&self) -> &[Handoff] {
        &self.config.handoffs
    }

    pub fn mcp_servers(&self) -> &[Arc<McpServerStdio>] {
        &self.config.mcp_servers
    }

    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.config.output_schema.as_ref()
    }

    pub fn has_tools(&self) -> bool {
        !self.config.tools.is_empty() || !self.config.mcp_servers.is_empty()
    }

    pub fn has_handoffs(&self) -> bool {
        !self.config.handoffs.is_empty()
    }

    /// Find the edge whose tool name is `tool_name`.
    pub fn find_handoff(&self, tool_name: &str) -> Option<&Handoff> {
        self.config.handoffs.iter().find(|h| h.tool_name == tool_name)
    }

    /// Instructions plus a listing of tools, handoff targets and the expected
    /// output shape.
    pub fn build_system_message(&self) -> Message {
        let mut content = self.config.instructions.clone();

        if !self.config.tools.is_empty() {
            content.push_str("\n\nYou have access to the following tools:\n");
            for tool in &self.config.tools {
                content.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
        }

        if !self.config.handoffs.is_empty() {
            content.push_str("\n\nYou can hand off to the following agents:\n");
            for handoff in &self.config.handoffs {
                content.push_str(&format!(
                    "- {} (call {}): {}\n",
                    handoff.name, handoff.tool_name, handoff.description
                ));
            }
        }

        if let Some(schema) = &self.config.output_schema {
            content.push_str(&format!(
                "\n\nYour final answer must be a single JSON value matching the {} schema:\n{}\n",
                schema.name(),
                schema.schema()
            ));
        }

        Message::system(content)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("model", &self.config.model)
            .field("tools_count", &self.config.tools.len())
            .field("handoffs_count", &self.config.handoffs.len())
            .field("mcp_servers_count", &self.config.mcp_servers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::EscalationData;
    use crate::tool::FunctionTool;
    use pretty_assertions::assert_eq;

    fn tool(name: &str) -> Arc<dyn Tool> {
        Arc::new(FunctionTool::no_args(name, "test tool", || "ok".to_string()))
    }

    #[test]
    fn test_agent_defaults() {
        let agent = Agent::simple("Customer Service", "Route requests");
        assert_eq!(agent.name(), "Customer Service");
        assert_eq!(agent.config.model, DEFAULT_MODEL);
        assert_eq!(agent.config.max_turns, Some(10));
        assert!(!agent.has_tools());
        assert!(!agent.has_handoffs());
    }

    #[test]
    fn test_agent_builder() {
        let agent = Agent::simple("Builder", "Test instructions")
            .with_model("gpt-4.1")
            .with_temperature(0.5)
            .with_max_turns(5)
            .with_max_tokens(1000)
            .with_tool(tool("get_time"))
            .build()
            .unwrap();

        assert_eq!(agent.config.model, "gpt-4.1");
        assert_eq!(agent.config.temperature, Some(0.5));
        assert_eq!(agent.config.max_turns, Some(5));
        assert_eq!(agent.config.max_tokens, Some(1000));
        assert_eq!(agent.tools().len(), 1);
    }

    #[test]
    fn test_duplicate_tool_names_fail_build() {
        let err = Agent::simple("EmailAssistant", "x")
            .with_tools(vec![tool("get_time"), tool("send_email"), tool("get_time")])
            .build()
            .unwrap_err();
        assert!(
            matches!(err, AgentsError::DuplicateTool { ref agent, ref tool } if agent == "EmailAssistant" && tool == "get_time")
        );
    }

    #[test]
    fn test_tool_colliding_with_handoff_fails_build() {
        let err = Agent::simple("Customer Service", "x")
            .with_tool(tool("transfer_to_billing_agent"))
            .with_handoff(Handoff::to(Agent::simple("Billing Agent", "y")))
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentsError::DuplicateTool { .. }));
    }

    #[test]
    fn test_duplicate_handoffs_fail_build() {
        let err = Agent::simple("Customer Service", "x")
            .with_handoffs(vec![
                Handoff::to(Agent::simple("Billing Agent", "y")),
                Handoff::to(Agent::simple("Billing Agent", "z")),
            ])
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentsError::DuplicateTool { .. }));
    }

    #[test]
    fn test_empty_name_fails_build() {
        let err = Agent::simple("  ", "x").build().unwrap_err();
        assert!(matches!(err, AgentsError::InvalidAgent { .. }));
    }

    #[test]
    fn test_system_message_generation() {
        let agent = Agent::simple("Service Agent", "You are a customer service agent.")
            .with_tool(tool("contact_support"))
            .with_handoff(Handoff::to(Agent::simple("Escalation Agent", "y")))
            .with_output_type::<EscalationData>();

        let sys_msg = agent.build_system_message();
        assert_eq!(sys_msg.role, crate::items::Role::System);
        assert!(sys_msg.content.starts_with("You are a customer service agent."));
        assert!(sys_msg.content.contains("- contact_support: test tool"));
        assert!(sys_msg.content.contains("transfer_to_escalation_agent"));
        assert!(sys_msg.content.contains("EscalationData"));
    }

    #[test]
    fn test_find_handoff() {
        let agent = Agent::simple("Customer Service", "x")
            .with_handoff(Handoff::to(Agent::simple("Technical Agent", "y")));
        assert_eq!(
            agent.find_handoff("transfer_to_technical_agent").map(|h| h.name.as_str()),
            Some("Technical Agent")
        );
        assert!(agent.find_handoff("Technical Agent").is_none());
    }

    #[test]
    fn test_agent_debug_format() {
        let debug_str = format!("{:?}", Agent::simple("Debug", "Debug agent"));
        assert!(debug_str.contains("Debug"));
        assert!(debug_str.contains("tools_count"));
    }
}
