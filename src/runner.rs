//! # Runner
//!
//! The `Runner` drives one request through an agent graph. Each turn it
//! advertises the active agent's tools (its own, its MCP servers', and one
//! per handoff edge), asks the model for the next step and then either
//! transfers control, executes tool calls through the tower stack in
//! `service.rs`, or finishes with the model's answer.
//!
//! A run moves through [`RunState`]s:
//!
//! ```text
//! Idle -> Running(root)
//! Running(a) -> Transferring(a, b) -> Running(b)    on a handoff call
//! Running(a) -> Completed                            on a final answer
//! ```
//!
//! Exactly one agent is active at a time. Every transition is recorded in
//! [`RunResult::transitions`] and reported to the [`RunObserver`] configured
//! on the run, if any.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::error::{AgentsError, Result};
use crate::handoff::{Handoff, HandoffContext, HandoffTool};
use crate::items::{ItemHelpers, Message, ModelResponse, Role, RunItem, ToolCall};
use crate::model::{ModelProvider, ModelRequest, OpenAIProvider};
use crate::result::RunResult;
use crate::service::{call_tool, Effect, ToolRequest, ToolResponse};
use crate::tool::{ensure_unique_names, Tool};
use crate::usage::UsageStats;

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { agent: String },
    Transferring { from: String, to: String },
    Completed,
}

/// One state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: RunState,
    pub to: RunState,
}

impl Transition {
    pub fn new(from: RunState, to: RunState) -> Self {
        Self { from, to }
    }
}

/// Hook notified of every state change while a run is in progress.
pub trait RunObserver: Send + Sync {
    fn on_transition(&self, transition: &Transition);
}

/// An observer that keeps every transition it sees.
#[derive(Debug, Default)]
pub struct TransitionLog {
    seen: Mutex<Vec<Transition>>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Names of the agents control was transferred to, in order.
    pub fn transfers(&self) -> Vec<String> {
        self.transitions()
            .into_iter()
            .filter_map(|t| match t.to {
                RunState::Transferring { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }
}

impl RunObserver for TransitionLog {
    fn on_transition(&self, transition: &Transition) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(transition.clone());
        }
    }
}

/// Configuration for an agent run.
#[derive(Clone)]
pub struct RunConfig {
    /// Model calls allowed over the whole run. Falls back to the starting
    /// agent's `max_turns`, then 10.
    pub max_turns: Option<usize>,

    /// Defaults to an [`OpenAIProvider`] for the starting agent's model.
    pub model_provider: Option<Arc<dyn ModelProvider>>,

    /// Execute the tool calls of one turn concurrently. Defaults to true.
    pub parallel_tools: bool,

    /// Upper bound on concurrent tool calls when `parallel_tools` is set.
    pub max_concurrency: Option<usize>,

    /// Per-call tool timeout.
    pub tool_timeout: Option<Duration>,

    pub observer: Option<Arc<dyn RunObserver>>,
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_turns", &self.max_turns)
            .field("model_provider", &self.model_provider.is_some())
            .field("parallel_tools", &self.parallel_tools)
            .field("max_concurrency", &self.max_concurrency)
            .field("tool_timeout", &self.tool_timeout)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: None,
            model_provider: None,
            parallel_tools: true,
            max_concurrency: None,
            tool_timeout: None,
            observer: None,
        }
    }
}

impl RunConfig {
    pub fn with_model_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.model_provider = Some(provider);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_parallel_tools(mut self, enabled: bool) -> Self {
        self.parallel_tools = enabled;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

fn format_messages_for_log(messages: &[Message]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(idx, m)| match (m.role, &m.tool_calls) {
            (Role::Assistant, Some(calls)) => {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                format!("{:02} ASSIST | tool_calls=[{}]", idx, names.join(", "))
            }
            (Role::Tool, _) => format!(
                "{:02} TOOL   | {} {}",
                idx,
                m.tool_call_id.as_deref().unwrap_or("?"),
                truncate_for_log(&m.content, 120)
            ),
            (role, _) => format!(
                "{:02} {:<6} | {}",
                idx,
                format!("{:?}", role).to_uppercase(),
                truncate_for_log(&m.content, 160)
            ),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mutable bookkeeping for one run.
struct RunTrace {
    run_id: String,
    state: RunState,
    transitions: Vec<Transition>,
    observer: Option<Arc<dyn RunObserver>>,
}

impl RunTrace {
    fn new(observer: Option<Arc<dyn RunObserver>>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            state: RunState::Idle,
            transitions: Vec::new(),
            observer,
        }
    }

    fn enter(&mut self, next: RunState) {
        let transition = Transition::new(std::mem::replace(&mut self.state, next.clone()), next);
        debug!(run_id = %self.run_id, from = ?transition.from, to = ?transition.to, "state change");
        if let Some(observer) = &self.observer {
            observer.on_transition(&transition);
        }
        self.transitions.push(transition);
    }
}

/// Tools offered to the model while `agent` is active.
async fn advertised_tools(agent: &Agent) -> Result<Vec<Arc<dyn Tool>>> {
    let mut tools: Vec<Arc<dyn Tool>> = agent.tools().to_vec();
    for server in agent.mcp_servers() {
        tools.extend(server.agent_tools().await?);
    }
    for handoff in agent.handoffs() {
        tools.push(Arc::new(HandoffTool::from(handoff.clone())));
    }
    ensure_unique_names(agent.name(), tools.iter().map(|t| t.name()))?;
    Ok(tools)
}

/// The main runner for executing agents.
///
/// ```rust,no_run
/// use apprise_agents::{Agent, Runner, runner::RunConfig};
///
/// # async fn run_agent() -> Result<(), Box<dyn std::error::Error>> {
/// let agent = Agent::simple("Assistant", "You are a helpful assistant").build()?;
/// let result = Runner::run(agent, "Write a haiku about recursion.", RunConfig::default()).await?;
/// println!("{}", result.final_text());
/// # Ok(())
/// # }
/// ```
pub struct Runner;

impl Runner {
    /// Run `agent` against `input` until some agent produces a final answer.
    pub async fn run(agent: Agent, input: impl Into<String>, config: RunConfig) -> Result<RunResult> {
        agent.validate()?;
        let input = input.into();
        let provider: Arc<dyn ModelProvider> = match &config.model_provider {
            Some(p) => p.clone(),
            None => Arc::new(OpenAIProvider::new(agent.config.model.clone())),
        };
        let max_turns = config
            .max_turns
            .or(agent.config.max_turns)
            .unwrap_or(10);

        let mut trace = RunTrace::new(config.observer.clone());
        info!(run_id = %trace.run_id, agent = %agent.name(), "starting run");

        let outcome = Self::run_loop(agent, input, &config, provider, max_turns, &mut trace).await;
        match &outcome {
            Ok(result) => info!(
                run_id = %trace.run_id,
                agent = %result.last_agent,
                tokens = result.usage.total.total_tokens,
                "run completed"
            ),
            Err(e) => warn!(run_id = %trace.run_id, error = %e, "run failed"),
        }
        outcome
    }

    /// Blocking variant of [`Runner::run`] on a fresh tokio runtime.
    pub fn run_sync(agent: Agent, input: impl Into<String>, config: RunConfig) -> Result<RunResult> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(Self::run(agent, input, config))
    }

    async fn run_loop(
        mut agent: Agent,
        input: String,
        config: &RunConfig,
        provider: Arc<dyn ModelProvider>,
        max_turns: usize,
        trace: &mut RunTrace,
    ) -> Result<RunResult> {
        let mut history = vec![Message::user(input.clone())];
        let mut items = vec![RunItem::message(agent.name(), Role::User, input)];
        let mut usage_stats = UsageStats::new();
        let mut turn_count = 0;

        trace.enter(RunState::Running {
            agent: agent.name().to_string(),
        });

        loop {
            turn_count += 1;
            if turn_count > max_turns {
                return Err(AgentsError::MaxTurnsExceeded { max_turns });
            }
            debug!(turn = turn_count, agent = %agent.name(), "starting turn");

            let tools = advertised_tools(&agent).await?;
            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(agent.build_system_message());
            messages.extend(history.iter().cloned());
            debug!(
                target: "runner::messages",
                "\n=== Sending to provider (agent: {}) ===\n{}\n=== end ===",
                agent.name(),
                format_messages_for_log(&messages)
            );

            let request = ModelRequest {
                agent: agent.name().to_string(),
                model: agent.config.model.clone(),
                messages,
                tools: tools.clone(),
                temperature: agent.config.temperature,
                max_tokens: agent.config.max_tokens,
                output_schema: agent.config.output_schema.clone(),
            };
            let (response, usage) = provider.complete(request).await?;
            usage_stats.record(&agent.config.model, agent.name(), usage);

            let content = response.content.clone().unwrap_or_default();
            if !response.has_tool_calls() {
                history.push(Message::assistant(&content));
                items.push(RunItem::message(agent.name(), Role::Assistant, &content));
                let final_output = match agent.output_schema() {
                    Some(schema) => schema.parse_text(&content)?,
                    None => Value::String(content),
                };
                return Ok(Self::finish(agent, final_output, items, usage_stats, trace));
            }

            history.push(Message::assistant_with_tool_calls(
                &content,
                response.tool_calls.clone(),
            ));
            if response.has_content() {
                items.push(RunItem::message(agent.name(), Role::Assistant, &content));
            }

            if let Some((call, handoff)) = Self::first_handoff(&agent, &response) {
                let handoff = handoff.clone();
                let call = call.clone();
                Self::transfer(&agent, &handoff, &call, &response, &mut history, &mut items, trace)
                    .await?;
                agent = handoff.agent().clone();
                continue;
            }

            for call in &response.tool_calls {
                items.push(RunItem::tool_call(agent.name(), call));
            }
            let by_name: HashMap<&str, Arc<dyn Tool>> =
                tools.iter().map(|t| (t.name(), t.clone())).collect();
            let responses = Self::execute_tools(&agent, &response.tool_calls, &by_name, config, &trace.run_id).await;

            let mut finalize_with = None;
            for (call, resp) in response.tool_calls.iter().zip(responses) {
                let text = ItemHelpers::tool_output_text(&resp.output, resp.error.as_deref());
                history.push(Message::tool(text, &call.id));
                items.push(RunItem::tool_output(&call.id, resp.output.clone(), resp.error.clone()));
                if let (Effect::Final(value), None) = (resp.effect, &finalize_with) {
                    finalize_with = Some(value);
                }
            }

            if let Some(final_output) = finalize_with {
                let final_output = match agent.output_schema() {
                    Some(schema) => match final_output {
                        Value::String(text) => schema.parse_text(&text)?,
                        value => {
                            schema.validate(&value)?;
                            value
                        }
                    },
                    None => final_output,
                };
                return Ok(Self::finish(agent, final_output, items, usage_stats, trace));
            }
        }
    }

    fn first_handoff<'a>(
        agent: &'a Agent,
        response: &'a ModelResponse,
    ) -> Option<(&'a ToolCall, &'a Handoff)> {
        response
            .tool_calls
            .iter()
            .find_map(|call| agent.find_handoff(&call.name).map(|h| (call, h)))
    }

    /// Take the handoff edge: validate the payload, run the callback and
    /// record the transfer. The first handoff call in a turn wins; the other
    /// calls of that turn are answered as skipped.
    async fn transfer(
        agent: &Agent,
        handoff: &Handoff,
        call: &ToolCall,
        response: &ModelResponse,
        history: &mut Vec<Message>,
        items: &mut Vec<RunItem>,
        trace: &mut RunTrace,
    ) -> Result<()> {
        items.push(RunItem::tool_call(agent.name(), call));
        let payload = handoff.validate_payload(&call.arguments)?;

        trace.enter(RunState::Transferring {
            from: agent.name().to_string(),
            to: handoff.name.clone(),
        });
        info!(from = %agent.name(), to = %handoff.name, "handoff");

        handoff
            .invoke(HandoffContext {
                from_agent: agent.name().to_string(),
                to_agent: handoff.name.clone(),
                run_id: trace.run_id.clone(),
                input: payload.clone(),
            })
            .await
            .map_err(|e| match e {
                AgentsError::SchemaValidation { .. } | AgentsError::HandoffError { .. } => e,
                other => AgentsError::HandoffError {
                    message: format!("callback for '{}' failed: {}", handoff.name, other),
                },
            })?;

        items.push(RunItem::handoff(agent.name(), &handoff.name, payload));
        let ack = handoff.acknowledgement();
        history.push(Message::tool(ack.to_string(), &call.id));
        items.push(RunItem::tool_output(&call.id, ack, None));

        for other in response.tool_calls.iter().filter(|c| c.id != call.id) {
            let reason = format!("Skipped '{}': control was transferred to {}", other.name, handoff.name);
            history.push(Message::tool(format!("Error: {}", reason), &other.id));
            items.push(RunItem::tool_output(&other.id, Value::Null, Some(reason)));
        }

        trace.enter(RunState::Running {
            agent: handoff.name.clone(),
        });
        Ok(())
    }

    /// Run every call of one turn, returning responses in call order.
    async fn execute_tools(
        agent: &Agent,
        calls: &[ToolCall],
        tools: &HashMap<&str, Arc<dyn Tool>>,
        config: &RunConfig,
        run_id: &str,
    ) -> Vec<ToolResponse> {
        let requests: Vec<(Option<Arc<dyn Tool>>, ToolRequest)> = calls
            .iter()
            .map(|call| {
                let req = ToolRequest {
                    run_id: run_id.to_string(),
                    agent: agent.name().to_string(),
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                };
                (tools.get(call.name.as_str()).cloned(), req)
            })
            .collect();

        let timeout = config.tool_timeout;
        let dispatch = |tool: Option<Arc<dyn Tool>>, req: ToolRequest| async move {
            match tool {
                Some(tool) => call_tool(tool, timeout, req).await,
                None => ToolResponse::error(format!("Unknown tool '{}'", req.tool_name)),
            }
        };

        if !config.parallel_tools {
            let mut out = Vec::with_capacity(requests.len());
            for (tool, req) in requests {
                out.push(dispatch(tool, req).await);
            }
            return out;
        }

        let semaphore = config.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        join_all(requests.into_iter().map(|(tool, req)| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = match semaphore {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(e) => return ToolResponse::error(e.to_string()),
                    },
                    None => None,
                };
                dispatch(tool, req).await
            }
        }))
        .await
    }

    fn finish(
        agent: Agent,
        final_output: Value,
        items: Vec<RunItem>,
        usage: UsageStats,
        trace: &mut RunTrace,
    ) -> RunResult {
        trace.enter(RunState::Completed);
        RunResult {
            final_output,
            items,
            last_agent: agent.name().to_string(),
            usage,
            trace_id: trace.run_id.clone(),
            transitions: trace.transitions.clone(),
        }
    }
}
