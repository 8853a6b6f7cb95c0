//! # apprise-agents
//!
//! LLM agents for the Apprise Marketplace assistants: instructions, tools,
//! typed outputs and handoffs between specialist agents, plus the external
//! pieces those agents reach for (SendGrid mail, the marketplace database,
//! MCP servers over stdio, and a voice loop).
//!
//! ## Core Concepts
//!
//! - **Agent**: instructions, tools, handoffs and an optional output schema
//! - **Tools**: async functions the model can call; typed arguments get their
//!   JSON schema from `schemars`
//! - **Handoffs**: `transfer_to_<agent>` tools that move control, optionally
//!   carrying a validated payload
//! - **Runner**: drives the conversation as a state machine
//!   (`Idle -> Running -> Transferring -> Running -> Completed`) and reports
//!   every transition to an observer
//!
//! ## Getting Started
//!
//! Set your OpenAI API key in the `OPENAI_API_KEY` environment variable.
//!
//! ```rust,no_run
//! use apprise_agents::{Agent, Handoff, RunConfig, Runner};
//!
//! # async fn example() -> apprise_agents::Result<()> {
//! let billing = Agent::simple(
//!     "Billing Agent",
//!     "You are a billing specialist who helps customers with payment issues.",
//! );
//! let triage = Agent::simple(
//!     "Customer Service",
//!     "Direct customers to the right specialist.",
//! )
//! .with_handoff(Handoff::to(billing))
//! .build()?;
//!
//! let result = Runner::run(
//!     triage,
//!     "I was charged twice for my subscription last month.",
//!     RunConfig::default(),
//! )
//! .await?;
//! println!("{}: {}", result.last_agent, result.final_text());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod handoff;
pub mod items;
pub mod mail;
pub mod marketplace;
pub mod mcp;
pub mod model;
pub mod output;
pub mod prompt;
pub mod result;
pub mod runner;
pub mod schemas;
pub mod service;
pub mod tool;
pub mod usage;
pub mod voice;

// Public re-exports for convenience
pub use agent::{Agent, AgentConfig};
pub use error::{AgentsError, Result};
pub use handoff::{Handoff, HandoffContext};
pub use mail::{MailStatus, Mailer, SendEmailTool};
pub use mcp::{McpServerParams, McpServerStdio};
pub use model::{ModelProvider, OpenAIProvider, ScriptedProvider};
pub use output::OutputSchema;
pub use result::RunResult;
pub use runner::{RunConfig, RunObserver, RunState, Runner, Transition, TransitionLog};
pub use tool::{typed_tool, FunctionTool, Tool, ToolResult, TypedFunctionTool};
