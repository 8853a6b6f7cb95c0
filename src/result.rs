//! Result types for agent execution

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::items::RunItem;
use crate::runner::{RunState, Transition};
use crate::usage::UsageStats;

/// The result of a completed run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The final answer: a JSON string for plain text, or the validated
    /// structured value when the answering agent declares an output type.
    pub final_output: Value,
    /// Every step taken, in order, across all agents.
    pub items: Vec<RunItem>,
    /// Name of the agent that produced the final output.
    pub last_agent: String,
    pub usage: UsageStats,
    /// Identifier of this run; also passed to handoff callbacks as `run_id`.
    pub trace_id: String,
    /// Every state change, starting with `Idle -> Running`.
    pub transitions: Vec<Transition>,
}

impl RunResult {
    /// Decode the final output as `T`.
    pub fn final_output_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.final_output.clone())?)
    }

    /// The final output as text: the string itself, or compact JSON.
    pub fn final_text(&self) -> String {
        match &self.final_output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Agents that were active during the run, in the order they took over.
    pub fn agent_path(&self) -> Vec<&str> {
        self.transitions
            .iter()
            .filter_map(|t| match &t.to {
                RunState::Running { agent } => Some(agent.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether control ever moved between agents.
    pub fn transferred(&self) -> bool {
        self.transitions
            .iter()
            .any(|t| matches!(t.to, RunState::Transferring { .. }))
    }
}
