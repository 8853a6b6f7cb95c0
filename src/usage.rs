//! # Token accounting
//!
//! [`Usage`] is what one model call cost; [`UsageStats`] is the running total
//! of a whole run, broken down by model and by agent. After a triage run the
//! per-agent breakdown shows how much the router spent versus the specialist
//! that answered.
//!
//! ```rust
//! use apprise_agents::usage::{Usage, UsageStats};
//!
//! let mut stats = UsageStats::new();
//! stats.record("gpt-4.1-mini", "Customer Service", Usage::new(420, 12));
//! stats.record("gpt-4.1-mini", "Billing Agent", Usage::new(510, 96));
//!
//! assert_eq!(stats.total.total_tokens, 1038);
//! assert_eq!(stats.by_agent["Billing Agent"].request_count, 1);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Add;

/// Token usage for a single model call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
    /// Number of model calls folded into this value.
    pub request_count: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            request_count: 1,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_usage(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.request_count += other.request_count;
    }

    /// Rough dollar cost, using list prices per million tokens.
    pub fn estimate_cost(&self, model: &str) -> f64 {
        let (input, output) = match model {
            m if m.starts_with("gpt-4.1-nano") => (0.10, 0.40),
            m if m.starts_with("gpt-4.1-mini") => (0.40, 1.60),
            m if m.starts_with("gpt-4.1") => (2.00, 8.00),
            m if m.starts_with("gpt-4o-mini") => (0.15, 0.60),
            m if m.starts_with("gpt-4o") => (2.50, 10.00),
            _ => (1.00, 1.00),
        };
        (self.prompt_tokens as f64 * input + self.completion_tokens as f64 * output) / 1_000_000.0
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self.add_usage(&other);
        self
    }
}

/// Usage aggregated across a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub total: Usage,
    pub by_model: HashMap<String, Usage>,
    pub by_agent: HashMap<String, Usage>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one call's usage into the totals.
    pub fn record(&mut self, model: &str, agent: &str, usage: Usage) {
        self.total.add_usage(&usage);
        self.by_model
            .entry(model.to_string())
            .or_default()
            .add_usage(&usage);
        self.by_agent
            .entry(agent.to_string())
            .or_default()
            .add_usage(&usage);
    }

    pub fn total_cost(&self) -> f64 {
        self.by_model
            .iter()
            .map(|(model, usage)| usage.estimate_cost(model))
            .sum()
    }

    /// One line per agent, sorted by name, after a total line.
    pub fn summary(&self) -> String {
        let mut report = format!(
            "{} tokens over {} requests (~${:.4})\n",
            self.total.total_tokens,
            self.total.request_count,
            self.total_cost()
        );
        let mut agents: Vec<_> = self.by_agent.iter().collect();
        agents.sort_by(|a, b| a.0.cmp(b.0));
        for (agent, usage) in agents {
            report.push_str(&format!(
                "  {}: {} tokens, {} requests\n",
                agent, usage.total_tokens, usage.request_count
            ));
        }
        report
    }
}
