//! Structured payloads exchanged with agents.
//!
//! These types are both handoff payloads and agent output types. Each derives
//! `JsonSchema` so it can be advertised to the model and validated on return.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Data passed when a service agent escalates to a human-facing specialist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EscalationData {
    /// Why the conversation is being escalated.
    pub reason: String,
    /// Low, Normal, High or Urgent.
    pub priority: Option<String>,
    /// Standard, Premium or VIP, when the customer mentioned it.
    pub customer_tier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Person {
    pub name: String,
    pub role: Option<String>,
    pub contact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Meeting {
    pub date: String,
    pub time: String,
    pub location: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    pub description: String,
    pub assignee: Option<String>,
    pub deadline: Option<String>,
    pub priority: Option<String>,
}

/// Everything worth keeping from a work email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EmailData {
    pub subject: String,
    pub sender: Person,
    pub recipients: Vec<Person>,
    pub main_points: Vec<String>,
    pub meetings: Vec<Meeting>,
    pub tasks: Vec<Task>,
    pub next_steps: Option<String>,
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

impl EmailData {
    /// Plain-text digest: subject, sender, main points, meetings and tasks.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Subject: {}", self.subject);
        let _ = writeln!(out, "From: {} ({})", self.sender.name, or_none(&self.sender.role));

        out.push_str("\nMain points:\n");
        for point in &self.main_points {
            let _ = writeln!(out, "- {}", point);
        }

        out.push_str("\nMeetings:\n");
        for meeting in &self.meetings {
            let _ = writeln!(
                out,
                "- {} at {}, Location: {}",
                meeting.date,
                meeting.time,
                or_none(&meeting.location)
            );
        }

        out.push_str("\nTasks:\n");
        for task in &self.tasks {
            let _ = writeln!(out, "- {}", task.description);
            let _ = writeln!(
                out,
                "  Assignee: {}, Deadline: {}, Priority: {}",
                or_none(&task.assignee),
                or_none(&task.deadline),
                or_none(&task.priority)
            );
        }
        out
    }
}

/// An email the agent intends to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OutgoingEmail {
    pub to_emails: Vec<String>,
    pub subject: String,
    pub plain_text_body: String,
    #[serde(default)]
    pub html_body: Option<String>,
}
