//! Shared prompt text for agents that take part in handoffs.

/// Explains the handoff mechanism to the model. Prepend it to the
/// instructions of every agent in a handoff graph.
pub const RECOMMENDED_PROMPT_PREFIX: &str = "# System context
You are part of a multi-agent system designed to make agent coordination and execution easy. \
It uses two primary abstractions: **Agents** and **Handoffs**. An agent encompasses instructions \
and tools and can hand off a conversation to another agent when appropriate. Handoffs are achieved \
by calling a handoff function, generally named `transfer_to_<agent_name>`. Transfers between agents \
are handled seamlessly in the background; do not mention or draw attention to these transfers in \
your conversation with the user.
";

/// `instructions` with [`RECOMMENDED_PROMPT_PREFIX`] in front.
pub fn prompt_with_handoff_instructions(instructions: &str) -> String {
    format!("{RECOMMENDED_PROMPT_PREFIX}\n{instructions}")
}
