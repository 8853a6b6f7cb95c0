//! # Agent handoffs
//!
//! A handoff is a directed edge from one agent to a specialist. It is
//! advertised to the model as a tool named `transfer_to_<agent>`; when the
//! model calls it, the runner switches the active agent instead of executing
//! anything.
//!
//! An edge may declare a structured payload. The payload schema becomes the
//! tool's parameter schema, the runner validates the model's arguments
//! against it before transferring, and the edge's callback receives the
//! decoded value.
//!
//! ```rust
//! use apprise_agents::{Agent, Handoff};
//! use apprise_agents::schemas::EscalationData;
//!
//! let escalation = Agent::simple("Escalation Agent", "You handle escalated issues.");
//! let edge = Handoff::to(escalation).on_handoff(|ctx, data: EscalationData| async move {
//!     tracing::info!(from = %ctx.from_agent, reason = %data.reason, "escalated");
//!     Ok(())
//! });
//!
//! assert_eq!(edge.tool_name, "transfer_to_escalation_agent");
//! assert!(edge.validate_payload(&serde_json::json!({"priority": "High"})).is_err());
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::agent::Agent;
use crate::error::{AgentsError, Result};
use crate::output::OutputSchema;
use crate::tool::{Tool, ToolResult};

/// What a handoff callback gets to see.
#[derive(Debug, Clone)]
pub struct HandoffContext {
    pub from_agent: String,
    pub to_agent: String,
    pub run_id: String,
    /// The validated payload, or `None` for edges without one.
    pub input: Option<Value>,
}

type HandoffCallback = Arc<dyn Fn(HandoffContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A potential transfer of control to another agent.
#[derive(Clone)]
pub struct Handoff {
    /// Name of the target agent.
    pub name: String,
    /// Name of the tool the model calls to take this edge.
    pub tool_name: String,
    /// Shown to the routing agent to decide when the edge applies.
    pub description: String,
    pub agent: Arc<Agent>,
    input_schema: Option<OutputSchema>,
    callback: Option<HandoffCallback>,
}

/// `"Billing Agent"` becomes `"billing_agent"`.
pub(crate) fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

impl Handoff {
    /// An edge to `agent`, described by its `handoff_description`.
    pub fn to(agent: Agent) -> Self {
        let description = agent
            .config
            .handoff_description
            .clone()
            .unwrap_or_else(|| {
                format!("Handoff to the {} agent to handle the request.", agent.name())
            });
        Self::new(agent, description)
    }

    /// An edge to `agent` with an explicit description.
    pub fn new(agent: Agent, description: impl Into<String>) -> Self {
        let name = agent.name().to_string();
        Self {
            tool_name: format!("transfer_to_{}", snake_case(&name)),
            name,
            description: description.into(),
            agent: Arc::new(agent),
            input_schema: None,
            callback: None,
        }
    }

    /// Override the tool name the model sees.
    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = tool_name.into();
        self
    }

    /// Require a payload shaped like `T` without registering a callback.
    pub fn with_input<T: JsonSchema>(mut self) -> Self {
        self.input_schema = Some(OutputSchema::of::<T>());
        self
    }

    /// Register a typed callback. Declares `T` as the edge's payload.
    pub fn on_handoff<T, F, Fut>(mut self, callback: F) -> Self
    where
        T: DeserializeOwned + JsonSchema + Send + 'static,
        F: Fn(HandoffContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let schema = OutputSchema::of::<T>();
        let schema_name = schema.name().to_string();
        let callback = Arc::new(callback);
        self.input_schema = Some(schema);
        self.callback = Some(Arc::new(move |ctx: HandoffContext| -> BoxFuture<'static, Result<()>> {
            let callback = callback.clone();
            let schema_name = schema_name.clone();
            Box::pin(async move {
                let raw = ctx.input.clone().unwrap_or(Value::Null);
                let payload: T = serde_json::from_value(raw)
                    .map_err(|e| AgentsError::schema(schema_name, e.to_string()))?;
                callback(ctx, payload).await
            })
        }));
        self
    }

    /// Register a callback that ignores any payload.
    pub fn on_transfer<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(HandoffContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let callback = Arc::new(callback);
        self.callback = Some(Arc::new(move |ctx: HandoffContext| -> BoxFuture<'static, Result<()>> {
            let callback = callback.clone();
            Box::pin(async move { callback(ctx).await })
        }));
        self
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn input_schema(&self) -> Option<&OutputSchema> {
        self.input_schema.as_ref()
    }

    /// Check the model's arguments against the declared payload schema.
    ///
    /// Returns the payload to carry across the edge: `None` when the edge
    /// declares no input.
    pub fn validate_payload(&self, arguments: &Value) -> Result<Option<Value>> {
        let Some(schema) = &self.input_schema else {
            return Ok(None);
        };
        let payload = match arguments {
            Value::String(text) => schema.parse_text(text)?,
            other => {
                schema.validate(other)?;
                other.clone()
            }
        };
        Ok(Some(payload))
    }

    /// The tool output recorded when this edge is taken.
    pub fn acknowledgement(&self) -> Value {
        serde_json::json!({ "assistant": self.name })
    }

    /// Run the registered callback, if any.
    pub async fn invoke(&self, ctx: HandoffContext) -> Result<()> {
        match &self.callback {
            Some(callback) => callback(ctx).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Handoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("name", &self.name)
            .field("tool_name", &self.tool_name)
            .field("description", &self.description)
            .field("input", &self.input_schema.as_ref().map(|s| s.name()))
            .finish()
    }
}

/// Adapter to expose a handoff as a Tool to the model provider.
///
/// Inside a run the runner takes the edge itself and never calls
/// [`Tool::execute`]. Called directly, `execute` only returns the
/// [`Handoff::acknowledgement`]; it transfers nothing and skips the callback.
#[derive(Clone, Debug)]
pub struct HandoffTool {
    handoff: Handoff,
}

impl From<Handoff> for HandoffTool {
    fn from(h: Handoff) -> Self {
        Self { handoff: h }
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        &self.handoff.tool_name
    }

    fn description(&self) -> &str {
        &self.handoff.description
    }

    fn parameters_schema(&self) -> Value {
        match &self.handoff.input_schema {
            Some(schema) => schema.schema().clone(),
            None => serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    async fn execute(&self, _arguments: Value) -> Result<ToolResult> {
        Ok(ToolResult::success(self.handoff.acknowledgement()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::EscalationData;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn ctx(input: Option<Value>) -> HandoffContext {
        HandoffContext {
            from_agent: "Service Agent".to_string(),
            to_agent: "Escalation Agent".to_string(),
            run_id: "run_1".to_string(),
            input,
        }
    }

    #[test]
    fn test_tool_name_and_description() {
        let billing = Agent::simple("Billing Agent", "Handles billing.")
            .with_handoff_description("Specialist agent for billing inquiries");
        let handoff = Handoff::to(billing);
        assert_eq!(handoff.name, "Billing Agent");
        assert_eq!(handoff.tool_name, "transfer_to_billing_agent");
        assert_eq!(handoff.description, "Specialist agent for billing inquiries");

        let plain = Handoff::to(Agent::simple("Technical Agent", "Fixes things."));
        assert_eq!(
            plain.description,
            "Handoff to the Technical Agent agent to handle the request."
        );
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("Business Information Agent"), "business_information_agent");
        assert_eq!(snake_case("  EmailAssistant "), "emailassistant");
        assert_eq!(snake_case("Billing -- Agent"), "billing_agent");
    }

    #[test]
    fn test_payload_missing_required_field_is_rejected() {
        let handoff = Handoff::to(Agent::simple("Escalation Agent", "x")).with_input::<EscalationData>();

        let err = handoff
            .validate_payload(&serde_json::json!({"priority": "High", "customer_tier": "Premium"}))
            .unwrap_err();
        assert!(matches!(err, AgentsError::SchemaValidation { .. }));

        let ok = handoff
            .validate_payload(&serde_json::json!({"reason": "cannot access premium features"}))
            .unwrap();
        assert_eq!(ok, Some(serde_json::json!({"reason": "cannot access premium features"})));
    }

    #[test]
    fn test_payload_as_json_text() {
        let handoff = Handoff::to(Agent::simple("Escalation Agent", "x")).with_input::<EscalationData>();
        let payload = handoff
            .validate_payload(&Value::String(r#"{"reason": "refund"}"#.to_string()))
            .unwrap();
        assert_eq!(payload.unwrap()["reason"], "refund");
    }

    #[test]
    fn test_edge_without_input_ignores_arguments() {
        let handoff = Handoff::to(Agent::simple("Billing Agent", "x"));
        assert_eq!(handoff.validate_payload(&serde_json::json!({"anything": 1})).unwrap(), None);
    }

    #[tokio::test]
    async fn test_typed_callback_receives_payload() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handoff = Handoff::to(Agent::simple("Escalation Agent", "x")).on_handoff(
            move |ctx, data: EscalationData| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push((ctx.from_agent, data.reason, data.priority));
                    Ok(())
                }
            },
        );

        assert!(handoff.input_schema().is_some());
        handoff
            .invoke(ctx(Some(serde_json::json!({"reason": "locked out", "priority": "High"}))))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[(
                "Service Agent".to_string(),
                "locked out".to_string(),
                Some("High".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_callback_error_propagates() {
        let handoff = Handoff::to(Agent::simple("Billing Agent", "x")).on_transfer(|_ctx| async {
            Err(AgentsError::HandoffError {
                message: "ledger offline".to_string(),
            })
        });
        let err = handoff.invoke(ctx(None)).await.unwrap_err();
        assert!(err.to_string().contains("ledger offline"));
    }

    #[test]
    fn test_handoff_tool_schema() {
        let with_input = HandoffTool::from(
            Handoff::to(Agent::simple("Escalation Agent", "x")).with_input::<EscalationData>(),
        );
        assert_eq!(with_input.name(), "transfer_to_escalation_agent");
        assert_eq!(with_input.parameters_schema()["required"], serde_json::json!(["reason"]));

        let without = HandoffTool::from(Handoff::to(Agent::simple("Billing Agent", "x")));
        assert_eq!(without.parameters_schema()["properties"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_handoff_tool_execute_only_acknowledges() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let handoff = Handoff::to(Agent::simple("Billing Agent", "x")).on_transfer(move |_ctx| {
            let counter = counter.clone();
            async move {
                *counter.lock().unwrap() += 1;
                Ok(())
            }
        });

        let result = HandoffTool::from(handoff).execute(serde_json::json!({})).await.unwrap();
        assert_eq!(result.output, serde_json::json!({"assistant": "Billing Agent"}));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_handoff_debug_format() {
        let handoff = Handoff::new(Agent::simple("Debug", "Debug agent"), "Debug description");
        let debug_str = format!("{:?}", handoff);
        assert!(debug_str.contains("transfer_to_debug"));
        assert!(!debug_str.contains("agent:"));
    }
}
