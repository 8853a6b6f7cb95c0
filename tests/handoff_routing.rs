//! End-to-end routing through the handoff graph with a scripted model.

use std::sync::{Arc, Mutex};

use apprise_agents::schemas::EscalationData;
use apprise_agents::{
    Agent, AgentsError, FunctionTool, Handoff, RunConfig, RunState, Runner, ScriptedProvider,
    Transition, TransitionLog,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn running(agent: &str) -> RunState {
    RunState::Running {
        agent: agent.to_string(),
    }
}

fn triage_graph(seen: Arc<Mutex<Vec<(String, String)>>>) -> Agent {
    let billing = Agent::simple(
        "Billing Agent",
        "You are a billing specialist who helps customers with payment issues.",
    );
    let technical = Agent::simple(
        "Technical Agent",
        "You are a technical support specialist who helps with product issues.",
    );
    let record = move |ctx: apprise_agents::HandoffContext| {
        let seen = seen.clone();
        async move {
            seen.lock().unwrap().push((ctx.from_agent, ctx.to_agent));
            Ok(())
        }
    };
    Agent::simple("Customer Service", "Direct customers to the right specialist.")
        .with_handoffs(vec![
            Handoff::to(billing).on_transfer(record.clone()),
            Handoff::to(technical).on_transfer(record),
        ])
        .build()
        .unwrap()
}

#[tokio::test]
async fn billing_inquiry_is_routed_to_billing() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_tool_call("transfer_to_billing_agent", json!({}))
            .with_message("I've refunded the duplicate charge."),
    );
    let log = Arc::new(TransitionLog::new());
    let config = RunConfig::default()
        .with_model_provider(provider.clone())
        .with_observer(log.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let result = Runner::run(
        triage_graph(seen.clone()),
        "I was charged twice for my subscription last month. Can I get a refund?",
        config,
    )
    .await
    .unwrap();

    assert_eq!(log.transfers(), vec!["Billing Agent".to_string()]);
    assert_eq!(
        seen.lock().unwrap().clone(),
        vec![("Customer Service".to_string(), "Billing Agent".to_string())]
    );
    assert_eq!(result.last_agent, "Billing Agent");
    assert_eq!(result.final_text(), "I've refunded the duplicate charge.");

    // The triage agent saw both handoff tools; the specialist saw none.
    let requests = provider.requests();
    assert_eq!(
        requests[0].tool_names,
        vec!["transfer_to_billing_agent", "transfer_to_technical_agent"]
    );
    assert_eq!(requests[1].agent, "Billing Agent");
    assert!(requests[1].tool_names.is_empty());
    assert!(requests[1].messages[0].content.contains("billing specialist"));
}

#[tokio::test]
async fn agent_without_tools_never_transfers() {
    let provider = Arc::new(ScriptedProvider::new().with_message("Yes, I'm working."));
    let log = Arc::new(TransitionLog::new());
    let config = RunConfig::default()
        .with_model_provider(provider)
        .with_observer(log.clone());

    let agent = Agent::simple(
        "Test Agent",
        "You are a helpful agent that responds in a concise manner",
    );
    let result = Runner::run(agent, "Hello! Are you working correctly", config)
        .await
        .unwrap();

    assert_eq!(
        log.transitions(),
        vec![
            Transition::new(RunState::Idle, running("Test Agent")),
            Transition::new(running("Test Agent"), RunState::Completed),
        ]
    );
    assert!(log.transfers().is_empty());
    assert_eq!(result.final_text(), "Yes, I'm working.");
}

#[tokio::test]
async fn escalation_without_reason_is_rejected_before_transfer() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_tool_call(
                "transfer_to_escalation_agent",
                json!({"priority": "High", "customer_tier": "Premium"}),
            )
            .with_message("unreachable"),
    );
    let log = Arc::new(TransitionLog::new());
    let config = RunConfig::default()
        .with_model_provider(provider)
        .with_observer(log.clone());

    let escalation = Agent::simple("Escalation Agent", "You handle escalated issues.");
    let service = Agent::simple("Service Agent", "Escalate complex issues.")
        .with_handoff(Handoff::to(escalation).with_input::<EscalationData>());

    let err = Runner::run(service, "I can't access Premium features", config)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentsError::SchemaValidation { .. }), "{err}");
    assert!(log.transfers().is_empty());
}

#[tokio::test]
async fn escalation_payload_reaches_callback() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_tool_call(
                "transfer_to_escalation_agent",
                json!({"reason": "Premium access missing", "priority": "High", "customer_tier": "Premium"}),
            )
            .with_message("I've restored your Premium access."),
    );
    let received = Arc::new(Mutex::new(None));
    let sink = received.clone();

    let escalation = Agent::simple("Escalation Agent", "You handle escalated issues.");
    let service = Agent::simple("Service Agent", "Escalate complex issues.").with_handoff(
        Handoff::to(escalation).on_handoff(move |_ctx, data: EscalationData| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = Some(data);
                Ok(())
            }
        }),
    );

    let result = Runner::run(
        service,
        "I can't access Premium features",
        RunConfig::default().with_model_provider(provider),
    )
    .await
    .unwrap();

    let data = received.lock().unwrap().clone().unwrap();
    assert_eq!(data.reason, "Premium access missing");
    assert_eq!(data.customer_tier.as_deref(), Some("Premium"));
    assert_eq!(result.agent_path(), vec!["Service Agent", "Escalation Agent"]);
}

#[test]
fn duplicate_tool_names_fail_construction() {
    let tool = || Arc::new(FunctionTool::no_args("get_time", "Now", || "noon".into()));
    let err = Agent::simple("Assistant", "x")
        .with_tool(tool())
        .with_tool(tool())
        .build()
        .unwrap_err();
    assert!(matches!(err, AgentsError::DuplicateTool { ref tool, .. } if tool == "get_time"));

    // A tool may not shadow a handoff either.
    let err = Agent::simple("Customer Service", "x")
        .with_tool(Arc::new(FunctionTool::no_args(
            "transfer_to_billing_agent",
            "Impostor",
            String::new,
        )))
        .with_handoff(Handoff::to(Agent::simple("Billing Agent", "x")))
        .build()
        .unwrap_err();
    assert!(matches!(err, AgentsError::DuplicateTool { .. }));
}
