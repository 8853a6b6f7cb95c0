//! A service agent escalating with a structured payload.

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::schemas::EscalationData;
use apprise_agents::{Agent, Handoff, Runner};

const INQUIRY: &str = "Hi, I am a Premium user, but I am unable to gain access to the Premium \
account features. Please can you grant me access or explain how I can fix the issue";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let escalation = Agent::simple(
        "Escalation Agent",
        "You handle complex or sensitive customer issues that require special attention. \
Always address the customer's concerns with extra care and detail.",
    )
    .with_model(settings.default_model.clone());

    let edge = Handoff::to(escalation).on_handoff(|_ctx, data: EscalationData| async move {
        println!("[ESCALATION] Reason: {}", data.reason);
        println!("[ESCALATION] Priority: {}", data.priority.as_deref().unwrap_or("None"));
        println!(
            "[ESCALATION] Customer tier: {}",
            data.customer_tier.as_deref().unwrap_or("None")
        );
        Ok(())
    });

    let service = Agent::simple(
        "Service Agent",
        "You are a customer service agent who handles general inquiries.
For complex issues, escalate to the Escalation Agent and provide:
- The reason for escalation
- Priority level (Low, Normal, High, Urgent)
- Customer tier if mentioned (Standard, Premium, VIP)",
    )
    .with_model(settings.default_model.clone())
    .with_handoff(edge)
    .build()?;

    let result = Runner::run(service, INQUIRY, settings.run_config()).await?;
    println!("{}", result.final_text());
    Ok(())
}
