//! A triage agent routing customers to billing or technical specialists.

use std::sync::Arc;

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::{Agent, Handoff, Runner, TransitionLog};

const BILLING_INQUIRY: &str =
    "I was charged twice for my subscription last month. Can I get a refund?";
#[allow(dead_code)]
const TECHNICAL_INQUIRY: &str = "The app keeps crashing when I try to upload photos. \
How can I fix this? Give me the shortest solution possible.";
#[allow(dead_code)]
const GENERAL_INQUIRY: &str = "What are your business hours?";

fn triage_agent(model: &str) -> apprise_agents::Result<Agent> {
    let billing = Agent::simple(
        "Billing Agent",
        "You are a billing specialist who helps customers with payment issues. \
Focus on resolving billing inquiries, subscription changes, and refund requests. \
If asked about technical problems or account settings, explain that you specialize \
in billing and payment matters only.",
    )
    .with_model(model);

    let technical = Agent::simple(
        "Technical Agent",
        "You are a technical support specialist who helps with product issues. \
Assist users with troubleshooting, error messages, and how-to questions. \
Focus on resolving technical problems only.",
    )
    .with_model(model);

    Agent::simple(
        "Customer Service",
        "You are the initial customer service contact who helps direct customers to the right specialist.

If the customer has billing or payment questions, hand off to the Billing Agent.
If the customer has technical problems or how-to questions, hand off to the Technical Agent.
For general inquiries or questions about products, you can answer directly.

Always be polite and helpful, and ensure a smooth transition when handing off to specialists.",
    )
    .with_model(model)
    .with_handoffs(vec![Handoff::to(billing), Handoff::to(technical)])
    .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let log = Arc::new(TransitionLog::new());
    let config = settings.run_config().with_observer(log.clone());
    let result = Runner::run(triage_agent(&settings.default_model)?, BILLING_INQUIRY, config).await?;

    for transfer in log.transfers() {
        println!("[handoff] {transfer}");
    }
    println!("{}: {}", result.last_agent, result.final_text());
    Ok(())
}
