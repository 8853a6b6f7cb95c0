//! A single agent with no tools answering one request.

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::{Agent, Runner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let agent = Agent::simple(
        "Test Agent",
        "You are a helpful agent that responds in a concise manner",
    )
    .with_model(settings.default_model.clone())
    .build()?;

    let result = Runner::run(agent, "Hello! Are you working correctly", settings.run_config()).await?;
    println!("{}", result.final_text());
    Ok(())
}
