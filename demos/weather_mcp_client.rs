//! Connects to the bundled weather MCP server, lists its tools and lets an
//! assistant answer with them.

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::{Agent, McpServerParams, McpServerStdio, Runner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let params = McpServerParams::new("cargo").args(["run", "--quiet", "--bin", "weather_mcp_server"]);
    let weather = McpServerStdio::new("Weather Server", params).with_cache_tools_list(true);

    let output = weather
        .scoped(|server| async move {
            for tool in server.list_tools().await? {
                println!("Tool Name: {}", tool.name);
            }

            let agent = Agent::simple(
                "Assistant",
                "You are a helpful assistant and use tools to help the user.",
            )
            .with_model(settings.default_model.clone())
            .with_mcp_server(server)
            .build()?;

            let result = Runner::run(
                agent,
                "What's the weather like today in London?",
                settings.run_config(),
            )
            .await?;
            Ok(result.final_text())
        })
        .await?;

    println!("{output}");
    Ok(())
}
