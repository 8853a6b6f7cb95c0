//! An agent borrowing the tools of the `mcp-server-fetch` MCP server.

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::marketplace::time_tool;
use apprise_agents::{Agent, McpServerParams, McpServerStdio, Runner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let fetch = McpServerStdio::new("fetch", McpServerParams::new("uvx").arg("mcp-server-fetch"))
        .with_cache_tools_list(true);

    let output = fetch
        .scoped(|server| async move {
            let agent = Agent::simple(
                "Assistant",
                "You are a helpful assistant for our staff within the business",
            )
            .with_model(settings.default_model.clone())
            .with_mcp_server(server)
            .with_tool(time_tool())
            .build()?;

            let result = Runner::run(
                agent,
                "Please get the content of docs.replit.com/updates and summarize them. \
Return the summary as well as the time you got the content.",
                settings.run_config(),
            )
            .await?;
            Ok(result.final_text())
        })
        .await?;

    println!("{output}");
    Ok(())
}
