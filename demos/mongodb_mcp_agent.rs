//! Queries the marketplace MongoDB through the prebuilt `mongodb-mcp-server`.
//! The connection string comes from `MONGO_URI` and reaches the server
//! through its environment.

use apprise_agents::config::{init_tracing, Settings};
use apprise_agents::{Agent, McpServerParams, McpServerStdio, Runner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let settings = Settings::from_env();
    settings.openai_api_key()?;

    let params = McpServerParams::new("npx")
        .args(["-y", "mongodb-mcp-server"])
        .env("MDB_MCP_CONNECTION_STRING", settings.mongo_uri()?);
    let mongo = McpServerStdio::new("MongoDB Server", params).with_cache_tools_list(true);

    let output = mongo
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
                "In the AppriseMarketplaceDatabase users collection, find the user with the email \
'host@apprisemarketplace.com', then find the bookings made under that account in the bookings \
collection. Return the results in an easy to read format.",
                settings.run_config(),
            )
            .await?;
            Ok(result.final_text())
        })
        .await?;

    println!("{output}");
    Ok(())
}
