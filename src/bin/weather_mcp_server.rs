//! A small MCP server on stdio offering `get_weather` and `add_numbers`.
//!
//! Stdout carries the protocol, so logs go to stderr.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

const WEATHER_ENDPOINT: &str = "https://wttr.in";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct WeatherArgs {
    /// City to report on, e.g. "London".
    city: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AddArgs {
    a: i64,
    b: i64,
}

#[derive(Clone)]
struct WeatherServer {
    http: reqwest::Client,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl WeatherServer {
    fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Fetches the current weather for the specified city.")]
    async fn get_weather(
        &self,
        Parameters(WeatherArgs { city }): Parameters<WeatherArgs>,
    ) -> Result<CallToolResult, McpError> {
        let url = format!("{WEATHER_ENDPOINT}/{}?format=3", city.trim());
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%city, error = %e, "weather lookup failed");
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Weather lookup failed: {e}"
                ))]));
            }
        };
        match response.text().await {
            Ok(body) => Ok(CallToolResult::success(vec![Content::text(body)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Weather lookup failed: {e}"
            ))])),
        }
    }

    #[tool(description = "Adds two numbers together.")]
    async fn add_numbers(
        &self,
        Parameters(AddArgs { a, b }): Parameters<AddArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text((a + b).to_string())]))
    }
}

#[tool_handler]
impl ServerHandler for WeatherServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.instructions = Some("Weather Server: current weather by city, and addition.".into());
        info
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let service = WeatherServer::new().serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
