//! MCP servers over stdio.
//!
//! An [`McpServerStdio`] owns one child process that speaks the Model
//! Context Protocol on its stdin/stdout. Once connected, its tools are
//! offered to any agent that declares the server, through [`McpTool`].
//!
//! The child is a scoped resource. [`McpServerStdio::scoped`] connects,
//! runs the body and always cleans up, whether the body succeeded or not.
//! Dropping a connected server also terminates the child, since the
//! process is spawned with `kill_on_drop`.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use apprise_agents::mcp::{McpServerParams, McpServerStdio};
//! use apprise_agents::{Agent, Runner, runner::RunConfig};
//!
//! # async fn demo() -> apprise_agents::Result<()> {
//! let fetch = McpServerStdio::new("fetch", McpServerParams::new("uvx").arg("mcp-server-fetch"));
//! let answer = fetch
//!     .scoped(|server| async move {
//!         let agent = Agent::simple("Researcher", "Use the fetch tool to read pages.")
//!             .with_mcp_server(server)
//!             .build()?;
//!         Runner::run(agent, "Summarize https://www.rust-lang.org", RunConfig::default()).await
//!     })
//!     .await?;
//! println!("{}", answer.final_text());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, RawContent},
    service::{Peer, RoleClient, RunningService},
    transport::TokioChildProcess,
    ServiceExt,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::error::{AgentsError, Result};
use crate::tool::{Tool, ToolResult};

/// How to launch an MCP server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpServerParams {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl McpServerParams {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args).envs(&self.env).kill_on_drop(true);
        cmd
    }
}

/// A tool as an MCP server describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl McpToolInfo {
    fn from_mcp(tool: &rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool
                .description
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default(),
            input_schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}

struct Connection {
    service: RunningService<RoleClient, ()>,
    peer: Peer<RoleClient>,
}

/// One MCP server reached through a child process.
pub struct McpServerStdio {
    name: String,
    params: McpServerParams,
    cache_tools_list: bool,
    connection: Mutex<Option<Connection>>,
    tools_cache: Mutex<Option<Vec<McpToolInfo>>>,
}

impl std::fmt::Debug for McpServerStdio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServerStdio")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("cache_tools_list", &self.cache_tools_list)
            .finish()
    }
}

impl McpServerStdio {
    pub fn new(name: impl Into<String>, params: McpServerParams) -> Self {
        Self {
            name: name.into(),
            params,
            cache_tools_list: false,
            connection: Mutex::new(None),
            tools_cache: Mutex::new(None),
        }
    }

    /// Keep the first tool listing instead of asking the server every turn.
    pub fn with_cache_tools_list(mut self, enabled: bool) -> Self {
        self.cache_tools_list = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &McpServerParams {
        &self.params
    }

    fn error(&self, message: impl std::fmt::Display) -> AgentsError {
        AgentsError::Mcp {
            server: self.name.clone(),
            message: message.to_string(),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Spawn the child and perform the MCP handshake. Connecting an already
    /// connected server does nothing.
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        let transport = TokioChildProcess::new(self.params.command())
            .map_err(|e| self.error(format!("failed to spawn '{}': {}", self.params.command, e)))?;
        let service: RunningService<RoleClient, ()> = ()
            .serve(transport)
            .await
            .map_err(|e| self.error(format!("handshake failed: {}", e)))?;
        let peer = service.peer().clone();
        *slot = Some(Connection { service, peer });
        tracing::info!(server = %self.name, command = %self.params.command, "MCP server connected");
        Ok(())
    }

    /// Terminate the child. Safe to call when not connected.
    pub async fn cleanup(&self) -> Result<()> {
        let connection = self.connection.lock().await.take();
        *self.tools_cache.lock().await = None;
        if let Some(connection) = connection {
            connection
                .service
                .cancel()
                .await
                .map_err(|e| self.error(format!("shutdown failed: {}", e)))?;
            tracing::info!(server = %self.name, "MCP server stopped");
        }
        Ok(())
    }

    async fn peer(&self) -> Result<Peer<RoleClient>> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.peer.clone())
            .ok_or_else(|| self.error("not connected; call connect() first"))
    }

    /// Tools the server offers.
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>> {
        if self.cache_tools_list {
            if let Some(cached) = self.tools_cache.lock().await.as_ref() {
                return Ok(cached.clone());
            }
        }
        let peer = self.peer().await?;
        let tools: Vec<McpToolInfo> = peer
            .list_all_tools()
            .await
            .map_err(|e| self.error(format!("list_tools failed: {}", e)))?
            .iter()
            .map(McpToolInfo::from_mcp)
            .collect();
        if self.cache_tools_list {
            *self.tools_cache.lock().await = Some(tools.clone());
        }
        Ok(tools)
    }

    /// Invoke a tool on the server. Errors reported by the tool itself come
    /// back as an error [`ToolResult`]; protocol failures are `Err`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult> {
        let arguments = match arguments {
            Value::Null => None,
            Value::Object(map) => Some(map),
            other => {
                return Ok(ToolResult::error(
                    AgentsError::MalformedToolArguments {
                        tool: name.to_string(),
                        message: format!("expected a JSON object, got {}", other),
                    }
                    .to_string(),
                ))
            }
        };
        let peer = self.peer().await?;
        let result = peer
            .call_tool({
                let mut params = CallToolRequestParams::new(name.to_string());
                params.arguments = arguments;
                params
            })
            .await
            .map_err(|e| self.error(format!("call to '{}' failed: {}", name, e)))?;

        let text = extract_text(&result.content);
        if result.is_error == Some(true) {
            Ok(ToolResult::error(text))
        } else {
            Ok(ToolResult::success(Value::String(text)))
        }
    }

    /// The server's tools as agent tools.
    pub async fn agent_tools(self: &Arc<Self>) -> Result<Vec<Arc<dyn Tool>>> {
        Ok(self
            .list_tools()
            .await?
            .into_iter()
            .map(|info| {
                Arc::new(McpTool {
                    server: self.clone(),
                    info,
                }) as Arc<dyn Tool>
            })
            .collect())
    }

    /// Connect, run `body`, then clean up on every exit path.
    pub async fn scoped<F, Fut, T>(self, body: F) -> Result<T>
    where
        F: FnOnce(Arc<Self>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let server = Arc::new(self);
        server.connect().await?;
        let outcome = body(server.clone()).await;
        let cleanup = server.cleanup().await;
        match (outcome, cleanup) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    tracing::warn!(server = %server.name, error = %cleanup_err, "cleanup after failure");
                }
                Err(e)
            }
        }
    }
}

fn extract_text(content: &[rmcp::model::Content]) -> String {
    content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One MCP tool exposed through the [`Tool`] trait.
#[derive(Debug, Clone)]
pub struct McpTool {
    server: Arc<McpServerStdio>,
    info: McpToolInfo,
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn parameters_schema(&self) -> Value {
        self.info.input_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        self.server.call_tool(&self.info.name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_params_builder() {
        let params = McpServerParams::new("uvx")
            .arg("mcp-server-fetch")
            .args(["--ignore-robots-txt"])
            .env("LOG_LEVEL", "debug");
        assert_eq!(params.command, "uvx");
        assert_eq!(params.args, vec!["mcp-server-fetch", "--ignore-robots-txt"]);
        assert_eq!(params.env.get("LOG_LEVEL").map(String::as_str), Some("debug"));
    }

    #[test]
    fn test_tool_info_from_mcp() {
        let tool: rmcp::model::Tool = serde_json::from_value(serde_json::json!({
            "name": "fetch",
            "description": "Fetches a URL from the internet",
            "inputSchema": {"type": "object", "properties": {"url": {"type": "string"}}, "required": ["url"]}
        }))
        .unwrap();
        let info = McpToolInfo::from_mcp(&tool);
        assert_eq!(info.name, "fetch");
        assert_eq!(info.description, "Fetches a URL from the internet");
        assert_eq!(info.input_schema["required"], serde_json::json!(["url"]));
    }

    #[test]
    fn test_extract_text_joins_text_parts() {
        let content = vec![
            rmcp::model::Content::text("first"),
            rmcp::model::Content::text("second"),
        ];
        assert_eq!(extract_text(&content), "first\nsecond");
    }

    #[tokio::test]
    async fn test_list_tools_requires_connection() {
        let server = McpServerStdio::new("weather", McpServerParams::new("weather-server"));
        assert!(!server.is_connected().await);
        let err = server.list_tools().await.unwrap_err();
        assert!(matches!(err, AgentsError::Mcp { ref server, .. } if server == "weather"));
        server.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_to_missing_binary_fails() {
        let server = McpServerStdio::new(
            "ghost",
            McpServerParams::new("apprise-agents-no-such-mcp-binary"),
        );
        let err = server.connect().await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"), "{}", err);
        assert!(!server.is_connected().await);
    }

    #[tokio::test]
    async fn test_scoped_skips_body_when_connect_fails() {
        let server = McpServerStdio::new(
            "ghost",
            McpServerParams::new("apprise-agents-no-such-mcp-binary"),
        );
        let mut ran = false;
        let result = server
            .scoped(|_server| {
                ran = true;
                async { Ok(()) }
            })
            .await;
        assert!(result.is_err());
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_child_that_exits_never_connects() {
        let server = McpServerStdio::new("quitter", McpServerParams::new("sh").args(["-c", "exit 0"]));
        let outcome = tokio::time::timeout(Duration::from_secs(10), server.connect()).await;
        assert!(!matches!(outcome, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_non_object_arguments_are_malformed() {
        let server = McpServerStdio::new("fetch", McpServerParams::new("uvx"));
        let result = server.call_tool("fetch", serde_json::json!([1, 2])).await.unwrap();
        assert!(result.error.unwrap().starts_with("Malformed arguments for tool 'fetch'"));
    }
}
