//! MCP over stdio against the bundled weather server binary.

use std::sync::Arc;
use std::time::Duration;

use apprise_agents::items::Role;
use apprise_agents::{
    Agent, AgentsError, McpServerParams, McpServerStdio, RunConfig, Runner, ScriptedProvider,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn weather_server() -> McpServerStdio {
    McpServerStdio::new(
        "Weather Server",
        McpServerParams::new(env!("CARGO_BIN_EXE_weather_mcp_server")),
    )
    .with_cache_tools_list(true)
}

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(30), fut)
        .await
        .expect("MCP exchange timed out")
}

#[tokio::test]
async fn lists_and_calls_tools() {
    let (names, sum, cached) = within(weather_server().scoped(|server| async move {
        let tools = server.list_tools().await?;
        let mut names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        names.sort();

        let add = tools.iter().find(|t| t.name == "add_numbers").cloned();
        let required = add.map(|t| t.input_schema["required"].clone());
        assert_eq!(required, Some(json!(["a", "b"])));

        let sum = server.call_tool("add_numbers", json!({"a": 2, "b": 3})).await?;
        let cached = server.list_tools().await?;
        Ok((names, sum, cached == tools))
    }))
    .await
    .unwrap();

    assert_eq!(names, vec!["add_numbers", "get_weather"]);
    assert_eq!(sum.output, json!("5"));
    assert!(sum.error.is_none());
    assert!(cached);
}

#[tokio::test]
async fn bad_arguments_come_back_as_tool_errors_or_mcp_errors() {
    let outcome = within(weather_server().scoped(|server| async move {
        server.call_tool("add_numbers", json!({"a": "two"})).await
    }))
    .await;

    match outcome {
        Ok(result) => assert!(result.is_error()),
        Err(err) => assert!(matches!(err, AgentsError::Mcp { .. }), "{err}"),
    }
}

#[tokio::test]
async fn runner_dispatches_to_mcp_tools() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_tool_call("add_numbers", json!({"a": 19, "b": 23}))
            .with_message("19 + 23 = 42"),
    );
    let config = RunConfig::default().with_model_provider(provider.clone());

    let result = within(weather_server().scoped(|server| async move {
        let agent = Agent::simple("Assistant", "Use tools to help the user.")
            .with_mcp_server(server)
            .build()?;
        Runner::run(agent, "What is 19 + 23?", config).await
    }))
    .await
    .unwrap();

    assert_eq!(result.final_text(), "19 + 23 = 42");
    let requests = provider.requests();
    let mut advertised = requests[0].tool_names.clone();
    advertised.sort();
    assert_eq!(advertised, vec!["add_numbers", "get_weather"]);

    let tool_msg = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .cloned()
        .unwrap();
    assert_eq!(tool_msg.content, "42");
}

#[tokio::test]
async fn scoped_releases_the_server_when_the_body_fails() {
    let mut handle = None;
    let outcome: apprise_agents::Result<()> = within(weather_server().scoped(|server| {
        handle = Some(server.clone());
        async move {
            assert!(server.is_connected().await);
            server.list_tools().await?;
            Err(AgentsError::Other("body failed".to_string()))
        }
    }))
    .await;

    assert!(matches!(outcome, Err(AgentsError::Other(ref m)) if m == "body failed"));
    let server = handle.unwrap();
    assert!(!server.is_connected().await);
    assert!(server.list_tools().await.is_err());
}

#[tokio::test]
async fn scoped_releases_the_server_on_success() {
    let mut handle = None;
    within(weather_server().scoped(|server| {
        handle = Some(server.clone());
        async move { Ok(()) }
    }))
    .await
    .unwrap();

    assert!(!handle.unwrap().is_connected().await);
}
