//! Tool system for agents
//!
//! Tools are the primary way agents interact with the external world. A tool
//! never aborts the run on failure: it reports the failure inside its
//! [`ToolResult`] and lets the orchestrating layer decide what to do.

use async_trait::async_trait;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use crate::error::{AgentsError, Result};

/// Result from a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The output from the tool
    pub output: Value,
    /// Whether this result should be considered the final output
    pub is_final: bool,
    /// Optional error message if the tool failed
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: Value) -> Self {
        Self {
            output,
            is_final: false,
            error: None,
        }
    }

    /// Create a final output result
    pub fn final_output(output: Value) -> Self {
        Self {
            output,
            is_final: true,
            error: None,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: Value::Null,
            is_final: false,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Trait for all tools that can be used by agents
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    /// Get the name of the tool
    fn name(&self) -> &str;

    /// Get the description of the tool
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, arguments: Value) -> Result<ToolResult>;
}

/// Fails with [`AgentsError::DuplicateTool`] on the first repeated name.
pub fn ensure_unique_names<'a>(
    agent: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(AgentsError::DuplicateTool {
                agent: agent.to_string(),
                tool: name.to_string(),
            });
        }
    }
    Ok(())
}

type SyncHandler = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// A function-based tool
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters_schema: Value,
    function: SyncHandler,
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters_schema", &self.parameters_schema)
            .finish()
    }
}

impl FunctionTool {
    /// Create a new function tool
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            function: Arc::new(function),
        }
    }

    /// A tool that takes no arguments and returns a fixed-shape string.
    pub fn no_args<F>(name: &str, description: &str, function: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::new(
            name,
            description,
            serde_json::json!({"type": "object", "properties": {}}),
            move |_| Ok(Value::String(function())),
        )
    }

    /// Create a function tool with a simple string-to-string function
    pub fn simple<F>(name: &str, description: &str, function: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        let wrapped = move |args: Value| {
            let input = args
                .get("input")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            Ok(Value::String(function(input)))
        };

        Self::new(
            name,
            description,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Input to the function"
                    }
                },
                "required": ["input"]
            }),
            wrapped,
        )
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        match (self.function)(arguments) {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

type AsyncHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// An async tool whose arguments are a typed struct.
///
/// The parameter schema is generated from the argument type, and arguments
/// that do not decode are reported as
/// [`AgentsError::MalformedToolArguments`] inside the tool result.
#[derive(Clone)]
pub struct TypedFunctionTool {
    name: String,
    description: String,
    parameters_schema: Value,
    handler: AsyncHandler,
}

impl std::fmt::Debug for TypedFunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedFunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Build a [`TypedFunctionTool`] from an async handler over `A`.
pub fn typed_tool<A, R, H, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    handler: H,
) -> TypedFunctionTool
where
    A: DeserializeOwned + JsonSchema + Send + 'static,
    R: Serialize + Send + 'static,
    H: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let name = name.into();
    let tool_name = name.clone();
    let handler = Arc::new(handler);
    let erased: AsyncHandler = Arc::new(move |raw: Value| -> BoxFuture<'static, Result<Value>> {
        let handler = handler.clone();
        let tool_name = tool_name.clone();
        Box::pin(async move {
            let args: A = serde_json::from_value(raw).map_err(|e| {
                AgentsError::MalformedToolArguments {
                    tool: tool_name,
                    message: e.to_string(),
                }
            })?;
            let out = handler(args).await?;
            Ok(serde_json::to_value(out)?)
        })
    });

    TypedFunctionTool {
        name,
        description: description.into(),
        parameters_schema: schemars::schema_for!(A).to_value(),
        handler: erased,
    }
}

#[async_trait]
impl Tool for TypedFunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult> {
        match (self.handler)(arguments).await {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

/// Macro to create a function tool from a Rust function
#[macro_export]
macro_rules! function_tool {
    ($name:expr, $description:expr, $func:expr) => {
        $crate::tool::FunctionTool::simple($name, $description, $func)
    };
}
