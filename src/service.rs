//! Tower-based tool execution primitives and layers.
//!
//! Every tool call the runner makes goes through a small service stack:
//! [`BaseToolService`] adapts a `dyn Tool`, and [`TimeoutLayer`] bounds how
//! long it may take. Failures at any level come back as a [`ToolResponse`]
//! carrying an error message, never as a run-ending error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;
use tower::{util::BoxService, BoxError, Layer, Service, ServiceExt};

use crate::tool::{Tool, ToolResult};

/// Whether the run continues after a tool call or ends with its output.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Continue,
    Final(Value),
}

/// Request passed into the tool service stack.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub run_id: String,
    pub agent: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Response from the tool service stack.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub output: Value,
    pub error: Option<String>,
    pub effect: Effect,
}

impl ToolResponse {
    pub fn success(output: Value) -> Self {
        Self {
            output,
            error: None,
            effect: Effect::Continue,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            output: Value::Null,
            error: Some(msg.into()),
            effect: Effect::Continue,
        }
    }
}

impl From<ToolResult> for ToolResponse {
    fn from(result: ToolResult) -> Self {
        match result {
            ToolResult {
                error: Some(err), ..
            } => ToolResponse::error(err),
            ToolResult {
                output,
                is_final: true,
                ..
            } => ToolResponse {
                output: output.clone(),
                error: None,
                effect: Effect::Final(output),
            },
            ToolResult { output, .. } => ToolResponse::success(output),
        }
    }
}

type BoxFut = Pin<Box<dyn Future<Output = Result<ToolResponse, BoxError>> + Send>>;

/// Base tool executor adapting `dyn Tool` to a Tower Service.
#[derive(Clone)]
pub struct BaseToolService {
    tool: Arc<dyn Tool>,
}

impl BaseToolService {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self { tool }
    }
}

impl Service<ToolRequest> for BaseToolService {
    type Response = ToolResponse;
    type Error = BoxError;
    type Future = BoxFut;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        let tool = self.tool.clone();
        Box::pin(async move {
            let started = Instant::now();
            let response = match tool.execute(req.arguments).await {
                Ok(result) => ToolResponse::from(result),
                Err(e) => ToolResponse::error(e.to_string()),
            };
            tracing::debug!(
                agent = %req.agent,
                tool = %req.tool_name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                ok = response.error.is_none(),
                "tool call finished"
            );
            Ok(response)
        })
    }
}

/// Boxed service type the runner calls once per tool call.
pub type ToolBoxService = BoxService<ToolRequest, ToolResponse, BoxError>;

/// Times out tool execution with a `"timeout"` error response.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutLayer {
    duration: Duration,
}

impl TimeoutLayer {
    pub fn secs(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
        }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self { duration }
    }
}

#[derive(Clone, Debug)]
pub struct TimeoutService<S> {
    inner: S,
    duration: Duration,
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            duration: self.duration,
        }
    }
}

impl<S> Service<ToolRequest> for TimeoutService<S>
where
    S: Service<ToolRequest, Response = ToolResponse, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = ToolResponse;
    type Error = BoxError;
    type Future = BoxFut;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let d = self.duration;
        Box::pin(async move {
            let tool = req.tool_name.clone();
            match timeout(d, inner.call(req)).await {
                Ok(res) => res,
                Err(_elapsed) => {
                    tracing::warn!(tool = %tool, timeout_ms = d.as_millis() as u64, "tool timed out");
                    Ok(ToolResponse::error("timeout"))
                }
            }
        })
    }
}

/// The stack the runner uses for `tool`: the base adapter, optionally
/// bounded by a timeout.
pub fn build_tool_stack(tool: Arc<dyn Tool>, tool_timeout: Option<Duration>) -> ToolBoxService {
    let base = BaseToolService::new(tool);
    match tool_timeout {
        Some(d) => BoxService::new(TimeoutLayer::from_duration(d).layer(base)),
        None => BoxService::new(base),
    }
}

/// Run one request through a fresh stack for `tool`. Stack failures are
/// folded into an error response.
pub async fn call_tool(
    tool: Arc<dyn Tool>,
    tool_timeout: Option<Duration>,
    req: ToolRequest,
) -> ToolResponse {
    build_tool_stack(tool, tool_timeout)
        .oneshot(req)
        .await
        .unwrap_or_else(|e| ToolResponse::error(e.to_string()))
}
