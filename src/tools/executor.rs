//! Concurrent tool execution with per-call isolation.
//!
//! Every call runs in its own tokio task under its own timeout. Whatever happens
//! inside a call (unknown tool, bad parameters, error, panic, timeout) is folded
//! into that call's `ToolResult`; the batch itself never fails.

use super::catalog::ToolRegistry;
use crate::diagnosis::confidence_percent;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A tool invocation requested by the diagnosis model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Value,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_name: String,
    pub input: Value,
    pub output: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    fn succeeded(tool_name: String, input: Value, output: Value) -> Self {
        let confidence = output
            .get("confidence")
            .and_then(Value::as_f64)
            .map(confidence_percent);
        Self {
            tool_name,
            input,
            output,
            timestamp: Utc::now(),
            confidence,
            error: None,
        }
    }

    fn failed(tool_name: String, input: Value, error: String) -> Self {
        Self {
            tool_name,
            input,
            output: json!({ "error": error }),
            timestamp: Utc::now(),
            confidence: Some(0),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs batches of tool calls against a shared registry.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute all calls concurrently.
    ///
    /// Returns exactly one result per call, in input order.
    pub async fn execute_all(&self, calls: Vec<ToolCall>) -> Vec<ToolResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        let started = Instant::now();
        let count = calls.len();

        let timeout = self.timeout;
        let pending = calls.into_iter().map(|call| {
            let tool_name = call.tool_name.clone();
            let input = call.parameters.clone();
            let registry = Arc::clone(&self.registry);
            let mut handle = tokio::spawn(async move { execute_one(&registry, call).await });
            // Deadline applies outside the task: a tool blocking its worker thread still times out.
            async move {
                match tokio::time::timeout(timeout, &mut handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_err)) => {
                        warn!(tool = %tool_name, error = %join_err, "tool_task_aborted");
                        ToolResult::failed(tool_name, input, format!("tool task failed: {}", join_err))
                    }
                    Err(_) => {
                        handle.abort();
                        warn!(tool = %tool_name, timeout_ms = timeout.as_millis() as u64, "tool_timed_out");
                        ToolResult::failed(
                            tool_name,
                            input,
                            format!("timed out after {}ms", timeout.as_millis()),
                        )
                    }
                }
            }
        });

        let results: Vec<ToolResult> = join_all(pending).await;

        let failures = results.iter().filter(|r| !r.is_success()).count();
        info!(
            calls = count,
            failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool_batch_completed"
        );

        results
    }
}

async fn execute_one(registry: &ToolRegistry, call: ToolCall) -> ToolResult {
    let ToolCall {
        tool_name,
        mut parameters,
    } = call;
    let input = parameters.clone();

    let Some(tool) = registry.implementation(&tool_name) else {
        warn!(tool = %tool_name, "unknown_tool_requested");
        return ToolResult::failed(tool_name.clone(), input, format!("Unknown tool: {}", tool_name));
    };

    if let Err(e) = registry.fill_defaults(&tool_name, &mut parameters) {
        return ToolResult::failed(tool_name, input, e.to_string());
    }
    match registry.validate_params(&tool_name, &parameters) {
        Ok(errors) if errors.is_empty() => {}
        Ok(errors) => {
            warn!(tool = %tool_name, errors = ?errors, "tool_params_invalid");
            return ToolResult::failed(tool_name, input, errors.join("; "));
        }
        Err(e) => return ToolResult::failed(tool_name, input, e.to_string()),
    }

    let started = Instant::now();
    match tool.invoke(parameters).await {
        Ok(output) => {
            debug!(
                tool = %tool_name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "tool_completed"
            );
            ToolResult::succeeded(tool_name, input, output)
        }
        Err(e) => {
            warn!(tool = %tool_name, error = %e, "tool_failed");
            ToolResult::failed(tool_name, input, e.to_string())
        }
    }
}
