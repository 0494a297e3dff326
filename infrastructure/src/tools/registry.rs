//! Tool Registry
//!
//! The [`ToolRegistry`] owns the name → handler table shared between the
//! embedding bridge (registration, direct calls) and the conversation loop
//! (model-driven dispatch). It implements [`ToolExecutorPort`].
//!
//! # Locking discipline
//!
//! The map sits behind a `std::sync::RwLock`. Writes (registration) are rare
//! and hold a short exclusive lock; dispatch clones the `Arc<RegisteredTool>`
//! under a read lock and releases it before the handler runs, so a slow
//! handler never blocks concurrent lookups or other sessions.
//!
//! # Dispatch semantics
//!
//! Every outcome is a [`ToolResult`] — unknown names, schema mismatches,
//! handler errors, panics, and timeouts all become failure outcomes, never
//! Rust-level errors:
//!
//! | Condition | Outcome code |
//! |-----------|--------------|
//! | name not registered | `NOT_FOUND` |
//! | arguments fail schema validation | `INVALID_ARGUMENT` |
//! | handler returned `Err` or panicked | `EXECUTION_FAILED` |
//! | per-call budget expired | `TIMEOUT` |
//! | session token cancelled | `CANCELLED` |
//!
//! Async dispatch runs the handler on a blocking worker and abandons it on
//! timeout (the worker runs to completion; its result is dropped). Blocking
//! dispatch runs inline — required when the caller already holds the script
//! VM — and reports an overrun after the handler returns.

use async_trait::async_trait;
use harbor_application::ports::tool_executor::ToolExecutorPort;
use harbor_domain::{
    DefaultToolValidator, ToolCall, ToolDefinition, ToolError, ToolHandler, ToolResult, ToolSpec,
    ToolValidator,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A tool as stored in the registry: its declared schema plus the handler
/// the embedding environment contributed. Immutable once registered.
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
}

/// Shared registry of script-contributed tools.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<RegisteredTool>>>,
    validator: DefaultToolValidator,
    call_timeout: Duration,
    cancel: CancellationToken,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(call_timeout: Duration) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            validator: DefaultToolValidator,
            call_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach the session-level cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Register a tool. Never rejected: scripts may be re-loaded, so a
    /// duplicate name overwrites the previous entry with a logged warning.
    pub fn register(&self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) {
        let name = definition.name.clone();
        let entry = Arc::new(RegisteredTool {
            definition,
            handler,
        });

        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if tools.insert(name.clone(), entry).is_some() {
            warn!(tool = %name, "Tool already registered; overwriting previous handler");
        } else {
            debug!(tool = %name, "Registered tool");
        }
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve and validate a call, returning the tool or the failure outcome.
    fn prepare(&self, call: &ToolCall) -> Result<Arc<RegisteredTool>, ToolResult> {
        let Some(tool) = self.lookup(&call.tool_name) else {
            return Err(ToolResult::failure(
                &call.tool_name,
                ToolError::not_found(&call.tool_name),
            ));
        };

        if let Err(message) = self.validator.validate(call, &tool.definition) {
            return Err(ToolResult::failure(
                &call.tool_name,
                ToolError::invalid_argument(message),
            ));
        }

        Ok(tool)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutorPort for ToolRegistry {
    fn catalog(&self) -> ToolSpec {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools
            .values()
            .fold(ToolSpec::new(), |spec, t| spec.register(t.definition.clone()))
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        if self.cancel.is_cancelled() {
            return ToolResult::failure(&call.tool_name, ToolError::cancelled(&call.tool_name));
        }

        let tool = match self.prepare(call) {
            Ok(tool) => tool,
            Err(failure) => return failure,
        };

        let handler = Arc::clone(&tool.handler);
        let args = call.arguments.clone();
        let start = Instant::now();

        let worker = tokio::task::spawn_blocking(move || handler.invoke(&args));

        let joined = tokio::select! {
            _ = self.cancel.cancelled() => {
                return ToolResult::failure(
                    &call.tool_name,
                    ToolError::cancelled(&call.tool_name),
                );
            }
            joined = tokio::time::timeout(self.call_timeout, worker) => joined,
        };

        let elapsed = start.elapsed().as_millis() as u64;
        match joined {
            // Budget expired: abandon the worker, report timeout
            Err(_) => ToolResult::failure(&call.tool_name, ToolError::timeout(&call.tool_name))
                .with_duration(elapsed),
            // Handler panicked on the worker thread
            Ok(Err(join_err)) => ToolResult::failure(
                &call.tool_name,
                ToolError::execution_failed(format!("handler panicked: {}", join_err)),
            )
            .with_duration(elapsed),
            Ok(Ok(Err(message))) => ToolResult::failure(
                &call.tool_name,
                ToolError::execution_failed(message),
            )
            .with_duration(elapsed),
            Ok(Ok(Ok(value))) => {
                ToolResult::success(&call.tool_name, value).with_duration(elapsed)
            }
        }
    }

    fn dispatch_blocking(&self, call: &ToolCall) -> ToolResult {
        if self.cancel.is_cancelled() {
            return ToolResult::failure(&call.tool_name, ToolError::cancelled(&call.tool_name));
        }

        let tool = match self.prepare(call) {
            Ok(tool) => tool,
            Err(failure) => return failure,
        };

        let start = Instant::now();
        let invoked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tool.handler.invoke(&call.arguments)
        }));
        let elapsed = start.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        // Inline execution cannot be preempted; an overrun is reported
        // after the fact.
        if elapsed > self.call_timeout {
            return ToolResult::failure(&call.tool_name, ToolError::timeout(&call.tool_name))
                .with_duration(elapsed_ms);
        }

        match invoked {
            Err(_) => ToolResult::failure(
                &call.tool_name,
                ToolError::execution_failed("handler panicked"),
            )
            .with_duration(elapsed_ms),
            Ok(Err(message)) => ToolResult::failure(
                &call.tool_name,
                ToolError::execution_failed(message),
            )
            .with_duration(elapsed_ms),
            Ok(Ok(value)) => ToolResult::success(&call.tool_name, value).with_duration(elapsed_ms),
        }
    }
}
