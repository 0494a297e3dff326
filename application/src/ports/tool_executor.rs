//! Tool Executor port
//!
//! Defines how the application layer dispatches tool calls. The concrete
//! registry (with its handler table, timeout, and error capture) lives in
//! the infrastructure layer.

use async_trait::async_trait;
use harbor_domain::{ToolCall, ToolResult, ToolSpec};

/// Port for tool dispatch.
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// Snapshot of the currently registered tool definitions.
    fn catalog(&self) -> ToolSpec;

    /// Check if a tool is available.
    fn has_tool(&self, name: &str) -> bool {
        self.catalog().get(name).is_some()
    }

    /// Dispatch a tool call asynchronously.
    ///
    /// Never fails at the Rust level: every outcome — including unknown
    /// tools, timeouts, and handler errors — is a [`ToolResult`].
    async fn dispatch(&self, call: &ToolCall) -> ToolResult;

    /// Dispatch a tool call on the current thread (blocking).
    ///
    /// Required for re-entrant dispatch from inside the embedding
    /// environment, where the calling thread already holds the script VM.
    fn dispatch_blocking(&self, call: &ToolCall) -> ToolResult;
}
