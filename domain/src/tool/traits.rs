//! Tool domain traits
//!
//! Contains pure domain traits for tool handlers and argument validation.
//! The async `ToolExecutorPort` is defined in the application layer (ports).

use super::entities::{ToolCall, ToolDefinition};
use std::collections::HashMap;

/// The callable an embedded script contributed for a tool.
///
/// Handlers are synchronous from the host's perspective — the embedding
/// environment executes them on its own thread. The `Err` string is captured
/// by the registry and surfaced as an `EXECUTION_FAILED` outcome, never
/// propagated to the orchestrator.
pub trait ToolHandler: Send + Sync {
    fn invoke(
        &self,
        args: &HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, String>;
}

/// Adapter so plain closures can serve as handlers (used heavily in tests).
pub struct FnToolHandler<F>(pub F);

impl<F> ToolHandler for FnToolHandler<F>
where
    F: Fn(&HashMap<String, serde_json::Value>) -> Result<serde_json::Value, String>
        + Send
        + Sync,
{
    fn invoke(
        &self,
        args: &HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, String> {
        (self.0)(args)
    }
}

/// Validator for tool calls
///
/// Pure domain trait that checks a call's arguments against the tool's
/// declared schema without any I/O.
pub trait ToolValidator {
    /// Validate a tool call against its definition
    fn validate(&self, call: &ToolCall, definition: &ToolDefinition) -> Result<(), String>;
}

/// Default implementation of ToolValidator
#[derive(Debug, Clone, Default)]
pub struct DefaultToolValidator;

impl ToolValidator for DefaultToolValidator {
    fn validate(&self, call: &ToolCall, definition: &ToolDefinition) -> Result<(), String> {
        // Tools registered without a schema accept any arguments
        if !definition.has_declared_schema() {
            return Ok(());
        }

        // All required parameters must be present
        for param in &definition.parameters {
            if param.required && !call.arguments.contains_key(&param.name) {
                return Err(format!(
                    "Missing required parameter '{}' for tool '{}'",
                    param.name, definition.name
                ));
            }
        }

        // All provided arguments must be declared parameters
        let valid_params: std::collections::HashSet<&str> = definition
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect();

        for arg_name in call.arguments.keys() {
            if !valid_params.contains(arg_name.as_str()) {
                return Err(format!(
                    "Unknown parameter '{}' for tool '{}'",
                    arg_name, definition.name
                ));
            }
        }

        Ok(())
    }
}
