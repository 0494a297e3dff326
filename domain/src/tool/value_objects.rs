//! Tool domain value objects — immutable outcome and error types
//!
//! These types form the output side of the tool pipeline. Every dispatch
//! produces a [`ToolResult`]: a success value or a [`ToolError`], never an
//! unwound exception. Failures are data — they are serialized into the next
//! prompt so the model can react (retry, apologize, or pick another tool).
//!
//! Error codes in [`ToolError`]:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `NOT_FOUND` | No tool registered under the requested name |
//! | `INVALID_ARGUMENT` | Arguments do not match the declared schema |
//! | `EXECUTION_FAILED` | The handler raised or panicked |
//! | `TIMEOUT` | The per-call budget expired |
//! | `CANCELLED` | The session was cancelled mid-dispatch |

use serde::{Deserialize, Serialize};

/// Error that occurred during tool dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    /// Error code (e.g., "NOT_FOUND", "TIMEOUT")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Common error constructors
    pub fn not_found(tool_name: impl Into<String>) -> Self {
        Self::new(
            "NOT_FOUND",
            format!("Tool not found: {}", tool_name.into()),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("INVALID_ARGUMENT", message)
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new("EXECUTION_FAILED", message)
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(
            "TIMEOUT",
            format!("Operation timed out: {}", operation.into()),
        )
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::new(
            "CANCELLED",
            format!("Operation cancelled: {}", operation.into()),
        )
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolError {}

/// Outcome of a tool dispatch, carrying the produced value or error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool that was dispatched
    pub tool_name: String,
    /// Whether the dispatch succeeded
    pub success: bool,
    /// Value produced by the handler (for successful dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Error information (for failed dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    /// Wall-clock duration of the handler invocation in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_name: impl Into<String>, output: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: Some(output),
            error: None,
            duration_ms: None,
        }
    }

    /// Create a failed result
    pub fn failure(tool_name: impl Into<String>, error: ToolError) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: None,
            error: Some(error),
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn output(&self) -> Option<&serde_json::Value> {
        self.output.as_ref()
    }

    pub fn error(&self) -> Option<&ToolError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error() {
        let err = ToolError::not_found("soma").with_details("registry is empty");

        assert_eq!(err.code, "NOT_FOUND");
        assert!(err.message.contains("soma"));
        assert!(err.details.is_some());
        assert!(err.to_string().contains("NOT_FOUND"));
    }

    #[test]
    fn test_tool_result_success() {
        let result =
            ToolResult::success("soma", serde_json::json!(30)).with_duration(3);

        assert!(result.is_success());
        assert_eq!(result.output(), Some(&serde_json::json!(30)));
        assert!(result.error().is_none());
        assert_eq!(result.duration_ms, Some(3));
    }

    #[test]
    fn test_tool_result_failure() {
        let result = ToolResult::failure("soma", ToolError::timeout("soma"));

        assert!(!result.is_success());
        assert!(result.output().is_none());
        assert_eq!(result.error().unwrap().code, "TIMEOUT");
    }

    #[test]
    fn test_tool_result_serializes_without_empty_fields() {
        let result = ToolResult::success("echo", serde_json::json!("hi"));
        let json = serde_json::to_value(&result).unwrap();

        assert!(json.get("error").is_none());
        assert!(json.get("duration_ms").is_none());
        assert_eq!(json["tool_name"], "echo");
        assert_eq!(json["success"], true);
    }
}
