//! Conversation domain entities
//!
//! A session's transcript is the single piece of mutable shared state in the
//! runtime: an ordered, append-only sequence of [`Turn`]s. Past turns are
//! never reordered or rewritten.

use crate::tool::value_objects::ToolResult;
use serde::{Deserialize, Serialize};

/// Role of a turn in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// A tool outcome fed back so the model can react to it
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One entry in the conversation transcript (Entity)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Build a tool turn from a dispatch outcome.
    ///
    /// The outcome is serialized as JSON so the model sees failure data
    /// (code, message) as readily as success values.
    pub fn tool(result: &ToolResult) -> Self {
        let content = serde_json::to_string(result)
            .unwrap_or_else(|_| format!("{{\"tool_name\":\"{}\",\"success\":false}}", result.tool_name));
        Self {
            role: Role::Tool,
            content,
        }
    }
}

/// Append-only ordered sequence of turns forming the conversation transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn. This is the only mutation the transcript offers.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Content of the last assistant turn, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::value_objects::{ToolError, ToolResult};

    #[test]
    fn test_turn_constructors() {
        assert_eq!(Turn::user("hi").role, Role::User);
        assert_eq!(Turn::assistant("hello").role, Role::Assistant);
    }

    #[test]
    fn test_tool_turn_serializes_outcome() {
        let result = ToolResult::success("soma", serde_json::json!(30));
        let turn = Turn::tool(&result);

        assert_eq!(turn.role, Role::Tool);
        let parsed: serde_json::Value = serde_json::from_str(&turn.content).unwrap();
        assert_eq!(parsed["tool_name"], "soma");
        assert_eq!(parsed["output"], 30);
    }

    #[test]
    fn test_tool_turn_carries_failure_data() {
        let result = ToolResult::failure("missing", ToolError::not_found("missing"));
        let turn = Turn::tool(&result);

        let parsed: serde_json::Value = serde_json::from_str(&turn.content).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn test_transcript_preserves_append_order() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("question"));
        transcript.push(Turn::assistant("calling a tool"));
        transcript.push(Turn::tool(&ToolResult::success("a", serde_json::json!(1))));
        transcript.push(Turn::tool(&ToolResult::success("b", serde_json::json!(2))));

        let roles: Vec<Role> = transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Tool]);

        // a's result turn strictly before b's
        assert!(transcript.turns()[2].content.contains("\"a\""));
        assert!(transcript.turns()[3].content.contains("\"b\""));
    }

    #[test]
    fn test_last_assistant_text() {
        let mut transcript = Transcript::new();
        assert!(transcript.last_assistant_text().is_none());

        transcript.push(Turn::user("q"));
        transcript.push(Turn::assistant("first"));
        transcript.push(Turn::tool(&ToolResult::success("t", serde_json::json!(null))));
        transcript.push(Turn::assistant("final"));

        assert_eq!(transcript.last_assistant_text(), Some("final"));
    }
}
