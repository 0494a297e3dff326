//! Prompt templates for the conversation loop
//!
//! The system prompt tells the model which tools the session offers and how
//! to request them — both call conventions the parser understands.

use crate::tool::entities::ToolSpec;

/// Builds the system prompt from the current tool catalog.
pub struct SystemPromptTemplate;

impl SystemPromptTemplate {
    /// Preamble shared by every session.
    pub fn preamble() -> &'static str {
        r#"You are a helpful assistant running inside a host that can execute tools on your behalf.
When a tool would help, request it and wait for the result before answering.
When no tool is needed, answer directly in plain text."#
    }

    /// Instructions for the two call conventions.
    ///
    /// `marker` is the tagged-text token the parser is configured with.
    pub fn call_conventions(marker: &str) -> String {
        format!(
            r#"To call a tool, emit a fenced block:

```tool
{{"tool": "<name>", "args": {{"<param>": <value>}}}}
```

If you cannot emit a fenced block, write a single line instead:

{marker} <name>(param=value, other="quoted text")

Each tool result will be returned to you as a JSON payload in the conversation.
A failed call is reported with an error code; you may retry or choose another tool."#
        )
    }

    /// Render the full system prompt: preamble, conventions, tool catalog.
    pub fn render(spec: &ToolSpec, marker: &str) -> String {
        let mut prompt = String::from(Self::preamble());
        prompt.push_str("\n\n");
        prompt.push_str(&Self::call_conventions(marker));

        if spec.is_empty() {
            prompt.push_str("\n\nNo tools are registered for this session.");
            return prompt;
        }

        prompt.push_str("\n\nAvailable tools:\n");

        // Sorted for a deterministic prompt
        let mut tools: Vec<_> = spec.all().collect();
        tools.sort_by_key(|t| &t.name);

        for tool in tools {
            prompt.push_str(&format!("\n- {}: {}", tool.name, tool.description));
            for param in &tool.parameters {
                let req = if param.required { "required" } else { "optional" };
                prompt.push_str(&format!(
                    "\n    - {} ({}, {}): {}",
                    param.name, param.param_type, req, param.description
                ));
            }
        }

        prompt
    }
}
