//! Tool-call parsing from model output.
//!
//! Extracts [`ToolCall`] requests from raw model text. Two conventions are
//! recognized, structured first:
//!
//! 1. Structured JSON — a fenced ```` ```tool ```` block containing
//!    `{"tool": "<name>", "args": {...}}`, a bare JSON object line, or the
//!    entire output as one JSON object. Payloads are validated
//!    field-by-field; malformed ones are skipped and recorded as a
//!    [`ParseDiagnostic`], never raised.
//! 2. Tagged text — `TOOL: name(key=value, key="quoted", flag=true)`.
//!    The marker token is configurable.
//!
//! If both forms appear in one output, structured payloads win and the
//! tagged matches are ignored — a model that echoes both would otherwise
//! produce duplicate dispatches.
//!
//! [`ToolCallParser::parse`] returns a lazy iterator; callers running in
//! single-call-per-turn mode can stop after the first item without paying
//! for the rest of the scan. Calling `parse` again restarts it.

use crate::tool::entities::ToolCall;
use std::collections::HashMap;

/// Default marker token introducing a tagged-text tool call.
pub const DEFAULT_MARKER: &str = "TOOL:";

/// A skipped, unparseable tool-call fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseDiagnostic {
    /// The offending fragment, truncated for logging.
    pub fragment: String,
    /// Why it was skipped.
    pub reason: String,
}

impl ParseDiagnostic {
    fn new(fragment: &str, reason: impl Into<String>) -> Self {
        let fragment = if fragment.len() > 120 {
            let cut: String = fragment.chars().take(117).collect();
            format!("{}...", cut)
        } else {
            fragment.to_string()
        };
        Self {
            fragment,
            reason: reason.into(),
        }
    }
}

/// Parser configured with a tagged-text marker.
#[derive(Debug, Clone)]
pub struct ToolCallParser {
    marker: String,
}

impl Default for ToolCallParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallParser {
    pub fn new() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
        }
    }

    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Lazily scan `output` for tool calls.
    pub fn parse<'a>(&'a self, output: &'a str) -> ToolCalls<'a> {
        ToolCalls {
            marker: &self.marker,
            output,
            lines: output.lines(),
            phase: Phase::Structured,
            block: None,
            yielded_structured: false,
            diagnostics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Structured,
    Tagged,
    Done,
}

/// Lazy iterator over the tool calls in one model output.
///
/// Diagnostics for skipped fragments accumulate as the scan advances and are
/// available from [`diagnostics`](Self::diagnostics) once iteration stops.
pub struct ToolCalls<'a> {
    marker: &'a str,
    output: &'a str,
    lines: std::str::Lines<'a>,
    phase: Phase,
    /// Buffer for an open ```tool fence
    block: Option<String>,
    yielded_structured: bool,
    diagnostics: Vec<ParseDiagnostic>,
}

impl<'a> ToolCalls<'a> {
    /// Fragments skipped so far (populated during iteration).
    pub fn diagnostics(&self) -> &[ParseDiagnostic] {
        &self.diagnostics
    }

    /// Consume the iterator, returning all calls and the diagnostics.
    pub fn collect_with_diagnostics(mut self) -> (Vec<ToolCall>, Vec<ParseDiagnostic>) {
        let mut calls = Vec::new();
        while let Some(call) = self.next() {
            calls.push(call);
        }
        (calls, self.diagnostics)
    }

    fn next_structured(&mut self) -> Option<ToolCall> {
        for line in self.lines.by_ref() {
            let trimmed = line.trim();

            if self.block.is_some() {
                if trimmed == "```" {
                    let payload = self.block.take().unwrap_or_default();
                    match parse_structured_payload(&payload) {
                        Ok(call) => {
                            self.yielded_structured = true;
                            return Some(call);
                        }
                        Err(reason) => {
                            self.diagnostics.push(ParseDiagnostic::new(&payload, reason));
                        }
                    }
                } else if let Some(buf) = self.block.as_mut() {
                    buf.push_str(line);
                    buf.push('\n');
                }
                continue;
            }

            if trimmed == "```tool" {
                self.block = Some(String::new());
                continue;
            }

            // Bare JSON object line
            if trimmed.starts_with('{') && trimmed.ends_with('}') {
                match parse_structured_payload(trimmed) {
                    Ok(call) => {
                        self.yielded_structured = true;
                        return Some(call);
                    }
                    Err(reason) => {
                        // Only flag fragments that look like call attempts
                        if trimmed.contains("\"tool\"") {
                            self.diagnostics.push(ParseDiagnostic::new(trimmed, reason));
                        }
                    }
                }
            }
        }

        // Unterminated fence at end of output
        if let Some(payload) = self.block.take() {
            self.diagnostics
                .push(ParseDiagnostic::new(&payload, "unterminated ```tool block"));
        }

        // Last resort: the whole output as one JSON payload
        if !self.yielded_structured {
            let whole = self.output.trim();
            if whole.starts_with('{')
                && whole.ends_with('}')
                && whole.lines().count() > 1
                && let Ok(call) = parse_structured_payload(whole)
            {
                self.yielded_structured = true;
                return Some(call);
            }
        }

        None
    }

    fn next_tagged(&mut self) -> Option<ToolCall> {
        for line in self.lines.by_ref() {
            let Some(pos) = line.find(self.marker) else {
                continue;
            };
            let rest = line[pos + self.marker.len()..].trim();
            if rest.is_empty() {
                self.diagnostics
                    .push(ParseDiagnostic::new(line, "marker with no tool name"));
                continue;
            }
            match parse_tagged_call(rest) {
                Ok(call) => return Some(call),
                Err(reason) => {
                    self.diagnostics.push(ParseDiagnostic::new(line, reason));
                }
            }
        }
        None
    }
}

impl<'a> Iterator for ToolCalls<'a> {
    type Item = ToolCall;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::Structured => {
                    if let Some(call) = self.next_structured() {
                        return Some(call);
                    }
                    // Structured payloads take precedence: only fall back to
                    // the tagged convention when none parsed at all.
                    if self.yielded_structured {
                        self.phase = Phase::Done;
                        return None;
                    }
                    self.lines = self.output.lines();
                    self.phase = Phase::Tagged;
                }
                Phase::Tagged => {
                    let call = self.next_tagged();
                    if call.is_none() {
                        self.phase = Phase::Done;
                    }
                    return call;
                }
                Phase::Done => return None,
            }
        }
    }
}

/// Validate a structured payload field-by-field.
///
/// Expected shape: `{"tool": "<non-empty name>", "args": {...}}` — the
/// `args` object is optional and extra fields are tolerated.
fn parse_structured_payload(payload: &str) -> Result<ToolCall, String> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| format!("invalid JSON: {}", e))?;

    let obj = value
        .as_object()
        .ok_or_else(|| "payload is not a JSON object".to_string())?;

    let tool_name = obj
        .get("tool")
        .ok_or_else(|| "missing 'tool' field".to_string())?
        .as_str()
        .ok_or_else(|| "'tool' field is not a string".to_string())?;

    if tool_name.is_empty() {
        return Err("'tool' field is empty".to_string());
    }

    let mut arguments = HashMap::new();
    if let Some(args_value) = obj.get("args") {
        let args = args_value
            .as_object()
            .ok_or_else(|| "'args' field is not an object".to_string())?;
        for (key, val) in args {
            arguments.insert(key.clone(), val.clone());
        }
    }

    Ok(ToolCall {
        tool_name: tool_name.to_string(),
        arguments,
    })
}

/// Parse the tagged form: `name(key=value, key="quoted", flag=true)`.
///
/// A bare `name` with no parenthesized list is a call with no arguments.
fn parse_tagged_call(fragment: &str) -> Result<ToolCall, String> {
    let (name, arg_list) = match fragment.find('(') {
        Some(open) => {
            let close = fragment
                .rfind(')')
                .ok_or_else(|| "unbalanced parentheses".to_string())?;
            if close < open {
                return Err("unbalanced parentheses".to_string());
            }
            (&fragment[..open], &fragment[open + 1..close])
        }
        None => (fragment, ""),
    };

    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(format!("invalid tool name '{}'", name));
    }

    let mut call = ToolCall::new(name);
    for pair in split_top_level(arg_list) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let eq = pair
            .find('=')
            .ok_or_else(|| format!("argument '{}' is not key=value", pair))?;
        let key = pair[..eq].trim();
        if key.is_empty() {
            return Err(format!("argument '{}' has an empty key", pair));
        }
        let value = parse_tagged_value(pair[eq + 1..].trim());
        call.arguments.insert(key.to_string(), value);
    }

    Ok(call)
}

/// Split a comma-separated argument list, ignoring commas inside quotes.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in list.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < list.len() {
        parts.push(&list[start..]);
    }
    parts
}

/// Interpret a tagged argument value as a tagged JSON value.
///
/// Quoted text is a string; `true`/`false` are booleans; numeric literals
/// become numbers; anything else is taken as a bare-word string.
fn parse_tagged_value(raw: &str) -> serde_json::Value {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return serde_json::Value::String(raw[1..raw.len() - 1].to_string());
    }
    match raw {
        "true" => return serde_json::Value::Bool(true),
        "false" => return serde_json::Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>()
        && let Some(n) = serde_json::Number::from_f64(f)
    {
        return serde_json::Value::Number(n);
    }
    serde_json::Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(parser: &ToolCallParser, text: &str) -> (Vec<ToolCall>, Vec<ParseDiagnostic>) {
        parser.parse(text).collect_with_diagnostics()
    }

    #[test]
    fn test_parse_fenced_block() {
        let parser = ToolCallParser::new();
        let text = r#"I'll sum those numbers.

```tool
{"tool": "soma", "args": {"a": 10, "b": 20}}
```
"#;
        let (calls, diags) = parse_all(&parser, text);
        assert_eq!(calls.len(), 1);
        assert!(diags.is_empty());
        assert_eq!(calls[0].tool_name, "soma");
        assert_eq!(calls[0].get_i64("a"), Some(10));
        assert_eq!(calls[0].get_i64("b"), Some(20));
    }

    #[test]
    fn test_parse_bare_json_line() {
        let parser = ToolCallParser::new();
        let text = r#"{"tool": "echo", "args": {"message": "hi"}}"#;
        let (calls, _) = parse_all(&parser, text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "echo");
        assert_eq!(calls[0].get_string("message"), Some("hi"));
    }

    #[test]
    fn test_parse_whole_output_as_json() {
        let parser = ToolCallParser::new();
        let text = "{\n  \"tool\": \"soma\",\n  \"args\": {\"a\": 1, \"b\": 2}\n}";
        let (calls, _) = parse_all(&parser, text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "soma");
    }

    #[test]
    fn test_parse_multiple_blocks_in_order() {
        let parser = ToolCallParser::new();
        let text = r#"
```tool
{"tool": "first", "args": {}}
```
then
```tool
{"tool": "second", "args": {}}
```
"#;
        let (calls, _) = parse_all(&parser, text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_name, "first");
        assert_eq!(calls[1].tool_name, "second");
    }

    #[test]
    fn test_malformed_payload_yields_diagnostic_not_panic() {
        let parser = ToolCallParser::new();
        let text = r#"
```tool
{"tool": 42, "args": {}}
```
"#;
        let (calls, diags) = parse_all(&parser, text);
        assert!(calls.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].reason.contains("not a string"));
    }

    #[test]
    fn test_args_must_be_object() {
        let parser = ToolCallParser::new();
        let text = r#"{"tool": "soma", "args": [1, 2]}"#;
        let (calls, diags) = parse_all(&parser, text);
        assert!(calls.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].reason.contains("'args'"));
    }

    #[test]
    fn test_malformed_block_does_not_stop_later_calls() {
        let parser = ToolCallParser::new();
        let text = r#"
```tool
not json at all
```
```tool
{"tool": "good", "args": {}}
```
"#;
        let (calls, diags) = parse_all(&parser, text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "good");
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_parse_tagged_call() {
        let parser = ToolCallParser::new();
        let text = r#"Let me check. TOOL: soma(a=10, b=20)"#;
        let (calls, diags) = parse_all(&parser, text);
        assert!(diags.is_empty());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "soma");
        assert_eq!(calls[0].get_i64("a"), Some(10));
    }

    #[test]
    fn test_tagged_value_types() {
        let parser = ToolCallParser::new();
        let text = r#"TOOL: mix(s="hello, world", n=3.5, flag=true, bare=word)"#;
        let (calls, _) = parse_all(&parser, text);
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.get_string("s"), Some("hello, world"));
        assert_eq!(
            call.arguments.get("n").and_then(|v| v.as_f64()),
            Some(3.5)
        );
        assert_eq!(call.get_bool("flag"), Some(true));
        assert_eq!(call.get_string("bare"), Some("word"));
    }

    #[test]
    fn test_tagged_call_without_arguments() {
        let parser = ToolCallParser::new();
        let (calls, _) = parse_all(&parser, "TOOL: refresh");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "refresh");
        assert!(calls[0].arguments.is_empty());
    }

    #[test]
    fn test_structured_takes_precedence_over_tagged() {
        let parser = ToolCallParser::new();
        let text = r#"
TOOL: soma(a=1, b=2)
```tool
{"tool": "soma", "args": {"a": 1, "b": 2}}
```
"#;
        let (calls, _) = parse_all(&parser, text);
        // Both forms describe the same request; only the structured one counts
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_plain_text_yields_nothing() {
        let parser = ToolCallParser::new();
        let (calls, diags) = parse_all(&parser, "The answer is 42. No tools needed.");
        assert!(calls.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_custom_marker() {
        let parser = ToolCallParser::with_marker("@call");
        let (calls, _) = parse_all(&parser, "@call soma(a=1, b=2)");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "soma");

        // The default marker is not recognized by this parser
        let (calls, _) = parse_all(&parser, "TOOL: soma(a=1)");
        assert!(calls.is_empty());
    }

    #[test]
    fn test_iterator_is_lazy_and_restartable() {
        let parser = ToolCallParser::new();
        let text = r#"
```tool
{"tool": "first", "args": {}}
```
```tool
{"tool": "second", "args": {}}
```
"#;
        // Single-call mode: take only the first
        let first = parser.parse(text).next().unwrap();
        assert_eq!(first.tool_name, "first");

        // Restart: a fresh parse sees both again
        let all: Vec<_> = parser.parse(text).collect();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_unterminated_fence_is_diagnosed() {
        let parser = ToolCallParser::new();
        let text = "```tool\n{\"tool\": \"soma\"}";
        let (calls, diags) = parse_all(&parser, text);
        assert!(calls.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].reason.contains("unterminated"));
    }

    #[test]
    fn test_tagged_missing_value_is_diagnosed() {
        let parser = ToolCallParser::new();
        let (calls, diags) = parse_all(&parser, "TOOL: soma(a)");
        assert!(calls.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].reason.contains("key=value"));
    }
}
