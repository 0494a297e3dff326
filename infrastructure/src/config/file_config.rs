//! File configuration schema (`harbor.toml`).

use harbor_application::config::LoopConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::providers::chat::ChatProviderConfig;
use crate::providers::retry::RetryPolicy;
use crate::providers::search::SearchProviderConfig;

/// Root configuration structure.
///
/// ```toml
/// [provider]
/// base_url = "https://api.groq.com/openai/v1"
/// api_key_env = "HARBOR_API_KEY"
/// model = "llama-3.3-70b-versatile"
///
/// [agent]
/// max_turns = 8
/// tool_timeout_ms = 30000
///
/// [parser]
/// marker = "TOOL:"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub provider: ChatProviderConfig,
    #[serde(default)]
    pub search: SearchProviderConfig,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub parser: ParserSection,
    #[serde(default)]
    pub log: LogSection,
}

/// `[agent]` — conversation loop behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub max_turns: usize,
    pub single_call_per_turn: bool,
    pub tool_timeout_ms: u64,
    pub session_deadline_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        let defaults = LoopConfig::default();
        Self {
            max_turns: defaults.max_turns,
            single_call_per_turn: defaults.single_call_per_turn,
            tool_timeout_ms: defaults.tool_timeout_ms,
            session_deadline_ms: defaults.session_deadline_ms,
            retry_max_attempts: 3,
            retry_base_delay_ms: 250,
        }
    }
}

/// `[parser]` — tool-call wire convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserSection {
    /// Marker token introducing a tagged-text tool call.
    pub marker: String,
}

impl Default for ParserSection {
    fn default() -> Self {
        Self {
            marker: harbor_domain::DEFAULT_MARKER.to_string(),
        }
    }
}

/// `[log]` — structured conversation logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSection {
    /// Path for the JSONL conversation log; disabled when unset.
    pub conversation_log: Option<PathBuf>,
}

impl FileConfig {
    /// Assemble the orchestrator's [`LoopConfig`] from the file sections.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_turns: self.agent.max_turns,
            single_call_per_turn: self.agent.single_call_per_turn,
            tool_timeout_ms: self.agent.tool_timeout_ms,
            session_deadline_ms: self.agent.session_deadline_ms,
            marker: self.parser.marker.clone(),
        }
    }

    /// Assemble the gateway retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.agent.retry_max_attempts,
            base_delay: std::time::Duration::from_millis(self.agent.retry_base_delay_ms),
        }
    }
}
