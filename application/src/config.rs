//! Application configuration — behavior knobs for the conversation loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one conversation session.
///
/// Loaded from the `[agent]` and `[parser]` sections of the config file and
/// passed to the orchestrator at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Maximum number of model calls before the session aborts.
    pub max_turns: usize,
    /// Dispatch only the first parsed call of each model turn.
    pub single_call_per_turn: bool,
    /// Per-tool-call budget in milliseconds.
    pub tool_timeout_ms: u64,
    /// Overall session deadline in milliseconds (0 disables it).
    pub session_deadline_ms: u64,
    /// Tagged-text marker the parser recognizes.
    pub marker: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: 8,
            single_call_per_turn: false,
            tool_timeout_ms: 30_000,
            session_deadline_ms: 300_000,
            marker: harbor_domain::DEFAULT_MARKER.to_string(),
        }
    }
}

impl LoopConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    /// `None` when the deadline is disabled.
    pub fn session_deadline(&self) -> Option<Duration> {
        if self.session_deadline_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.session_deadline_ms))
        }
    }
}
