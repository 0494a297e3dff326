//! Web search port
//!
//! A second provider capability alongside chat completion. Exposed to
//! embedded scripts through the scripting bridge as `harbor.web.search`.

use super::llm_gateway::GatewayError;
use async_trait::async_trait;

/// Port for web search backends.
#[async_trait]
pub trait WebSearchPort: Send + Sync {
    /// Search the web and return a formatted text snippet.
    async fn search(&self, query: &str) -> Result<String, GatewayError>;
}
