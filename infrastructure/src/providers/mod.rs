//! Provider adapters
//!
//! Concrete backends for the application layer's provider ports:
//!
//! - [`chat::HttpChatGateway`] — OpenAI-compatible chat completions over HTTP
//! - [`retry::RetryingGateway`] — exponential-backoff wrapper for any gateway
//! - [`search::DuckDuckGoSearch`] — DuckDuckGo Instant Answer web search

pub mod chat;
pub mod retry;
pub mod search;

pub use chat::{ChatProviderConfig, HttpChatGateway};
pub use retry::{RetryPolicy, RetryingGateway};
pub use search::{DuckDuckGoSearch, SearchProviderConfig};
