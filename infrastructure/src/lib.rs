//! Infrastructure layer for harbor
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the shared tool registry, the Lua embedding bridge,
//! HTTP provider adapters, structured conversation logging, and
//! configuration file loading.

pub mod config;
pub mod logging;
pub mod providers;
pub mod scripting;
pub mod tools;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig};
pub use logging::JsonlConversationLogger;
pub use providers::{
    chat::{ChatProviderConfig, HttpChatGateway},
    retry::{RetryPolicy, RetryingGateway},
    search::{DuckDuckGoSearch, SearchProviderConfig},
};
pub use scripting::LuaScriptingEngine;
pub use tools::registry::{RegisteredTool, ToolRegistry};
