//! Application layer for harbor
//!
//! This crate contains use cases, port definitions, and application
//! configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::LoopConfig;
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    llm_gateway::{GatewayError, LlmGateway},
    scripting_engine::{NoScriptingEngine, ScriptError, ScriptingEnginePort},
    tool_executor::ToolExecutorPort,
    web_search::WebSearchPort,
};
pub use use_cases::run_conversation::{
    RunConversationError, RunConversationInput, RunConversationOutput, RunConversationUseCase,
};
