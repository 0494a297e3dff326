//! Application use cases

pub mod run_conversation;

pub use run_conversation::{
    RunConversationError, RunConversationInput, RunConversationOutput, RunConversationUseCase,
};
