//! Tool domain module
//!
//! Defines how embedded scripts expose capabilities to the model: every tool
//! is described by a [`ToolDefinition`] (name + parameter schema), invoked
//! via a [`ToolCall`], and produces a [`ToolResult`].
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ ToolSpec     │───▶│ ToolCall     │───▶│ ToolResult   │
//! │ (catalog)    │    │ (invocation) │    │ (outcome)    │
//! └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ToolSpec`] — catalog of tool definitions, snapshot of the registry
//! - [`ToolDefinition`] — schema for a single tool (name, parameters)
//! - [`ToolCall`] — an invocation request with tagged-value arguments
//! - [`ToolResult`] — execution outcome: success value or [`ToolError`]
//! - [`ToolValidator`] — pure domain trait for argument validation
//! - [`ToolHandler`] — the callable a script contributed for a tool
//!
//! # Architecture
//!
//! - **Domain** (this module): pure definitions, no I/O
//! - **Application** (`ToolExecutorPort`): port trait for dispatch
//! - **Infrastructure** (`ToolRegistry`): the shared name → handler table
//!   with timeout and error capture

pub mod entities;
pub mod traits;
pub mod value_objects;

pub use entities::{ToolCall, ToolDefinition, ToolParameter, ToolSpec};
pub use traits::{DefaultToolValidator, FnToolHandler, ToolHandler, ToolValidator};
pub use value_objects::{ToolError, ToolResult};
