//! Tool system infrastructure
//!
//! The [`ToolRegistry`](registry::ToolRegistry) is the single shared table
//! mapping tool names to script-contributed handlers. Registration happens
//! at script-load time through the embedding bridge; dispatch happens from
//! the conversation loop and from `harbor.tools.call`.

pub mod registry;

pub use registry::{RegisteredTool, ToolRegistry};
