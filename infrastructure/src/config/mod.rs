//! Configuration file loading
//!
//! Serde-typed [`FileConfig`] sections merged from multiple sources by
//! [`ConfigLoader`] (figment: defaults → global config → project file →
//! explicit path).

pub mod file_config;
pub mod loader;

pub use file_config::{AgentSection, FileConfig, LogSection};
pub use loader::ConfigLoader;
