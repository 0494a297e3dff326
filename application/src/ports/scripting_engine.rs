//! Scripting engine port — interface for the embedded script runtime.
//!
//! This port abstracts the scripting engine so that the application and CLI
//! layers don't depend on mlua, and a no-op implementation is always
//! available for tests.

use std::path::Path;

/// Error from a scripting engine operation.
#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "script error: {}", self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Port for the embedding bridge.
///
/// Loading a script runs it once to completion; during that run the script
/// registers tools into the shared registry and may call the provider
/// capabilities directly. Script failures are returned as values, never
/// allowed to take the host process down.
pub trait ScriptingEnginePort: Send + Sync {
    /// Load and execute a script file.
    fn load_script(&self, path: &Path) -> Result<(), ScriptError>;

    /// Evaluate a script from a string (used by fixtures and tests).
    fn eval(&self, source: &str) -> Result<(), ScriptError>;

    /// Whether a real engine is present (i.e. not [`NoScriptingEngine`]).
    fn is_available(&self) -> bool;
}

/// No-op scripting engine for tests and headless configurations.
pub struct NoScriptingEngine;

impl ScriptingEnginePort for NoScriptingEngine {
    fn load_script(&self, _path: &Path) -> Result<(), ScriptError> {
        Ok(())
    }

    fn eval(&self, _source: &str) -> Result<(), ScriptError> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}
