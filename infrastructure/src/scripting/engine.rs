//! Main Lua scripting engine — ties together sandbox, tools API, and
//! provider API.
//!
//! `LuaScriptingEngine` implements `ScriptingEnginePort` from the
//! application layer, providing the concrete Lua 5.4 runtime backed by mlua.
//! Loading a script runs it once to completion; everything the script
//! registers lands in the shared [`ToolRegistry`], and the provider
//! capabilities stay callable for the lifetime of the engine (including
//! re-entrantly from inside tool handlers).

use mlua::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use harbor_application::ports::llm_gateway::LlmGateway;
use harbor_application::ports::scripting_engine::{ScriptError, ScriptingEnginePort};
use harbor_application::ports::web_search::WebSearchPort;

use super::providers_api::register_providers_api;
use super::sandbox::apply_sandbox;
use super::tools_api::register_tools_api;
use crate::tools::registry::ToolRegistry;

/// Lua 5.4 scripting engine implementing `ScriptingEnginePort`.
///
/// The `Lua` handle is internally synchronized, so the engine is shareable
/// across threads; nested calls from the script thread are reentrant.
pub struct LuaScriptingEngine {
    lua: Lua,
}

impl LuaScriptingEngine {
    /// Create a new engine wired to the shared registry and providers.
    ///
    /// Sets up the VM with:
    /// - Sandbox (C module blocking)
    /// - `harbor.tools.{register,call}`
    /// - `harbor.llm.chat` / `harbor.web.search`
    /// - `harbor.interrupted()` — the session cancellation flag
    pub fn new(
        registry: Arc<ToolRegistry>,
        gateway: Arc<dyn LlmGateway>,
        search: Arc<dyn WebSearchPort>,
        cancel: CancellationToken,
    ) -> Result<Self, ScriptError> {
        let lua = Lua::new();

        apply_sandbox(&lua).map_err(|e| ScriptError {
            message: format!("sandbox setup failed: {}", e),
        })?;

        let harbor = lua.create_table().map_err(lua_to_script_error)?;

        register_tools_api(&lua, &harbor, registry).map_err(lua_to_script_error)?;
        register_providers_api(&lua, &harbor, gateway, search).map_err(lua_to_script_error)?;

        // harbor.interrupted() — cooperative cancellation flag for handlers
        {
            let token = cancel.clone();
            let interrupted_fn = lua
                .create_function(move |_, ()| Ok(token.is_cancelled()))
                .map_err(lua_to_script_error)?;
            harbor
                .set("interrupted", interrupted_fn)
                .map_err(lua_to_script_error)?;
        }

        lua.globals()
            .set("harbor", harbor)
            .map_err(lua_to_script_error)?;

        Ok(Self { lua })
    }

    /// Expose the script path and trailing CLI arguments as the Lua `arg`
    /// table (`arg[0]` = script path, `arg[1..]` = arguments).
    pub fn set_script_args(&self, script_path: &str, args: &[String]) -> Result<(), ScriptError> {
        let table = self.lua.create_table().map_err(lua_to_script_error)?;
        table.set(0, script_path).map_err(lua_to_script_error)?;
        for (i, arg) in args.iter().enumerate() {
            table
                .set(i + 1, arg.as_str())
                .map_err(lua_to_script_error)?;
        }
        self.lua
            .globals()
            .set("arg", table)
            .map_err(lua_to_script_error)
    }
}

impl ScriptingEnginePort for LuaScriptingEngine {
    fn load_script(&self, path: &Path) -> Result<(), ScriptError> {
        let content = std::fs::read_to_string(path).map_err(|e| ScriptError {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;

        self.lua
            .load(&content)
            .set_name(path.to_string_lossy())
            .exec()
            .map_err(lua_to_script_error)
    }

    fn eval(&self, source: &str) -> Result<(), ScriptError> {
        self.lua.load(source).exec().map_err(lua_to_script_error)
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Convert an mlua error to a ScriptError.
fn lua_to_script_error(e: LuaError) -> ScriptError {
    ScriptError {
        message: e.to_string(),
    }
}
