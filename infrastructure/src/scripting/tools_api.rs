//! `harbor.tools` Lua API — tool registration and direct invocation.
//!
//! Scripts contribute tools with an explicit registration call:
//!
//! ```lua
//! harbor.tools.register("soma", {
//!     description = "Sum two numbers",
//!     parameters = {
//!         a = { type = "number", description = "First addend", required = true },
//!         b = { type = "number", description = "Second addend", required = true },
//!     }
//! }, function(args)
//!     return args.a + args.b
//! end)
//! ```
//!
//! The schema table is optional — `harbor.tools.register(name, fn)` registers
//! a tool that accepts any arguments. Registration is idempotent by
//! overwrite: re-loading a script replaces handlers instead of failing.
//!
//! `harbor.tools.call(name, args)` dispatches directly, bypassing the
//! conversation loop, with the registry's full validation, timeout, and
//! error-capture semantics. Failures surface as Lua errors carrying the
//! outcome code.

use mlua::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use harbor_application::ports::tool_executor::ToolExecutorPort;
use harbor_domain::{ToolCall, ToolDefinition, ToolError, ToolHandler, ToolParameter};

use super::value;
use crate::tools::registry::ToolRegistry;

/// Handler backed by a Lua function held in the VM registry.
///
/// The `Lua` handle is internally synchronized (reentrant per thread), so
/// the handler may be invoked from a blocking worker or re-entrantly from
/// within a running script.
struct LuaToolHandler {
    lua: Lua,
    key: LuaRegistryKey,
}

impl ToolHandler for LuaToolHandler {
    fn invoke(
        &self,
        args: &HashMap<String, serde_json::Value>,
    ) -> Result<serde_json::Value, String> {
        let func: LuaFunction = self
            .lua
            .registry_value(&self.key)
            .map_err(|e| format!("handler lookup failed: {}", e))?;
        let args_table =
            value::json_map_to_table(&self.lua, args).map_err(|e| e.to_string())?;
        let result: LuaValue = func.call(args_table).map_err(|e| e.to_string())?;
        value::lua_to_json(&result)
    }
}

/// Register the `harbor.tools` table on the given `harbor` global.
pub fn register_tools_api(
    lua: &Lua,
    harbor_table: &LuaTable,
    registry: Arc<ToolRegistry>,
) -> LuaResult<()> {
    let tools = lua.create_table()?;

    // harbor.tools.register(name, opts, handler) or (name, handler)
    {
        let reg = Arc::clone(&registry);
        let register_fn = lua.create_function(
            move |lua, (name, second, third): (String, LuaValue, Option<LuaFunction>)| {
                if name.is_empty() {
                    return Err(LuaError::external("tool name cannot be empty"));
                }

                let (definition, handler_fn) = match third {
                    Some(handler_fn) => {
                        let LuaValue::Table(opts) = second else {
                            return Err(LuaError::external(
                                "expected an options table before the handler",
                            ));
                        };
                        (definition_from_opts(&name, &opts)?, handler_fn)
                    }
                    None => {
                        let LuaValue::Function(handler_fn) = second else {
                            return Err(LuaError::external("expected a handler function"));
                        };
                        let definition =
                            ToolDefinition::new(&name, format!("Script tool '{}'", name));
                        (definition, handler_fn)
                    }
                };

                let key = lua.create_registry_value(handler_fn)?;
                let handler = LuaToolHandler {
                    lua: lua.clone(),
                    key,
                };
                reg.register(definition, Arc::new(handler));
                Ok(())
            },
        )?;
        tools.set("register", register_fn)?;
    }

    // harbor.tools.call(name, args)
    {
        let reg = Arc::clone(&registry);
        let call_fn =
            lua.create_function(move |lua, (name, args): (String, Option<LuaTable>)| {
                let mut call = ToolCall::new(&name);
                if let Some(args) = args {
                    call.arguments =
                        value::table_to_json_map(&args).map_err(LuaError::external)?;
                }

                let result = reg.dispatch_blocking(&call);
                if result.success {
                    let output = result.output.unwrap_or(serde_json::Value::Null);
                    value::json_to_lua(lua, &output)
                } else {
                    let error = result
                        .error
                        .unwrap_or_else(|| ToolError::execution_failed("unknown failure"));
                    Err(LuaError::external(error.to_string()))
                }
            })?;
        tools.set("call", call_fn)?;
    }

    harbor_table.set("tools", tools)?;
    Ok(())
}

/// Build a [`ToolDefinition`] from the Lua options table.
fn definition_from_opts(name: &str, opts: &LuaTable) -> LuaResult<ToolDefinition> {
    let description: String = opts
        .get("description")
        .unwrap_or_else(|_| format!("Script tool '{}'", name));

    let mut definition = ToolDefinition::new(name, description);

    if let Ok(params_table) = opts.get::<LuaTable>("parameters") {
        for pair in params_table.pairs::<String, LuaTable>() {
            let (param_name, param_opts) = pair?;
            let param_type: String = param_opts
                .get("type")
                .unwrap_or_else(|_| "string".to_string());
            let param_desc: String = param_opts.get("description").unwrap_or_default();
            let required: bool = param_opts.get("required").unwrap_or(false);
            definition = definition.with_parameter(
                ToolParameter::new(param_name, param_desc, required).with_type(param_type),
            );
        }
    }

    Ok(definition)
}
