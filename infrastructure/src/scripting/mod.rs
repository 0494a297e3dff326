//! Lua embedding bridge
//!
//! Provides the [`LuaScriptingEngine`] that implements `ScriptingEnginePort`
//! from the application layer, backed by mlua (Lua 5.4).
//!
//! # Modules
//!
//! - `sandbox` — C module blocking for safety
//! - `value` — Lua ↔ JSON value conversion
//! - `tools_api` — `harbor.tools.register` / `harbor.tools.call`
//! - `providers_api` — `harbor.llm.chat` / `harbor.web.search`
//! - `engine` — Main engine struct tying everything together

mod engine;
mod providers_api;
mod sandbox;
mod tools_api;
mod value;

pub use engine::LuaScriptingEngine;
