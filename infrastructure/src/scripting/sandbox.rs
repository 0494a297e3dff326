//! Lua sandbox — blocks C module loading for ABI safety.
//!
//! User scripts are trusted (it's their own script file), but C extension
//! modules are blocked to prevent ABI incompatibility crashes.

use mlua::prelude::*;

/// Apply sandbox restrictions to the Lua VM.
///
/// Currently blocks:
/// - `package.loadlib` — prevents loading arbitrary .so/.dll
/// - `package.cpath` — clears the C module search path
///
/// Standard library functions like `string`, `table`, `math` remain
/// available.
pub fn apply_sandbox(lua: &Lua) -> LuaResult<()> {
    lua.load(
        r#"
        -- Block C module loading (ABI safety)
        package.loadlib = nil
        package.cpath = ''
    "#,
    )
    .exec()
}
