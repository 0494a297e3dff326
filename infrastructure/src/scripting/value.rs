//! Lua ↔ JSON value conversion.
//!
//! Tool arguments and results cross the embedding boundary as tagged JSON
//! values, so both sides agree on the representable shapes: nil/null,
//! booleans, numbers, strings, sequences, and string-keyed mappings.
//! Functions, userdata, and other Lua-only values are rejected with an
//! error string rather than silently dropped.

use mlua::prelude::*;
use std::collections::HashMap;

/// Convert a Lua value into a JSON value.
///
/// Tables with a non-empty array part become JSON arrays (indices 1..=len);
/// all other tables become objects with stringified keys.
pub fn lua_to_json(value: &LuaValue) -> Result<serde_json::Value, String> {
    match value {
        LuaValue::Nil => Ok(serde_json::Value::Null),
        LuaValue::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
        LuaValue::Integer(i) => Ok(serde_json::Value::Number((*i).into())),
        LuaValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| format!("non-finite number {} is not representable", n)),
        LuaValue::String(s) => Ok(serde_json::Value::String(s.to_string_lossy().to_string())),
        LuaValue::Table(table) => table_to_json(table),
        other => Err(format!(
            "Lua {} cannot cross the tool boundary",
            other.type_name()
        )),
    }
}

fn table_to_json(table: &LuaTable) -> Result<serde_json::Value, String> {
    let len = table.raw_len();
    if len > 0 {
        let mut array = Vec::with_capacity(len);
        for i in 1..=len {
            let item: LuaValue = table.raw_get(i).map_err(|e| e.to_string())?;
            array.push(lua_to_json(&item)?);
        }
        return Ok(serde_json::Value::Array(array));
    }

    let mut map = serde_json::Map::new();
    for pair in table.clone().pairs::<LuaValue, LuaValue>() {
        let (key, val) = pair.map_err(|e| e.to_string())?;
        let key = match key {
            LuaValue::String(s) => s.to_string_lossy().to_string(),
            LuaValue::Integer(i) => i.to_string(),
            LuaValue::Number(n) => n.to_string(),
            other => {
                return Err(format!(
                    "table key of type {} is not representable",
                    other.type_name()
                ));
            }
        };
        map.insert(key, lua_to_json(&val)?);
    }
    Ok(serde_json::Value::Object(map))
}

/// Convert a JSON value into a Lua value.
pub fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> LuaResult<LuaValue> {
    match value {
        serde_json::Value::Null => Ok(LuaValue::Nil),
        serde_json::Value::Bool(b) => Ok(LuaValue::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(LuaValue::Integer(i))
            } else {
                Ok(LuaValue::Number(n.as_f64().unwrap_or(f64::NAN)))
            }
        }
        serde_json::Value::String(s) => Ok(LuaValue::String(lua.create_string(s)?)),
        serde_json::Value::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, json_to_lua(lua, item)?)?;
            }
            Ok(LuaValue::Table(table))
        }
        serde_json::Value::Object(map) => {
            let table = lua.create_table()?;
            for (key, val) in map {
                table.raw_set(key.as_str(), json_to_lua(lua, val)?)?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}

/// Build a Lua table from a tool-argument map.
pub fn json_map_to_table(
    lua: &Lua,
    map: &HashMap<String, serde_json::Value>,
) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    for (key, val) in map {
        table.raw_set(key.as_str(), json_to_lua(lua, val)?)?;
    }
    Ok(table)
}

/// Read a Lua table as a tool-argument map.
pub fn table_to_json_map(
    table: &LuaTable,
) -> Result<HashMap<String, serde_json::Value>, String> {
    match table_to_json(table)? {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        serde_json::Value::Array(_) => Err("tool arguments must be a table of named values".into()),
        _ => Err("tool arguments must be a table".into()),
    }
}
