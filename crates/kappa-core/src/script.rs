//! Scripting bridge
//!
//! One Lua state per profile. Imported modules run in order in that state, so
//! later modules see globals defined by earlier ones. Resource values cross the
//! boundary through an explicit marshalling step in each direction.

use kappa_common::{Scalar, ScriptError, Value};
use mlua::{Function, Lua, MultiValue};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A global script function resolved once at load time
#[derive(Clone)]
pub struct ScriptFunction {
    name: String,
    function: Function,
}

impl std::fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug)]
pub struct ScriptBridge {
    lua: Lua,
}

impl Default for ScriptBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptBridge {
    /// An empty interpreter with the standard libraries
    pub fn new() -> Self {
        Self { lua: Lua::new() }
    }

    /// Create an interpreter and execute every module in order
    pub fn load_modules(paths: &[PathBuf]) -> Result<Self, ScriptError> {
        let bridge = Self::new();
        for path in paths {
            bridge.load_file(path)?;
        }
        Ok(bridge)
    }

    pub fn load_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|e| ScriptError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.load_source(&path.display().to_string(), &source)
    }

    /// Execute a chunk of Lua source under the given chunk name
    pub fn load_source(&self, name: &str, source: &str) -> Result<(), ScriptError> {
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .map_err(|e| ScriptError::Load {
                path: name.to_string(),
                message: e.to_string(),
            })?;
        debug!(target: "kappa_core::script", "Loaded script module {}", name);
        Ok(())
    }

    /// Resolve a global function by name
    pub fn resolve(&self, name: &str) -> Result<ScriptFunction, ScriptError> {
        self.lookup(name)
            .ok_or_else(|| ScriptError::MissingFunction(name.to_string()))
    }

    /// Like [`resolve`](Self::resolve), returning `None` when the global is
    /// absent or is not a function
    pub fn lookup(&self, name: &str) -> Option<ScriptFunction> {
        match self.lua.globals().get::<mlua::Value>(name) {
            Ok(mlua::Value::Function(function)) => Some(ScriptFunction {
                name: name.to_string(),
                function,
            }),
            _ => None,
        }
    }

    /// Call a function with positional arguments and read back its single
    /// return value
    pub fn call(&self, function: &ScriptFunction, args: &[Value]) -> Result<Value, ScriptError> {
        let call_error = |e: mlua::Error| ScriptError::Call {
            function: function.name.clone(),
            message: e.to_string(),
        };

        let lua_args = args
            .iter()
            .map(|arg| to_lua(&self.lua, arg))
            .collect::<mlua::Result<Vec<_>>>()
            .map_err(call_error)?;

        trace!(target: "kappa_core::script", "Calling {} with {} args", function.name, args.len());
        let result = function
            .function
            .call::<mlua::Value>(MultiValue::from_vec(lua_args))
            .map_err(call_error)?;

        from_lua(&function.name, result)
    }
}

fn scalar_to_lua(lua: &Lua, scalar: Scalar) -> mlua::Result<mlua::Value> {
    Ok(match scalar {
        Scalar::Bool(b) => mlua::Value::Boolean(b),
        Scalar::Float32(v) => mlua::Value::Number(v as f64),
        Scalar::Float64(v) => mlua::Value::Number(v),
        Scalar::Char(c) => mlua::Value::String(lua.create_string(c.to_string())?),
        Scalar::Int8(v) => mlua::Value::Integer(v as i64),
        Scalar::UInt8(v) => mlua::Value::Integer(v as i64),
        Scalar::Int16(v) => mlua::Value::Integer(v as i64),
        Scalar::UInt16(v) => mlua::Value::Integer(v as i64),
        Scalar::Int32(v) => mlua::Value::Integer(v as i64),
        Scalar::UInt32(v) => mlua::Value::Integer(v as i64),
        Scalar::Int64(v) => mlua::Value::Integer(v),
        Scalar::UInt64(v) => match i64::try_from(v) {
            Ok(i) => mlua::Value::Integer(i),
            Err(_) => mlua::Value::Number(v as f64),
        },
    })
}

fn to_lua(lua: &Lua, value: &Value) -> mlua::Result<mlua::Value> {
    match value {
        Value::Scalar(scalar) => scalar_to_lua(lua, *scalar),
        Value::Text(text) => Ok(mlua::Value::String(lua.create_string(text)?)),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| scalar_to_lua(lua, *item))
                .collect::<mlua::Result<Vec<_>>>()?;
            Ok(mlua::Value::Table(lua.create_sequence_from(items)?))
        }
    }
}

fn from_lua(function: &str, value: mlua::Value) -> Result<Value, ScriptError> {
    match value {
        mlua::Value::Boolean(b) => Ok(Value::Scalar(Scalar::Bool(b))),
        mlua::Value::Integer(i) => Ok(Value::Scalar(Scalar::Int64(i))),
        mlua::Value::Number(n) => Ok(Value::Scalar(Scalar::Float64(n))),
        mlua::Value::String(s) => Ok(Value::Text(s.to_string_lossy())),
        other => Err(ScriptError::UnsupportedReturn {
            function: function.to_string(),
            kind: other.type_name().to_string(),
        }),
    }
}
