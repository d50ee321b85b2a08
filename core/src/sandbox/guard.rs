use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::interpreter::Capability;
use crate::interpreter::CapabilityHandle;
use crate::interpreter::ScriptErrorKind;
use crate::interpreter::ImportHook;
use crate::interpreter::ImportHookHandle;
use crate::interpreter::ScriptError;

pub(crate) fn exclusion_message(marker: &str, name: &str) -> String {
    format!("{marker}: don't use {name}")
}

/// Stands in for a forbidden builtin: every call fails.
pub(crate) struct ExclusionGuard {
    name: String,
    marker: String,
}

impl ExclusionGuard {
    pub(crate) fn new(name: &str, marker: &str) -> Self {
        Self {
            name: name.to_string(),
            marker: marker.to_string(),
        }
    }
}

impl Capability for ExclusionGuard {
    fn call(&self, _args: &[Value]) -> Result<Value, ScriptError> {
        Err(ScriptError::exclusion(exclusion_message(
            &self.marker,
            &self.name,
        )))
    }
}

/// Hands test code the builtins shadowed for the run:
/// `__move_forward__("sorted", xs)` calls the original `sorted` on `xs`.
pub(crate) struct MoveForward {
    originals: BTreeMap<String, CapabilityHandle>,
}

impl MoveForward {
    pub(crate) fn new(originals: BTreeMap<String, CapabilityHandle>) -> Self {
        Self { originals }
    }
}

impl Capability for MoveForward {
    fn call(&self, args: &[Value]) -> Result<Value, ScriptError> {
        let Some((Value::String(name), rest)) = args.split_first() else {
            return Err(type_error("the name of a builtin is required".to_string()));
        };
        let original = self
            .originals
            .get(name)
            .ok_or_else(|| type_error(format!("'{name}' is not a shadowed builtin")))?;
        original.call(rest)
    }
}

fn type_error(message: String) -> ScriptError {
    ScriptError::new(ScriptErrorKind::Other, "TypeError", message)
}

/// Wraps the interpreter's import hook. Only the root package of a dotted
/// path is matched, so forbidding `os` also forbids `os.path`.
pub(crate) struct ImportGuard {
    forbidden: BTreeSet<String>,
    marker: String,
    inner: ImportHookHandle,
}

impl ImportGuard {
    pub(crate) fn new(forbidden: BTreeSet<String>, marker: &str, inner: ImportHookHandle) -> Self {
        Self {
            forbidden,
            marker: marker.to_string(),
            inner,
        }
    }
}

impl ImportHook for ImportGuard {
    fn import(&self, module: &str) -> Result<(), ScriptError> {
        let root = module.split('.').next().unwrap_or(module);
        if self.forbidden.contains(root) {
            return Err(ScriptError::exclusion(exclusion_message(&self.marker, root)));
        }
        self.inner.import(module)
    }
}
