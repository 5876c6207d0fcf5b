//! Script modules: one source file and its global namespace.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::error::{RuntimeError, ScriptError};
use super::value::Value;
use super::{interp, parser};
use crate::reload::Proxy;
use crate::utils::path::normalize_path;

/// The namespace a script file executes in.
pub struct Module {
    name: String,
    path: PathBuf,
    globals: RwLock<FxHashMap<String, Value>>,
}

impl Module {
    /// Create an empty module bound to `path`.
    pub fn new(path: impl AsRef<Path>) -> Arc<Self> {
        let path = normalize_path(path.as_ref());
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("main")
            .to_string();
        Arc::new(Self {
            name,
            path,
            globals: RwLock::new(FxHashMap::default()),
        })
    }

    /// Read, parse and execute a script file.
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>, ScriptError> {
        let module = Self::new(path);
        let source = fs::read_to_string(&module.path)
            .map_err(|e| ScriptError::Io(module.path.clone(), e))?;
        let program = parser::parse(&module.path, &source)?;
        crate::debug!("load"; "executing {}", module.path.display());
        interp::exec_module(&module, &program)?;
        Ok(module)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring file of every definition in this module.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.read().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.globals.write().insert(name.to_string(), value);
    }

    /// Global names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.globals.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Call a global callable by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let callee = self
            .get(name)
            .ok_or_else(|| RuntimeError::UndefinedName(name.to_string()))?;
        interp::call_value(&callee, args)
    }

    /// Every reload proxy bound in this module's globals, sorted by name.
    pub fn proxies(&self) -> Vec<Proxy> {
        let globals = self.globals.read();
        let mut entries: Vec<_> = globals
            .iter()
            .filter_map(|(name, value)| value.as_proxy().map(|p| (name.clone(), p.clone())))
            .collect();
        drop(globals);
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, proxy)| proxy).collect()
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
