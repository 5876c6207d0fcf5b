//! Definition re-executor.

use std::sync::Arc;

use super::error::ReloadError;
use super::locate::locate;
use super::target::{Kind, Target};
use crate::script::{Class, Function, Value, interp, parser};

/// Re-extract the target's source and execute it in its owning module.
///
/// The fragment runs with the module's globals as enclosing environment and
/// a fresh local scope, so imports and sibling globals resolve while the
/// module's own binding (usually the proxy) is left alone. Returns the
/// symbol bound to the target's name in that scope.
///
/// Side effects of the fragment (class field initialisers calling into the
/// module, for instance) happen for real.
pub fn reload_target(target: &Target) -> Result<Value, ReloadError> {
    let source = locate(target)?;
    let module = target.module()?;
    let program = parser::parse(target.path(), &source)?;

    crate::debug!("reload"; "re-executing {} ({} bytes)", target, source.len());
    let mut locals = interp::exec_fragment(&module, &program)?;

    let symbol = locals.remove(target.name());
    match (target.kind(), symbol) {
        (Kind::Class, Some(value @ Value::Class(_)))
        | (Kind::Function, Some(value @ Value::Function(_))) => Ok(value),
        _ => Err(ReloadError::NotFound {
            kind: target.kind(),
            name: target.name().to_string(),
            path: target.path().to_path_buf(),
        }),
    }
}

pub fn reload_class(target: &Target) -> Result<Arc<Class>, ReloadError> {
    match reload_target(target)? {
        Value::Class(class) => Ok(class),
        other => Err(ReloadError::Unsupported(other.type_name())),
    }
}

pub fn reload_function(target: &Target) -> Result<Arc<Function>, ReloadError> {
    match reload_target(target)? {
        Value::Function(function) => Ok(function),
        other => Err(ReloadError::Unsupported(other.type_name())),
    }
}
