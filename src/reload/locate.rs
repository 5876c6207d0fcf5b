//! Source locator: find the current text of one definition in its file.

use std::fs;
use std::path::Path;

use super::error::ReloadError;
use super::target::{Kind, Target};
use crate::script::ast::Definition;
use crate::script::parser;

/// Read the target's file and extract its definition.
///
/// Read-only. The returned text starts at the `fn`/`class` keyword, so
/// decorator lines are never part of it.
pub fn locate(target: &Target) -> Result<String, ReloadError> {
    let path = target.path();
    let source = fs::read_to_string(path).map_err(|e| ReloadError::Io(path.to_path_buf(), e))?;
    locate_in(path, &source, target.name(), target.kind())
}

/// Extract the first top-level definition named `name` of `kind`.
pub fn locate_in(path: &Path, source: &str, name: &str, kind: Kind) -> Result<String, ReloadError> {
    let program = parser::parse(path, source)?;
    program
        .definitions()
        .find(|def| def.name() == name && kind_of(def) == kind)
        .map(|def| def.def_span().slice(source).to_string())
        .ok_or_else(|| ReloadError::NotFound {
            kind,
            name: name.to_string(),
            path: path.to_path_buf(),
        })
}

fn kind_of(def: &Definition<'_>) -> Kind {
    match def {
        Definition::Fn(_) => Kind::Function,
        Definition::Class(_) => Kind::Class,
    }
}
