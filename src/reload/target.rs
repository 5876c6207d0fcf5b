//! The decorated definition a proxy stands in for.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use super::error::ReloadError;
use crate::script::{Class, Function, Module};

/// What kind of definition is being reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Class,
    Function,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Class => "class",
            Kind::Function => "function",
        })
    }
}

/// Immutable record of the original definition.
///
/// Captured once at decoration time. Every reload locates the definition
/// by this name and kind in this file, no matter how many reloads happened
/// since.
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    kind: Kind,
    path: PathBuf,
    module: Weak<Module>,
}

impl Target {
    pub fn of_class(class: &Class) -> Self {
        Self {
            name: class.name.clone(),
            kind: Kind::Class,
            path: class.origin.path.clone(),
            module: class.module.clone(),
        }
    }

    pub fn of_function(function: &Function) -> Self {
        Self {
            name: function.name.clone(),
            kind: Kind::Function,
            path: function.origin.path.clone(),
            module: function.module.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Declaring file of the original definition.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Namespace the definition is re-executed in.
    pub fn module(&self) -> Result<Arc<Module>, ReloadError> {
        self.module
            .upgrade()
            .ok_or_else(|| ReloadError::Detached(self.name.clone()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`", self.kind, self.name)
    }
}
