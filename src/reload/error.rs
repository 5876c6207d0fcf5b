//! Reload error types.

use std::path::PathBuf;
use thiserror::Error;

use super::target::Kind;
use crate::script::{RuntimeError, SyntaxError};

/// Everything that can go wrong while reloading a definition.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("cannot read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("no {kind} named `{name}` in `{}`", .path.display())]
    NotFound {
        kind: Kind,
        name: String,
        path: PathBuf,
    },

    #[error("module owning `{0}` has been dropped")]
    Detached(String),

    #[error("re-executing definition failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("only classes and functions can be reloaded, got {0}")]
    Unsupported(&'static str),

    #[error("reload interval must be positive")]
    InvalidInterval,

    #[error("file watcher error")]
    Watch(#[from] notify::Error),

    #[error("cannot spawn reload thread")]
    Spawn(#[source] std::io::Error),
}

impl ReloadError {
    /// Errors caused by the file being mid-edit: reported, then the
    /// previous implementation stays live.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReloadError::Io(..) | ReloadError::Syntax(_) | ReloadError::NotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_recoverable_classes() {
        let syntax = SyntaxError::at(Path::new("a.rl"), "fn", Default::default(), "bad");
        let not_found = ReloadError::NotFound {
            kind: Kind::Class,
            name: "Car".into(),
            path: PathBuf::from("a.rl"),
        };
        let io = ReloadError::Io(
            PathBuf::from("a.rl"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );

        assert!(ReloadError::from(syntax).is_recoverable());
        assert!(not_found.is_recoverable());
        assert!(io.is_recoverable());
        assert!(!ReloadError::from(RuntimeError::DivisionByZero).is_recoverable());
        assert!(!ReloadError::Detached("Car".into()).is_recoverable());
    }

    #[test]
    fn test_not_found_message() {
        let err = ReloadError::NotFound {
            kind: Kind::Function,
            name: "move_z".into(),
            path: PathBuf::from("demo.rl"),
        };
        assert_eq!(err.to_string(), "no function named `move_z` in `demo.rl`");
    }
}
