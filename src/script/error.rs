//! Script error types.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::token::Span;

// ============================================================================
// SyntaxError
// ============================================================================

/// Source text that cannot be tokenized or parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub path: PathBuf,
    /// 1-based line
    pub line: usize,
    /// 1-based column (in chars)
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    /// Build an error located at the start of `span` inside `source`.
    pub fn at(path: &Path, source: &str, span: Span, message: impl Into<String>) -> Self {
        let (line, column) = line_col(source, span.start);
        Self {
            path: path.to_path_buf(),
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: syntax error: {}",
            self.path.display(),
            self.line,
            self.column,
            self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Convert a byte offset into a 1-based (line, column) pair.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit_once('\n')
        .map_or(before, |(_, tail)| tail)
        .chars()
        .count()
        + 1;
    (line, column)
}

// ============================================================================
// RuntimeError
// ============================================================================

/// Errors raised while evaluating script code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("undefined name `{0}`")]
    UndefinedName(String),

    #[error("`{ty}` has no attribute `{name}`")]
    NoAttribute { ty: String, name: String },

    #[error("`{0}` is not callable")]
    NotCallable(String),

    #[error("`{name}` expects {expected} argument{}, got {got}", plural(.expected))]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("`{0}` outlived its module")]
    ModuleDropped(String),

    #[error("`{0}` outside of a loop")]
    LoopControl(&'static str),

    #[error("maximum call depth ({0}) exceeded")]
    CallDepth(usize),

    #[error("reload failed: {0}")]
    Reload(String),

    #[error("interrupted")]
    Interrupted,
}

fn plural(n: &usize) -> &'static str {
    if *n == 1 { "" } else { "s" }
}

// ============================================================================
// ScriptError
// ============================================================================

/// Failure to load a script module.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("cannot read `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_first_line() {
        assert_eq!(line_col("fn f() {}", 3), (1, 4));
    }

    #[test]
    fn test_line_col_after_newlines() {
        let source = "let a = 1;\nlet b = 2;\n  oops";
        let offset = source.find("oops").unwrap();
        assert_eq!(line_col(source, offset), (3, 3));
    }

    #[test]
    fn test_line_col_clamps_offset() {
        assert_eq!(line_col("ab", 100), (1, 3));
    }

    #[test]
    fn test_arity_message_pluralizes() {
        let one = RuntimeError::Arity {
            name: "f".into(),
            expected: 1,
            got: 2,
        };
        let two = RuntimeError::Arity {
            name: "g".into(),
            expected: 2,
            got: 0,
        };
        assert_eq!(one.to_string(), "`f` expects 1 argument, got 2");
        assert_eq!(two.to_string(), "`g` expects 2 arguments, got 0");
    }
}
