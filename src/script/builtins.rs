//! Builtin functions available to every script.
//!
//! | Name         | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `print`      | Write space-separated values to stdout          |
//! | `str`        | Convert any value to its display string         |
//! | `len`        | Length of a string in characters                |
//! | `sleep`      | Block for a number of seconds (interruptible)   |
//! | `reloadr`    | Decorator: wrap a class or function for reload  |
//! | `autoreload` | Decorator: wrap and reload on every file save   |

use std::io::Write;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::error::RuntimeError;
use super::interp::is_interrupted;
use super::value::{NativeFn, Value};
use crate::reload;

/// Longest uninterrupted slice of a `sleep` call.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

type Builtin = fn(&[Value]) -> Result<Value, RuntimeError>;

static BUILTINS: LazyLock<FxHashMap<&'static str, Value>> = LazyLock::new(|| {
    let mut table = FxHashMap::default();
    let mut add = |name: &'static str, arity: Option<usize>, func: Builtin| {
        table.insert(name, Value::Native(NativeFn::new(name, arity, func)));
    };
    add("print", None, print);
    add("str", Some(1), |args| Ok(Value::str(args[0].to_string())));
    add("len", Some(1), len);
    add("sleep", Some(1), sleep);
    add("reloadr", Some(1), reloadr);
    add("autoreload", Some(1), autoreload);
    table
});

/// Resolve a builtin by name.
pub fn lookup(name: &str) -> Option<Value> {
    BUILTINS.get(name).cloned()
}

/// Builtin names, sorted.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTINS.keys().copied().collect();
    names.sort_unstable();
    names
}

fn print(args: &[Value]) -> Result<Value, RuntimeError> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").ok();
    stdout.flush().ok();
    drop(stdout);
    crate::logger::mark_output();
    Ok(Value::Nil)
}

fn reloadr(args: &[Value]) -> Result<Value, RuntimeError> {
    reload::reloadr(args[0].clone())
        .map(Value::Proxy)
        .map_err(|e| RuntimeError::Reload(e.to_string()))
}

fn autoreload(args: &[Value]) -> Result<Value, RuntimeError> {
    reload::autoreload(args[0].clone())
        .map(Value::Proxy)
        .map_err(|e| RuntimeError::Reload(e.to_string()))
}

fn len(args: &[Value]) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(RuntimeError::Type(format!(
            "len() expects a str, got {}",
            other.type_name()
        ))),
    }
}

fn sleep(args: &[Value]) -> Result<Value, RuntimeError> {
    let seconds = args[0]
        .as_float()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| {
            RuntimeError::Type(format!(
                "sleep() expects a non-negative number, got {}",
                args[0]
            ))
        })?;
    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
    loop {
        if is_interrupted() {
            return Err(RuntimeError::Interrupted);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(Value::Nil);
        }
        std::thread::sleep(remaining.min(SLEEP_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown() {
        assert!(matches!(lookup("print"), Some(Value::Native(_))));
        assert!(lookup("exec").is_none());
    }

    #[test]
    fn test_names_listed() {
        assert_eq!(
            names(),
            vec!["autoreload", "len", "print", "reloadr", "sleep", "str"]
        );
    }

    #[test]
    fn test_len_counts_chars() {
        assert_eq!(len(&[Value::str("héllo")]).unwrap(), Value::Int(5));
        assert!(len(&[Value::Int(3)]).is_err());
    }

    #[test]
    fn test_sleep_rejects_negative() {
        assert!(sleep(&[Value::Float(-1.0)]).is_err());
        assert!(sleep(&[Value::str("1")]).is_err());
    }

    #[test]
    fn test_sleep_zero_returns() {
        assert_eq!(sleep(&[Value::Int(0)]).unwrap(), Value::Nil);
    }
}
