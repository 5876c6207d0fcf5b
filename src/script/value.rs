//! Runtime values.
//!
//! Every value is `Send + Sync`: reload triggers run on background threads
//! and touch the same functions, classes and instances as the main program.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::ast::Stmt;
use super::error::RuntimeError;
use super::module::Module;
use super::token::Span;
use crate::reload::Proxy;

/// Where a definition was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub path: PathBuf,
    pub span: Span,
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Function(Arc<Function>),
    Class(Arc<Class>),
    Instance(Arc<Instance>),
    BoundMethod(Arc<BoundMethod>),
    Native(Arc<NativeFn>),
    Proxy(Proxy),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::BoundMethod(_) => "method",
            Value::Native(_) => "builtin",
            Value::Proxy(_) => "proxy",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Arc<Instance>> {
        match self {
            Value::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Arc::from(s.as_ref()))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                Arc::ptr_eq(&a.receiver, &b.receiver) && Arc::ptr_eq(&a.function, &b.function)
            }
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Proxy(a), Value::Proxy(b)) => a.same(b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{n:.1}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Function(func) => write!(f, "<fn {}>", func.name),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<{} instance>", instance.class().name),
            Value::BoundMethod(bound) => write!(
                f,
                "<method {}.{}>",
                bound.receiver.class().name,
                bound.function.name
            ),
            Value::Native(native) => write!(f, "<builtin {}>", native.name),
            Value::Proxy(proxy) => write!(f, "<reloadr {} {}>", proxy.kind(), proxy.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            other => write!(f, "{other}"),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// A user-defined function or method.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Arc<[Stmt]>,
    /// Owning namespace: globals are resolved here at call time.
    pub module: Weak<Module>,
    pub origin: Origin,
}

impl Function {
    pub fn module(&self) -> Result<Arc<Module>, RuntimeError> {
        self.module
            .upgrade()
            .ok_or_else(|| RuntimeError::ModuleDropped(self.name.clone()))
    }
}

/// A method looked up on an instance, with `self` already bound.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Arc<Instance>,
    pub function: Arc<Function>,
}

pub type NativeImpl = dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync;

/// A function implemented in Rust.
pub struct NativeFn {
    pub name: String,
    /// `None` accepts any number of arguments.
    pub arity: Option<usize>,
    pub func: Box<NativeImpl>,
}

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        arity: Option<usize>,
        func: impl Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            arity,
            func: Box::new(func),
        })
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Classes and instances
// ============================================================================

/// A class: field defaults plus a method table.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    /// Field defaults in declaration order, evaluated at definition time.
    pub defaults: Vec<(String, Value)>,
    pub methods: FxHashMap<String, Arc<Function>>,
    pub module: Weak<Module>,
    pub origin: Origin,
}

impl Class {
    pub fn method(&self, name: &str) -> Option<&Arc<Function>> {
        self.methods.get(name)
    }

    /// Class-level attribute: a field default or an unbound method.
    pub fn attr(&self, name: &str) -> Option<Value> {
        if let Some((_, value)) = self.defaults.iter().find(|(field, _)| field == name) {
            return Some(value.clone());
        }
        self.method(name).map(|m| Value::Function(Arc::clone(m)))
    }
}

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// A live object.
///
/// The class slot is the instance's behavior table: re-tagging swaps it in
/// place while the fields stay untouched.
pub struct Instance {
    id: u64,
    class: ArcSwap<Class>,
    fields: Mutex<FxHashMap<String, Value>>,
}

impl Instance {
    /// Allocate an instance with the class's field defaults.
    pub fn new(class: Arc<Class>) -> Arc<Self> {
        let fields = class.defaults.iter().cloned().collect();
        Arc::new(Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            class: ArcSwap::new(class),
            fields: Mutex::new(fields),
        })
    }

    /// Stable identity, unchanged by re-tagging.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn class(&self) -> Arc<Class> {
        self.class.load_full()
    }

    /// Switch method dispatch to `class` without touching fields.
    pub fn retag(&self, class: Arc<Class>) {
        self.class.store(class);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.lock().get(name).cloned()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.fields.lock().insert(name.into(), value);
    }

    /// Field lookup first, then a method of the current class.
    pub fn attr(self: &Arc<Self>, name: &str) -> Option<Value> {
        if let Some(value) = self.get(name) {
            return Some(value);
        }
        let class = self.class();
        class.method(name).map(|function| {
            Value::BoundMethod(Arc::new(BoundMethod {
                receiver: Arc::clone(self),
                function: Arc::clone(function),
            }))
        })
    }

    /// Field names, sorted.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.fields.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("class", &self.class().name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, defaults: Vec<(&str, Value)>) -> Arc<Class> {
        Arc::new(Class {
            name: name.to_string(),
            defaults: defaults
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            methods: FxHashMap::default(),
            module: Weak::new(),
            origin: Origin {
                path: PathBuf::from("test.rl"),
                span: Span::default(),
            },
        })
    }

    #[test]
    fn test_numeric_equality_crosses_int_and_float() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::str("3"));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(Value::Float(0.5).is_truthy());
    }

    #[test]
    fn test_float_display_keeps_decimal_point() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
    }

    #[test]
    fn test_instance_starts_with_defaults() {
        let point = class("Point", vec![("x", Value::Int(0)), ("y", Value::Int(7))]);
        let p = Instance::new(point);
        assert_eq!(p.get("x"), Some(Value::Int(0)));
        assert_eq!(p.get("y"), Some(Value::Int(7)));
        assert_eq!(p.field_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_retag_keeps_identity_and_fields() {
        let old = class("Point", vec![("x", Value::Int(0))]);
        let new = class("Point", vec![("x", Value::Int(100))]);
        let p = Instance::new(Arc::clone(&old));
        p.set("x", Value::Int(5));
        let id = p.id();

        p.retag(Arc::clone(&new));

        assert_eq!(p.id(), id);
        assert!(Arc::ptr_eq(&p.class(), &new));
        assert_eq!(p.get("x"), Some(Value::Int(5)));
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let c = class("C", vec![]);
        let a = Instance::new(Arc::clone(&c));
        let b = Instance::new(c);
        assert_ne!(a.id(), b.id());
    }
}
