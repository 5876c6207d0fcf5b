//! Tree-walking evaluator.
//!
//! Name resolution follows the frame's locals, then the owning module's
//! globals, then builtins. Functions do not close over enclosing locals, so
//! a definition re-executed in a fresh scope behaves exactly like the one
//! loaded with its module.

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

use super::ast::*;
use super::builtins;
use super::error::RuntimeError;
use super::module::Module;
use super::value::{Class, Function, Instance, Origin, Value};

/// Deepest allowed chain of nested script calls.
pub const MAX_CALL_DEPTH: usize = 200;

/// Process-wide interrupt request (Ctrl+C).
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Ask running scripts to unwind at the next loop iteration or sleep slice.
pub fn interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

// ============================================================================
// Entry points
// ============================================================================

/// Run a whole program at module level: definitions bind into globals.
pub fn exec_module(module: &Arc<Module>, program: &Program) -> Result<(), RuntimeError> {
    let mut frame = Frame::module_level(module);
    match frame.exec_block(&program.stmts)? {
        Flow::Normal | Flow::Return(_) => Ok(()),
        Flow::Break => Err(RuntimeError::LoopControl("break")),
        Flow::Continue => Err(RuntimeError::LoopControl("continue")),
    }
}

/// Run a program with the module's globals as enclosing environment and a
/// fresh, empty local scope. Returns that scope.
pub fn exec_fragment(
    module: &Arc<Module>,
    program: &Program,
) -> Result<FxHashMap<String, Value>, RuntimeError> {
    let mut frame = Frame::isolated(module);
    match frame.exec_block(&program.stmts)? {
        Flow::Normal | Flow::Return(_) => {}
        Flow::Break => return Err(RuntimeError::LoopControl("break")),
        Flow::Continue => return Err(RuntimeError::LoopControl("continue")),
    }
    Ok(frame.locals.unwrap_or_default())
}

/// Call any callable value.
pub fn call_value(callee: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    match callee {
        Value::Function(function) => call_function(function, args),
        Value::BoundMethod(bound) => {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(Value::Instance(Arc::clone(&bound.receiver)));
            full.extend_from_slice(args);
            call_function(&bound.function, &full)
        }
        Value::Native(native) => {
            if let Some(expected) = native.arity
                && expected != args.len()
            {
                return Err(RuntimeError::Arity {
                    name: native.name.clone(),
                    expected,
                    got: args.len(),
                });
            }
            (native.func)(args)
        }
        Value::Class(class) => construct(class, args).map(Value::Instance),
        Value::Proxy(proxy) => proxy.call(args),
        other => Err(RuntimeError::NotCallable(other.type_name().to_string())),
    }
}

/// Create an instance of `class` and run its `init` method, if any.
pub fn construct(class: &Arc<Class>, args: &[Value]) -> Result<Arc<Instance>, RuntimeError> {
    let instance = Instance::new(Arc::clone(class));
    match class.method("init") {
        Some(init) => {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(Value::Instance(Arc::clone(&instance)));
            full.extend_from_slice(args);
            call_function(init, &full)?;
        }
        None if !args.is_empty() => {
            return Err(RuntimeError::Arity {
                name: class.name.clone(),
                expected: 0,
                got: args.len(),
            });
        }
        None => {}
    }
    Ok(instance)
}

/// Attribute lookup on any value.
pub fn get_attr(value: &Value, name: &str) -> Result<Value, RuntimeError> {
    let found = match value {
        Value::Instance(instance) => instance.attr(name),
        Value::Class(class) => class.attr(name),
        Value::Proxy(proxy) => proxy.get_attr(name),
        _ => None,
    };
    found.ok_or_else(|| RuntimeError::NoAttribute {
        ty: describe_type(value),
        name: name.to_string(),
    })
}

fn describe_type(value: &Value) -> String {
    match value {
        Value::Instance(instance) => instance.class().name.clone(),
        Value::Class(class) => class.name.clone(),
        Value::Proxy(proxy) => proxy.name().to_string(),
        other => other.type_name().to_string(),
    }
}

fn call_function(function: &Arc<Function>, args: &[Value]) -> Result<Value, RuntimeError> {
    if function.params.len() != args.len() {
        return Err(RuntimeError::Arity {
            name: function.name.clone(),
            expected: function.params.len(),
            got: args.len(),
        });
    }
    let module = function.module()?;
    let _depth = DepthGuard::enter()?;

    let locals = function
        .params
        .iter()
        .cloned()
        .zip(args.iter().cloned())
        .collect();
    let mut frame = Frame {
        module: &module,
        locals: Some(locals),
    };
    match frame.exec_block(&function.body)? {
        Flow::Normal => Ok(Value::Nil),
        Flow::Return(value) => Ok(value),
        Flow::Break => Err(RuntimeError::LoopControl("break")),
        Flow::Continue => Err(RuntimeError::LoopControl("continue")),
    }
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<Self, RuntimeError> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(RuntimeError::CallDepth(MAX_CALL_DEPTH));
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

// ============================================================================
// Frames
// ============================================================================

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Frame<'m> {
    module: &'m Arc<Module>,
    /// `None` at module level: bindings go straight into globals.
    locals: Option<FxHashMap<String, Value>>,
}

impl<'m> Frame<'m> {
    fn module_level(module: &'m Arc<Module>) -> Self {
        Self {
            module,
            locals: None,
        }
    }

    fn isolated(module: &'m Arc<Module>) -> Self {
        Self {
            module,
            locals: Some(FxHashMap::default()),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = self.locals.as_ref().and_then(|l| l.get(name)) {
            return Ok(value.clone());
        }
        self.module
            .get(name)
            .or_else(|| builtins::lookup(name))
            .ok_or_else(|| RuntimeError::UndefinedName(name.to_string()))
    }

    fn bind(&mut self, name: &str, value: Value) {
        match &mut self.locals {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => self.module.set(name, value),
        }
    }

    /// Update an existing binding, local first, then global.
    fn assign(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.locals.as_mut().and_then(|l| l.get_mut(name)) {
            *slot = value;
            return Ok(());
        }
        if self.module.get(name).is_some() {
            self.module.set(name, value);
            return Ok(());
        }
        Err(RuntimeError::UndefinedName(name.to_string()))
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Let { name, value } => {
                let value = self.eval(value)?;
                self.bind(name, value);
            }
            Stmt::Assign { target, value, .. } => {
                let value = self.eval(value)?;
                match target {
                    AssignTarget::Name(name) => self.assign(name, value)?,
                    AssignTarget::Field { object, name } => match self.eval(object)? {
                        Value::Instance(instance) => instance.set(name.as_str(), value),
                        other => {
                            return Err(RuntimeError::Type(format!(
                                "cannot set attribute `{name}` on {}",
                                other.type_name()
                            )));
                        }
                    },
                }
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.is_truthy() {
                    return self.exec_block(then);
                } else if let Some(otherwise) = otherwise {
                    return self.exec_block(otherwise);
                }
            }
            Stmt::While { cond, body } => loop {
                if is_interrupted() {
                    return Err(RuntimeError::Interrupted);
                }
                if !self.eval(cond)?.is_truthy() {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Normal | Flow::Continue => {}
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            },
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::FnDef(def) => {
                let function = Value::Function(self.define_function(def));
                let value = self.decorate(&def.decorators, function)?;
                self.bind(&def.name, value);
            }
            Stmt::ClassDef(def) => {
                let class = Value::Class(self.define_class(def)?);
                let value = self.decorate(&def.decorators, class)?;
                self.bind(&def.name, value);
            }
        }
        Ok(Flow::Normal)
    }

    fn define_function(&self, def: &FnDef) -> Arc<Function> {
        Arc::new(Function {
            name: def.name.clone(),
            params: def.params.clone(),
            body: Arc::clone(&def.body),
            module: Arc::downgrade(self.module),
            origin: Origin {
                path: self.module.path().to_path_buf(),
                span: def.def_span,
            },
        })
    }

    fn define_class(&mut self, def: &ClassDef) -> Result<Arc<Class>, RuntimeError> {
        let mut defaults = Vec::with_capacity(def.fields.len());
        for (name, expr) in &def.fields {
            defaults.push((name.clone(), self.eval(expr)?));
        }
        let methods = def
            .methods
            .iter()
            .map(|m| (m.name.clone(), self.define_function(m)))
            .collect();
        Ok(Arc::new(Class {
            name: def.name.clone(),
            defaults,
            methods,
            module: Arc::downgrade(self.module),
            origin: Origin {
                path: self.module.path().to_path_buf(),
                span: def.def_span,
            },
        }))
    }

    /// Apply decorators bottom-up, like stacked function application.
    fn decorate(&self, decorators: &[Decorator], mut value: Value) -> Result<Value, RuntimeError> {
        for decorator in decorators.iter().rev() {
            let callee = self.lookup(&decorator.name)?;
            value = call_value(&callee, &[value])?;
        }
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::Str(s) => Ok(Value::Str(Arc::clone(s))),
            ExprKind::Name(name) => self.lookup(name),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                unary(*op, value)
            }
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => {
                    let left = self.eval(lhs)?;
                    if !left.is_truthy() {
                        return Ok(left);
                    }
                    self.eval(rhs)
                }
                BinaryOp::Or => {
                    let left = self.eval(lhs)?;
                    if left.is_truthy() {
                        return Ok(left);
                    }
                    self.eval(rhs)
                }
                _ => {
                    let left = self.eval(lhs)?;
                    let right = self.eval(rhs)?;
                    binary(*op, left, right)
                }
            },
            ExprKind::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                call_value(&callee, &values)
            }
            ExprKind::Field { object, name } => {
                let object = self.eval(object)?;
                get_attr(&object, name)
            }
        }
    }
}

// ============================================================================
// Operators
// ============================================================================

fn unary(op: UnaryOp, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::Type("integer overflow".into())),
        (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Neg, other) => Err(RuntimeError::Type(format!(
            "cannot negate {}",
            other.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    use BinaryOp::*;

    match op {
        Eq => return Ok(Value::Bool(left == right)),
        NotEq => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_op(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (left.as_float().unwrap_or_default(), right.as_float().unwrap_or_default());
            float_op(op, a, b)
        }
        (Value::Str(a), Value::Str(b)) => match op {
            Add => Ok(Value::str(format!("{a}{b}"))),
            Lt => Ok(Value::Bool(a < b)),
            LtEq => Ok(Value::Bool(a <= b)),
            Gt => Ok(Value::Bool(a > b)),
            GtEq => Ok(Value::Bool(a >= b)),
            _ => Err(mismatch(op, &left, &right)),
        },
        _ => Err(mismatch(op, &left, &right)),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    use BinaryOp::*;

    let overflow = || RuntimeError::Type("integer overflow".into());
    let value = match op {
        Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        Div if b == 0 => return Err(RuntimeError::DivisionByZero),
        Div => Value::Int(a.checked_div(b).ok_or_else(overflow)?),
        Rem if b == 0 => return Err(RuntimeError::DivisionByZero),
        Rem => Value::Int(a.checked_rem(b).ok_or_else(overflow)?),
        Lt => Value::Bool(a < b),
        LtEq => Value::Bool(a <= b),
        Gt => Value::Bool(a > b),
        GtEq => Value::Bool(a >= b),
        Eq | NotEq | And | Or => unreachable!("handled before numeric dispatch"),
    };
    Ok(value)
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value, RuntimeError> {
    use BinaryOp::*;

    let value = match op {
        Add => Value::Float(a + b),
        Sub => Value::Float(a - b),
        Mul => Value::Float(a * b),
        Div | Rem if b == 0.0 => return Err(RuntimeError::DivisionByZero),
        Div => Value::Float(a / b),
        Rem => Value::Float(a % b),
        Lt => Value::Bool(a < b),
        LtEq => Value::Bool(a <= b),
        Gt => Value::Bool(a > b),
        GtEq => Value::Bool(a >= b),
        Eq | NotEq | And | Or => unreachable!("handled before numeric dispatch"),
    };
    Ok(value)
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::Type(format!(
        "unsupported operands for `{}`: {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}
