//! Syntax tree for reloadable scripts.
//!
//! Function and class definitions keep two spans: `span` covers the whole
//! item including its decorators, `def_span` covers only the bare definition
//! (`fn ...` / `class ...` up to the closing brace). The reload locator hands
//! out `def_span` text so decorators are never re-applied on re-execution.

use std::sync::Arc;

use super::token::Span;

/// A parsed source file or fragment.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

impl Program {
    /// Top-level definitions in source order.
    pub fn definitions(&self) -> impl Iterator<Item = Definition<'_>> {
        self.stmts.iter().filter_map(|stmt| match stmt {
            Stmt::FnDef(def) => Some(Definition::Fn(def)),
            Stmt::ClassDef(def) => Some(Definition::Class(def)),
            _ => None,
        })
    }
}

/// Borrowed view over either kind of top-level definition.
#[derive(Debug, Clone, Copy)]
pub enum Definition<'a> {
    Fn(&'a FnDef),
    Class(&'a ClassDef),
}

impl Definition<'_> {
    pub fn name(&self) -> &str {
        match self {
            Definition::Fn(def) => &def.name,
            Definition::Class(def) => &def.name,
        }
    }

    pub fn def_span(&self) -> Span {
        match self {
            Definition::Fn(def) => def.def_span,
            Definition::Class(def) => def.def_span,
        }
    }

    pub fn decorators(&self) -> &[Decorator] {
        match self {
            Definition::Fn(def) => &def.decorators,
            Definition::Class(def) => &def.decorators,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Decorator {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Arc<[Stmt]>,
    pub decorators: Vec<Decorator>,
    pub span: Span,
    pub def_span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    /// Field initialisers, evaluated once when the class is defined.
    pub fields: Vec<(String, Expr)>,
    pub methods: Vec<FnDef>,
    pub decorators: Vec<Decorator>,
    pub span: Span,
    pub def_span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
    },
    Assign {
        target: AssignTarget,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    FnDef(FnDef),
    ClassDef(ClassDef),
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(String),
    Field { object: Expr, name: String },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Field {
        object: Box<Expr>,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}
