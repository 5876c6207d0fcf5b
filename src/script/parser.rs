//! Recursive-descent parser for reloadable scripts.
//!
//! ```text
//! item      := decorator* (fn_def | class_def) | stmt
//! decorator := '@' IDENT
//! fn_def    := 'fn' IDENT '(' params ')' block
//! class_def := 'class' IDENT '{' (IDENT '=' expr ';' | fn_def)* '}'
//! ```

use std::path::Path;
use std::sync::Arc;

use super::ast::*;
use super::error::SyntaxError;
use super::lexer::tokenize;
use super::token::{Span, Token};

/// Maximum nesting of expressions, blocks and `else if` arms combined.
const MAX_DEPTH: usize = 256;

/// Parse a whole source file (or a single extracted definition).
pub fn parse(path: &Path, source: &str) -> Result<Program, SyntaxError> {
    let tokens = tokenize(path, source)?;
    let mut parser = Parser {
        path,
        source,
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut stmts = Vec::new();
    while !parser.at_end() {
        stmts.push(parser.statement()?);
    }
    Ok(Program { stmts })
}

struct Parser<'a> {
    path: &'a Path,
    source: &'a str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    depth: usize,
}

type PResult<T> = Result<T, SyntaxError>;

impl Parser<'_> {
    // ------------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or(Span::new(self.source.len(), self.source.len()))
    }

    fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn expect(&mut self, token: Token) -> PResult<Span> {
        if self.check(&token) {
            self.pos += 1;
            return Ok(self.prev_span());
        }
        Err(self.unexpected(&format!("expected {token}")))
    }

    fn ident(&mut self, what: &str) -> PResult<(String, Span)> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok((name, self.prev_span()))
            }
            _ => Err(self.unexpected(&format!("expected {what}"))),
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let found = match self.peek() {
            Some(token) => format!("found {token}"),
            None => "found end of file".to_string(),
        };
        self.error(self.peek_span(), format!("{expected}, {found}"))
    }

    fn error(&self, span: Span, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(self.path, self.source, span, message)
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn statement(&mut self) -> PResult<Stmt> {
        match self.peek() {
            Some(Token::At) => self.decorated(),
            Some(Token::Fn) => Ok(Stmt::FnDef(self.fn_def(Vec::new())?)),
            Some(Token::Class) => Ok(Stmt::ClassDef(self.class_def(Vec::new())?)),
            Some(Token::Let) => {
                self.pos += 1;
                let (name, _) = self.ident("variable name")?;
                self.expect(Token::Assign)?;
                let value = self.expr()?;
                self.expect(Token::Semi)?;
                Ok(Stmt::Let { name, value })
            }
            Some(Token::If) => self.if_stmt(),
            Some(Token::While) => {
                self.pos += 1;
                let cond = self.expr()?;
                let (body, _) = self.block()?;
                Ok(Stmt::While { cond, body })
            }
            Some(Token::Return) => {
                self.pos += 1;
                let value = if self.check(&Token::Semi) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(Token::Semi)?;
                Ok(Stmt::Return(value))
            }
            Some(Token::Break) => {
                self.pos += 1;
                self.expect(Token::Semi)?;
                Ok(Stmt::Break)
            }
            Some(Token::Continue) => {
                self.pos += 1;
                self.expect(Token::Semi)?;
                Ok(Stmt::Continue)
            }
            _ => self.expr_or_assign(),
        }
    }

    fn decorated(&mut self) -> PResult<Stmt> {
        let mut decorators = Vec::new();
        while self.eat(&Token::At) {
            let at = self.prev_span();
            let (name, name_span) = self.ident("decorator name")?;
            decorators.push(Decorator {
                name,
                span: at.to(name_span),
            });
        }
        match self.peek() {
            Some(Token::Fn) => Ok(Stmt::FnDef(self.fn_def(decorators)?)),
            Some(Token::Class) => Ok(Stmt::ClassDef(self.class_def(decorators)?)),
            _ => Err(self.unexpected("expected `fn` or `class` after decorator")),
        }
    }

    fn fn_def(&mut self, decorators: Vec<Decorator>) -> PResult<FnDef> {
        let start = self.expect(Token::Fn)?;
        let (name, _) = self.ident("function name")?;
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let (param, span) = self.ident("parameter name")?;
                if params.contains(&param) {
                    return Err(self.error(span, format!("duplicate parameter `{param}`")));
                }
                params.push(param);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        let (body, end) = self.block()?;
        let def_span = start.to(end);
        let span = decorators.first().map_or(def_span, |d| d.span.to(def_span));
        Ok(FnDef {
            name,
            params,
            body: Arc::from(body),
            decorators,
            span,
            def_span,
        })
    }

    fn class_def(&mut self, decorators: Vec<Decorator>) -> PResult<ClassDef> {
        let start = self.expect(Token::Class)?;
        let (name, _) = self.ident("class name")?;
        self.expect(Token::LBrace)?;
        let mut fields = Vec::new();
        let mut methods: Vec<FnDef> = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => break,
                Some(Token::Fn) => {
                    let method = self.fn_def(Vec::new())?;
                    if methods.iter().any(|m| m.name == method.name) {
                        return Err(self.error(
                            method.def_span,
                            format!("duplicate method `{}` in class `{name}`", method.name),
                        ));
                    }
                    methods.push(method);
                }
                Some(Token::Ident(_)) => {
                    let (field, _) = self.ident("field name")?;
                    self.expect(Token::Assign)?;
                    let value = self.expr()?;
                    self.expect(Token::Semi)?;
                    fields.push((field, value));
                }
                _ => return Err(self.unexpected("expected field, method or `}`")),
            }
        }
        let end = self.expect(Token::RBrace)?;
        let def_span = start.to(end);
        let span = decorators.first().map_or(def_span, |d| d.span.to(def_span));
        Ok(ClassDef {
            name,
            fields,
            methods,
            decorators,
            span,
            def_span,
        })
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        self.enter("`else if` chain")?;
        let stmt = self.if_chain();
        self.depth -= 1;
        stmt
    }

    fn if_chain(&mut self) -> PResult<Stmt> {
        self.expect(Token::If)?;
        let cond = self.expr()?;
        let (then, _) = self.block()?;
        let otherwise = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                Some(vec![self.if_stmt()?])
            } else {
                Some(self.block()?.0)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    /// Parse `{ stmt* }`, returning the statements and the closing brace span.
    fn block(&mut self) -> PResult<(Vec<Stmt>, Span)> {
        self.expect(Token::LBrace)?;
        self.enter("block")?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.at_end() {
                return Err(self.unexpected("expected `}`"));
            }
            stmts.push(self.statement()?);
        }
        self.depth -= 1;
        let end = self.expect(Token::RBrace)?;
        Ok((stmts, end))
    }

    /// Count one level of nesting. Errors abort the parse, so callers only
    /// leave on success.
    fn enter(&mut self, what: &str) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(self.peek_span(), format!("{what} nested too deeply")));
        }
        Ok(())
    }

    fn expr_or_assign(&mut self) -> PResult<Stmt> {
        let expr = self.expr()?;
        if !self.eat(&Token::Assign) {
            self.expect(Token::Semi)?;
            return Ok(Stmt::Expr(expr));
        }
        let span = expr.span;
        let target = match expr.kind {
            ExprKind::Name(name) => AssignTarget::Name(name),
            ExprKind::Field { object, name } => AssignTarget::Field {
                object: *object,
                name,
            },
            _ => return Err(self.error(span, "invalid assignment target")),
        };
        let value = self.expr()?;
        self.expect(Token::Semi)?;
        Ok(Stmt::Assign {
            target,
            value,
            span: span.to(self.prev_span()),
        })
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expr(&mut self) -> PResult<Expr> {
        self.enter("expression")?;
        let result = self.binary(0);
        self.depth -= 1;
        result
    }

    /// Precedence climbing over the binary operator table.
    fn binary(&mut self, min_level: u8) -> PResult<Expr> {
        let mut lhs = self.unary()?;
        while let Some((op, level)) = self.peek().and_then(binary_op) {
            if level < min_level {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(level + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let start = self.prev_span();
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(start, "expression nested too deeply"));
        }
        let operand = self.unary();
        self.depth -= 1;
        let operand = operand?;
        let span = start.to(operand.span);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        })
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::LParen) {
                let mut args = Vec::new();
                if !self.check(&Token::RParen) {
                    loop {
                        args.push(self.expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(Token::RParen)?;
                let span = expr.span.to(end);
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span,
                };
            } else if self.eat(&Token::Dot) {
                let (name, end) = self.ident("attribute name")?;
                let span = expr.span.to(end);
                expr = Expr {
                    kind: ExprKind::Field {
                        object: Box::new(expr),
                        name,
                    },
                    span,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let Some((token, span)) = self.advance() else {
            return Err(self.unexpected("expected expression"));
        };
        let kind = match token {
            Token::Nil => ExprKind::Nil,
            Token::True => ExprKind::Bool(true),
            Token::False => ExprKind::Bool(false),
            Token::Int(n) => ExprKind::Int(n),
            Token::Float(n) => ExprKind::Float(n),
            Token::Str(s) => ExprKind::Str(Arc::from(s)),
            Token::Ident(name) => ExprKind::Name(name),
            Token::LParen => {
                let inner = self.expr()?;
                let end = self.expect(Token::RParen)?;
                return Ok(Expr {
                    kind: inner.kind,
                    span: span.to(end),
                });
            }
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("expected expression"));
            }
        };
        Ok(Expr { kind, span })
    }
}

/// Binary operator and its precedence level (higher binds tighter).
fn binary_op(token: &Token) -> Option<(BinaryOp, u8)> {
    let entry = match token {
        Token::OrOr => (BinaryOp::Or, 0),
        Token::AndAnd => (BinaryOp::And, 1),
        Token::EqEq => (BinaryOp::Eq, 2),
        Token::NotEq => (BinaryOp::NotEq, 2),
        Token::Lt => (BinaryOp::Lt, 3),
        Token::LtEq => (BinaryOp::LtEq, 3),
        Token::Gt => (BinaryOp::Gt, 3),
        Token::GtEq => (BinaryOp::GtEq, 3),
        Token::Plus => (BinaryOp::Add, 4),
        Token::Minus => (BinaryOp::Sub, 4),
        Token::Star => (BinaryOp::Mul, 5),
        Token::Slash => (BinaryOp::Div, 5),
        Token::Percent => (BinaryOp::Rem, 5),
        _ => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse(Path::new("test.rl"), source).unwrap()
    }

    fn parse_err(source: &str) -> SyntaxError {
        parse(Path::new("test.rl"), source).unwrap_err()
    }

    #[test]
    fn test_function_definition() {
        let program = parse_ok("fn add_one(n) { return n + 1; }");
        let Stmt::FnDef(def) = &program.stmts[0] else {
            panic!("expected fn");
        };
        assert_eq!(def.name, "add_one");
        assert_eq!(def.params, vec!["n"]);
        assert_eq!(def.body.len(), 1);
    }

    #[test]
    fn test_decorator_spans() {
        let source = "let a = 1;\n@reloadr\nfn f() { return a; }\n";
        let program = parse_ok(source);
        let Stmt::FnDef(def) = &program.stmts[1] else {
            panic!("expected fn");
        };
        assert_eq!(def.decorators[0].name, "reloadr");
        assert_eq!(def.span.slice(source), "@reloadr\nfn f() { return a; }");
        assert_eq!(def.def_span.slice(source), "fn f() { return a; }");
    }

    #[test]
    fn test_class_definition() {
        let source = "class Point { x = 0; y = 0; fn move(self, dx) { self.x = self.x + dx; } }";
        let program = parse_ok(source);
        let Stmt::ClassDef(def) = &program.stmts[0] else {
            panic!("expected class");
        };
        assert_eq!(def.name, "Point");
        assert_eq!(def.fields.len(), 2);
        assert_eq!(def.methods[0].name, "move");
        assert_eq!(def.methods[0].params, vec!["self", "dx"]);
        assert_eq!(def.def_span.slice(source), source);
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("1 + 2 * 3 == 7 && true;");
        let Stmt::Expr(expr) = &program.stmts[0] else {
            panic!("expected expression");
        };
        let ExprKind::Binary { op, lhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::And);
        let ExprKind::Binary { op, lhs, .. } = &lhs.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Eq);
        let ExprKind::Binary { op, rhs, .. } = &lhs.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let program = parse_ok("10 - 3 - 2;");
        let Stmt::Expr(expr) = &program.stmts[0] else {
            panic!("expected expression");
        };
        let ExprKind::Binary { lhs, rhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert!(matches!(lhs.kind, ExprKind::Binary { .. }));
        assert!(matches!(rhs.kind, ExprKind::Int(2)));
    }

    #[test]
    fn test_field_assignment_and_method_call() {
        let program = parse_ok("car.x = 3; car.move(1, 2);");
        assert!(matches!(
            &program.stmts[0],
            Stmt::Assign {
                target: AssignTarget::Field { .. },
                ..
            }
        ));
        let Stmt::Expr(expr) = &program.stmts[1] else {
            panic!("expected call");
        };
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(&callee.kind, ExprKind::Field { name, .. } if name == "move"));
    }

    #[test]
    fn test_else_if_chain() {
        let program = parse_ok("if a { b(); } else if c { d(); } else { e(); }");
        let Stmt::If { otherwise, .. } = &program.stmts[0] else {
            panic!("expected if");
        };
        let nested = otherwise.as_ref().unwrap();
        assert!(matches!(&nested[0], Stmt::If { otherwise: Some(_), .. }));
    }

    #[test]
    fn test_definitions_iterates_top_level_only() {
        let program = parse_ok("fn a() { fn inner() {} } class B {} let c = 1;");
        let names: Vec<_> = program.definitions().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["a", "B"]);
    }

    #[test]
    fn test_missing_closing_brace() {
        let err = parse_err("fn f() {\n  return 1;\n");
        assert_eq!(err.line, 3);
        assert!(err.message.contains("end of file"));
    }

    #[test]
    fn test_decorator_requires_definition() {
        let err = parse_err("@reloadr\nlet a = 1;");
        assert!(err.message.contains("after decorator"));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_err("f() = 3;");
        assert!(err.message.contains("assignment target"));
    }

    #[test]
    fn test_duplicate_parameter() {
        let err = parse_err("fn f(a, a) {}");
        assert!(err.message.contains("duplicate parameter"));
    }

    #[test]
    fn test_depth_limit() {
        let source = format!("{}1{};", "(".repeat(400), ")".repeat(400));
        let err = parse_err(&source);
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_block_depth_limit() {
        let source = format!("fn f() {{{}", "if true {".repeat(100_000));
        let err = parse_err(&source);
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_else_if_chain_limit() {
        let arms = "else if n == 0 { return 0; } ".repeat(20_000);
        let source = format!("fn f(n) {{ if n {{ return 1; }} {arms}}}");
        let err = parse_err(&source);
        assert!(err.message.contains("nested too deeply"));
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let source = format!(
            "fn f() {{ {}return 1;{} }}",
            "if true { ".repeat(50),
            " }".repeat(50)
        );
        let program = parse_ok(&source);
        assert_eq!(program.stmts.len(), 1);

        let arms = "else if false { return 0; } ".repeat(50);
        parse_ok(&format!("fn g() {{ if false {{ return 1; }} {arms}}}"));
    }
}
