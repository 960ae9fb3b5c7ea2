//! The in-memory AST produced by [`crate::parser`] for a single BUILD file.
//!
//! Node variants are expressed as a
//! tagged enum with explicit visitor callbacks rather than subtype
//! polymorphism — walkers `match` on [`Expr`]/[`Stmt`] and recurse
//! themselves; there is no separate `Visitor` trait because every walk in
//! this crate (diagnostics, symbols, completion, scope resolution) needs a
//! different subset of node kinds and a shared trait would mostly be unused
//! default methods.

use std::collections::HashMap;

use crate::position::Range;

/// A parsed BUILD file: a flat sequence of top-level statements plus any
/// errors the parser recovered from.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub statements: Vec<Stmt>,
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub range: Range,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `name = expr`
    Assign(Assign),
    /// A bare call used as a statement, e.g. `go_library(name = "x", ...)`.
    Expr(Expr),
    /// `subinclude("//build_defs:go.build_defs")`
    Subinclude(Call),
    /// `def name(params): ...` — a user-defined function.
    FunctionDef(FunctionDef),
}

impl Stmt {
    pub fn range(&self) -> Range {
        match self {
            Stmt::Assign(a) => a.range,
            Stmt::Expr(e) => e.range(),
            Stmt::Subinclude(c) => c.range,
            Stmt::FunctionDef(f) => f.range,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub name: Ident,
    pub value: Expr,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub name: String,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Ident,
    pub params: Vec<Param>,
    pub docstring: Option<String>,
    pub body: Vec<Stmt>,
    pub range: Range,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub range: Range,
    pub has_default: bool,
}

/// An expression. Only the forms a BUILD file actually contains are
/// represented — this is a declarative configuration language, not a
/// general-purpose one, so there is deliberately no arithmetic, no
/// conditionals beyond what a call's arguments carry, and no user control
/// flow other than `def`.
#[derive(Debug, Clone)]
pub enum Expr {
    String(StringLit),
    Number(NumberLit, Range),
    Bool(bool, Range),
    None(Range),
    Identifier(Ident),
    List(Vec<Expr>, Range),
    Dict(Vec<(Expr, Expr)>, Range),
    Call(Call),
    /// `a + b`, used almost exclusively for string/list concatenation in
    /// this dialect (e.g. glob patterns, label composition).
    BinaryOp { left: Box<Expr>, op: String, right: Box<Expr>, range: Range },
}

impl Expr {
    pub fn range(&self) -> Range {
        match self {
            Expr::String(s) => s.range,
            Expr::Number(_, r) => *r,
            Expr::Bool(_, r) => *r,
            Expr::None(r) => *r,
            Expr::Identifier(i) => i.range,
            Expr::List(_, r) => *r,
            Expr::Dict(_, r) => *r,
            Expr::Call(c) => c.range,
            Expr::BinaryOp { range, .. } => *range,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StringLit {
    pub value: String,
    pub range: Range,
}

#[derive(Debug, Clone, Copy)]
pub struct NumberLit(pub i64);

#[derive(Debug, Clone)]
pub struct Call {
    pub callee: Ident,
    pub args: Vec<Arg>,
    pub range: Range,
}

impl Call {
    /// The value bound to the `name = "..."` keyword argument, if present
    /// and a plain string literal (every build rule invocation names its
    /// target this way).
    pub fn target_name(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Keyword { name, value, .. } if name == "name" => match value {
                Expr::String(s) => Some(s.value.as_str()),
                _ => None,
            },
            _ => None,
        })
    }

    /// The source range of the string literal bound to `name = "..."`,
    /// used by goto-definition to jump straight to a target's declaration.
    pub fn target_name_range(&self) -> Option<Range> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Keyword { name, value, .. } if name == "name" => match value {
                Expr::String(s) => Some(s.range),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn keyword_arg(&self, name: &str) -> Option<&Expr> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Keyword { name: n, value, .. } if n == name => Some(value),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Arg {
    Positional(Expr),
    Keyword { name: String, name_range: Range, value: Expr },
}

impl Arg {
    pub fn value(&self) -> &Expr {
        match self {
            Arg::Positional(e) => e,
            Arg::Keyword { value, .. } => value,
        }
    }
}

/// A lexical scope active at some point in the statement sequence: function
/// parameters plus assignments made strictly before the position in
/// question. Built fresh per diagnostics/completion query by
/// [`build_scope_at`] rather than cached, since it is cheap (a linear walk
/// of a single file's top-level statements) and queries are infrequent
/// relative to edits.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    bindings: HashMap<String, Range>,
}

impl Scope {
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn declaration_range(&self, name: &str) -> Option<Range> {
        self.bindings.get(name).copied()
    }

    fn bind(&mut self, name: String, range: Range) {
        self.bindings.insert(name, range);
    }
}

/// Computes the scope visible at `at`: every assignment and function
/// parameter that lexically precedes (or contains, for parameters) the
/// given position, plus `extra` (repository-level configuration
/// identifiers, seeded by the caller).
pub fn build_scope_at(module: &Module, at: crate::position::Position, extra: &Scope) -> Scope {
    let mut scope = extra.clone();
    collect_bindings_before(&module.statements, at, &mut scope);
    scope
}

fn collect_bindings_before(statements: &[Stmt], at: crate::position::Position, scope: &mut Scope) {
    for stmt in statements {
        if stmt.range().start.line > at.line {
            break;
        }
        match stmt {
            Stmt::Assign(assign) => {
                scope.bind(assign.name.name.clone(), assign.name.range);
            }
            Stmt::FunctionDef(func) => {
                if func.range.start.line < at.line && at.line <= func.range.end.line {
                    for param in &func.params {
                        scope.bind(param.name.clone(), param.range);
                    }
                    collect_bindings_before(&func.body, at, scope);
                } else if func.range.end.line < at.line {
                    scope.bind(func.name.name.clone(), func.name.range);
                }
            }
            Stmt::Expr(_) | Stmt::Subinclude(_) => {}
        }
    }
}

/// Walks every string literal in the module, in the order a depth-first
/// traversal of statements/expressions encounters them.
pub fn walk_string_literals<'a>(module: &'a Module, mut visit: impl FnMut(&'a StringLit)) {
    for stmt in &module.statements {
        walk_stmt_strings(stmt, &mut visit);
    }
}

fn walk_stmt_strings<'a>(stmt: &'a Stmt, visit: &mut impl FnMut(&'a StringLit)) {
    match stmt {
        Stmt::Assign(a) => walk_expr_strings(&a.value, visit),
        Stmt::Expr(e) => walk_expr_strings(e, visit),
        Stmt::Subinclude(c) => walk_call_strings(c, visit),
        Stmt::FunctionDef(f) => {
            for s in &f.body {
                walk_stmt_strings(s, visit);
            }
        }
    }
}

fn walk_expr_strings<'a>(expr: &'a Expr, visit: &mut impl FnMut(&'a StringLit)) {
    match expr {
        Expr::String(s) => visit(s),
        Expr::List(items, _) => {
            for item in items {
                walk_expr_strings(item, visit);
            }
        }
        Expr::Dict(entries, _) => {
            for (k, v) in entries {
                walk_expr_strings(k, visit);
                walk_expr_strings(v, visit);
            }
        }
        Expr::Call(c) => walk_call_strings(c, visit),
        Expr::BinaryOp { left, right, .. } => {
            walk_expr_strings(left, visit);
            walk_expr_strings(right, visit);
        }
        Expr::Number(..) | Expr::Bool(..) | Expr::None(_) | Expr::Identifier(_) => {}
    }
}

fn walk_call_strings<'a>(call: &'a Call, visit: &mut impl FnMut(&'a StringLit)) {
    for arg in &call.args {
        walk_expr_strings(arg.value(), visit);
    }
}

/// Walks every call expression in the module (top-level and nested inside
/// list/dict literals), depth-first.
pub fn walk_calls<'a>(module: &'a Module, mut visit: impl FnMut(&'a Call)) {
    for stmt in &module.statements {
        walk_stmt_calls(stmt, &mut visit);
    }
}

fn walk_stmt_calls<'a>(stmt: &'a Stmt, visit: &mut impl FnMut(&'a Call)) {
    match stmt {
        Stmt::Assign(a) => walk_expr_calls(&a.value, visit),
        Stmt::Expr(e) => walk_expr_calls(e, visit),
        // `subinclude(...)` itself isn't a rule or function invocation to
        // check as a callee — only walk into its arguments, in case one of
        // them embeds a call of its own.
        Stmt::Subinclude(c) => walk_call_calls(c, visit),
        Stmt::FunctionDef(f) => {
            for s in &f.body {
                walk_stmt_calls(s, visit);
            }
        }
    }
}

fn walk_expr_calls<'a>(expr: &'a Expr, visit: &mut impl FnMut(&'a Call)) {
    match expr {
        Expr::Call(c) => {
            visit(c);
            walk_call_calls(c, visit);
        }
        Expr::List(items, _) => {
            for item in items {
                walk_expr_calls(item, visit);
            }
        }
        Expr::Dict(entries, _) => {
            for (k, v) in entries {
                walk_expr_calls(k, visit);
                walk_expr_calls(v, visit);
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            walk_expr_calls(left, visit);
            walk_expr_calls(right, visit);
        }
        Expr::String(_) | Expr::Number(..) | Expr::Bool(..) | Expr::None(_) | Expr::Identifier(_) => {}
    }
}

fn walk_call_calls<'a>(call: &'a Call, visit: &mut impl FnMut(&'a Call)) {
    for arg in &call.args {
        walk_expr_calls(arg.value(), visit);
    }
}

/// Walks every bare identifier *expression* (not keyword-argument names, not
/// the callee of a call, not assignment targets) — the set diagnostics rule
/// checks against scope.
pub fn walk_identifier_expressions<'a>(module: &'a Module, mut visit: impl FnMut(&'a Ident)) {
    for stmt in &module.statements {
        walk_stmt_identifiers(stmt, &mut visit);
    }
}

fn walk_stmt_identifiers<'a>(stmt: &'a Stmt, visit: &mut impl FnMut(&'a Ident)) {
    match stmt {
        Stmt::Assign(a) => walk_expr_identifiers(&a.value, visit),
        Stmt::Expr(e) => walk_expr_identifiers(e, visit),
        Stmt::Subinclude(c) => walk_call_identifiers(c, visit),
        Stmt::FunctionDef(f) => {
            for s in &f.body {
                walk_stmt_identifiers(s, visit);
            }
        }
    }
}

fn walk_expr_identifiers<'a>(expr: &'a Expr, visit: &mut impl FnMut(&'a Ident)) {
    match expr {
        Expr::Identifier(ident) => visit(ident),
        Expr::List(items, _) => {
            for item in items {
                walk_expr_identifiers(item, visit);
            }
        }
        Expr::Dict(entries, _) => {
            for (k, v) in entries {
                walk_expr_identifiers(k, visit);
                walk_expr_identifiers(v, visit);
            }
        }
        Expr::Call(c) => walk_call_identifiers(c, visit),
        Expr::BinaryOp { left, right, .. } => {
            walk_expr_identifiers(left, visit);
            walk_expr_identifiers(right, visit);
        }
        Expr::String(_) | Expr::Number(..) | Expr::Bool(..) | Expr::None(_) => {}
    }
}

fn walk_call_identifiers<'a>(call: &'a Call, visit: &mut impl FnMut(&'a Ident)) {
    for arg in &call.args {
        walk_expr_identifiers(arg.value(), visit);
    }
}
