//! Document symbols: one symbol per top-level statement,
//! with call arguments nested underneath — keyword names as `Key` symbols,
//! literal argument values as `String`/`Number`/`Boolean`/`Null` symbols.

#![allow(deprecated)] // `DocumentSymbol::deprecated` has no replacement field in this tower-lsp version.

use tower_lsp::lsp_types::{DocumentSymbol, SymbolKind};

use crate::ast::{Arg, Call, Expr, FunctionDef, Module, Stmt};
use crate::position::range_to_lsp;

/// Returns every top-level symbol, sorted by `(start, end)` with ties
/// broken by the order statements appear in the module (the sort is
/// stable, so this falls out of `module.statements`' own order).
pub fn document_symbols(module: &Module) -> Vec<DocumentSymbol> {
    let mut symbols: Vec<DocumentSymbol> = module.statements.iter().map(stmt_symbol).collect();
    symbols.sort_by_key(|s| (s.range.start.line, s.range.start.character, s.range.end.line, s.range.end.character));
    symbols
}

fn symbol(name: String, kind: SymbolKind, range: crate::position::Range, selection_range: crate::position::Range, children: Vec<DocumentSymbol>) -> DocumentSymbol {
    DocumentSymbol {
        name,
        detail: None,
        kind,
        tags: None,
        deprecated: None,
        range: range_to_lsp(range),
        selection_range: range_to_lsp(selection_range),
        children: if children.is_empty() { None } else { Some(children) },
    }
}

fn stmt_symbol(stmt: &Stmt) -> DocumentSymbol {
    match stmt {
        Stmt::Assign(assign) => {
            let children = match &assign.value {
                Expr::Call(call) => call_arg_symbols(call),
                other => literal_symbol(other).into_iter().collect(),
            };
            symbol(assign.name.name.clone(), SymbolKind::VARIABLE, assign.range, assign.name.range, children)
        }
        Stmt::Expr(Expr::Call(call)) => call_symbol(call),
        Stmt::Expr(other) => symbol("<expr>".to_string(), SymbolKind::NULL, other.range(), other.range(), Vec::new()),
        Stmt::Subinclude(call) => call_symbol(call),
        Stmt::FunctionDef(func) => function_def_symbol(func),
    }
}

fn function_def_symbol(func: &FunctionDef) -> DocumentSymbol {
    symbol(func.name.name.clone(), SymbolKind::FUNCTION, func.range, func.name.range, Vec::new())
}

fn call_symbol(call: &Call) -> DocumentSymbol {
    symbol(call.callee.name.clone(), SymbolKind::FUNCTION, call.range, call.callee.range, call_arg_symbols(call))
}

fn call_arg_symbols(call: &Call) -> Vec<DocumentSymbol> {
    call.args
        .iter()
        .map(|arg| match arg {
            Arg::Keyword { name, name_range, value } => {
                let children = literal_symbol(value).into_iter().collect();
                symbol(name.clone(), SymbolKind::KEY, *name_range, *name_range, children)
            }
            Arg::Positional(value) => literal_symbol(value).unwrap_or_else(|| {
                symbol("<value>".to_string(), SymbolKind::NULL, value.range(), value.range(), Vec::new())
            }),
        })
        .collect()
}

/// Produces a leaf symbol for an argument's value when it is a plain
/// literal (literal values at argument positions emit
/// string/number/bool/null-kind symbols"). Lists, dicts, calls, and bare
/// identifiers aren't literals and yield no symbol here.
fn literal_symbol(expr: &Expr) -> Option<DocumentSymbol> {
    let (name, kind) = match expr {
        Expr::String(s) => (format!("\"{}\"", s.value), SymbolKind::STRING),
        Expr::Number(n, _) => (n.0.to_string(), SymbolKind::NUMBER),
        Expr::Bool(b, _) => (b.to_string(), SymbolKind::BOOLEAN),
        Expr::None(_) => ("None".to_string(), SymbolKind::NULL),
        _ => return None,
    };
    Some(symbol(name, kind, expr.range(), expr.range(), Vec::new()))
}
