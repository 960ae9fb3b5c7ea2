//! A pure `&str -> String` canonical formatter, standing in for the
//! external formatting tool a real build-file ecosystem would shell out
//! to. Reparses the document and pretty-prints the resulting AST, so
//! formatting is idempotent and independent of whatever whitespace the
//! user originally typed.
//!
//! The handler delegates to a pure function, diffs against the original
//! text, and emits `TextEdit`s, rather than shelling out to an external
//! formatter binary — this dialect has none to call, so the pretty-printer
//! lives here instead.

use tower_lsp::lsp_types::TextEdit;

use crate::ast::{Arg, Call, Expr, FunctionDef, Module, Stmt};
use crate::position::{Position, Range};

const INDENT_UNIT: &str = "    ";

pub enum FormatOutcome {
    Formatted(String),
    /// The document has parse errors; formatting a broken tree would
    /// likely make things worse; the caller returns no edits.
    ParseErrors,
}

pub fn format_source(source: &str) -> FormatOutcome {
    let module = crate::parser::parse(source);
    if !module.errors.is_empty() {
        return FormatOutcome::ParseErrors;
    }
    FormatOutcome::Formatted(print_module(&module))
}

/// Computes the minimal set of line-range `TextEdit`s turning `original`
/// into `formatted`, rather than replacing the whole document — keeps the
/// client's undo history and cursor position sane for documents where only
/// a few lines actually changed.
pub fn diff_to_edits(original: &str, formatted: &str) -> Vec<TextEdit> {
    let original_lines: Vec<&str> = split_keep_lines(original);
    let formatted_lines: Vec<&str> = split_keep_lines(formatted);

    if original_lines == formatted_lines {
        return Vec::new();
    }

    let prefix = original_lines
        .iter()
        .zip(formatted_lines.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = original_lines[prefix..]
        .iter()
        .rev()
        .zip(formatted_lines[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(original_lines.len() - prefix)
        .min(formatted_lines.len() - prefix);

    let orig_end = original_lines.len() - suffix;
    let fmt_end = formatted_lines.len() - suffix;

    let start = Position::new(prefix as u32 + 1, 1);
    let end = Position::new(orig_end as u32 + 1, 1);
    let replacement: String = formatted_lines[prefix..fmt_end].concat();

    vec![TextEdit {
        range: crate::position::range_to_lsp(Range::new(start, end)),
        new_text: replacement,
    }]
}

fn split_keep_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find('\n') {
        lines.push(&rest[..=idx]);
        rest = &rest[idx + 1..];
    }
    if !rest.is_empty() {
        lines.push(rest);
    }
    lines
}

fn print_module(module: &Module) -> String {
    let mut out = String::new();
    for (i, stmt) in module.statements.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        print_stmt(stmt, 0, &mut out);
    }
    out
}

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT_UNIT);
    }
}

fn print_stmt(stmt: &Stmt, level: usize, out: &mut String) {
    match stmt {
        Stmt::Assign(assign) => {
            indent(level, out);
            out.push_str(&assign.name.name);
            out.push_str(" = ");
            print_expr(&assign.value, level, out);
            out.push('\n');
        }
        Stmt::Expr(expr) => {
            indent(level, out);
            print_expr(expr, level, out);
            out.push('\n');
        }
        Stmt::Subinclude(call) => {
            indent(level, out);
            print_call(call, level, out);
            out.push('\n');
        }
        Stmt::FunctionDef(func) => print_function_def(func, level, out),
    }
}

fn print_function_def(func: &FunctionDef, level: usize, out: &mut String) {
    indent(level, out);
    out.push_str("def ");
    out.push_str(&func.name.name);
    out.push('(');
    for (i, param) in func.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&param.name);
        if param.has_default {
            out.push_str(" = ...");
        }
    }
    out.push_str("):\n");
    if func.body.is_empty() {
        indent(level + 1, out);
        out.push_str("pass\n");
    }
    for stmt in &func.body {
        print_stmt(stmt, level + 1, out);
    }
}

fn print_expr(expr: &Expr, level: usize, out: &mut String) {
    match expr {
        Expr::String(s) => {
            out.push('"');
            out.push_str(&s.value.replace('\\', "\\\\").replace('"', "\\\""));
            out.push('"');
        }
        Expr::Number(n, _) => out.push_str(&n.0.to_string()),
        Expr::Bool(b, _) => out.push_str(if *b { "True" } else { "False" }),
        Expr::None(_) => out.push_str("None"),
        Expr::Identifier(ident) => out.push_str(&ident.name),
        Expr::List(items, _) => print_list(items, level, out),
        Expr::Dict(entries, _) => print_dict(entries, level, out),
        Expr::Call(call) => print_call(call, level, out),
        Expr::BinaryOp { left, op, right, .. } => {
            print_expr(left, level, out);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            print_expr(right, level, out);
        }
    }
}

fn print_list(items: &[Expr], level: usize, out: &mut String) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }
    if items.len() <= 3 && items.iter().all(is_simple) {
        out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            print_expr(item, level, out);
        }
        out.push(']');
        return;
    }
    out.push_str("[\n");
    for item in items {
        indent(level + 1, out);
        print_expr(item, level + 1, out);
        out.push_str(",\n");
    }
    indent(level, out);
    out.push(']');
}

fn print_dict(entries: &[(Expr, Expr)], level: usize, out: &mut String) {
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    for (key, value) in entries {
        indent(level + 1, out);
        print_expr(key, level + 1, out);
        out.push_str(": ");
        print_expr(value, level + 1, out);
        out.push_str(",\n");
    }
    indent(level, out);
    out.push('}');
}

fn print_call(call: &Call, level: usize, out: &mut String) {
    out.push_str(&call.callee.name);
    out.push('(');
    if call.args.is_empty() {
        out.push(')');
        return;
    }
    out.push('\n');
    for arg in &call.args {
        indent(level + 1, out);
        match arg {
            Arg::Positional(expr) => print_expr(expr, level + 1, out),
            Arg::Keyword { name, value, .. } => {
                out.push_str(name);
                out.push_str(" = ");
                print_expr(value, level + 1, out);
            }
        }
        out.push_str(",\n");
    }
    indent(level, out);
    out.push(')');
}

fn is_simple(expr: &Expr) -> bool {
    matches!(expr, Expr::String(_) | Expr::Number(..) | Expr::Bool(..) | Expr::None(_) | Expr::Identifier(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_is_idempotent() {
        let src = "go_library(name=\"core\",srcs=[\"a.go\",\"b.go\"])\n";
        let once = match format_source(src) {
            FormatOutcome::Formatted(s) => s,
            FormatOutcome::ParseErrors => panic!("expected a clean parse"),
        };
        let twice = match format_source(&once) {
            FormatOutcome::Formatted(s) => s,
            FormatOutcome::ParseErrors => panic!("expected a clean parse on the formatted output too"),
        };
        assert_eq!(once, twice);
    }

    #[test]
    fn broken_documents_are_not_formatted() {
        let src = "go_library(name = \"core\"\n";
        assert!(matches!(format_source(src), FormatOutcome::ParseErrors));
    }

    #[test]
    fn diff_to_edits_is_empty_when_nothing_changed() {
        let src = "x = 1\n";
        assert!(diff_to_edits(src, src).is_empty());
    }

    #[test]
    fn diff_to_edits_localizes_a_change_to_the_affected_lines() {
        let original = "a = 1\nb = 2\nc = 3\n";
        let formatted = "a = 1\nb = 22\nc = 3\n";
        let edits = diff_to_edits(original, formatted);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range.start.line, 1);
        assert_eq!(edits[0].range.end.line, 2);
        assert_eq!(edits[0].new_text, "b = 22\n");
    }
}
