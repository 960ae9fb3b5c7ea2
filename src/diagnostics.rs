//! The diagnostics publisher (component C5): one task per open document,
//! woken whenever the parser worker publishes a fresh AST, computing and
//! pushing `textDocument/publishDiagnostics` notifications.
//!
//! The task shape is wake-on-reparse, compute, dedup, publish; the four
//! rules themselves are specific to this dialect.

use std::collections::HashSet;
use std::sync::Arc;

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Url};
use tower_lsp::Client;
use tracing::debug;

use crate::ast::{self, Call, Module};
use crate::document::{AstReadyReceiver, Document};
use crate::index::WorkspaceIndex;
use crate::label::BuildLabel;
use crate::position::range_to_lsp;

/// Runs until `ast_ready` closes (the document was closed and the
/// registry aborted this task before this loop noticed on its own).
pub async fn run(
    client: Client,
    document: Arc<Document>,
    index: Arc<WorkspaceIndex>,
    mut ast_ready: AstReadyReceiver,
) {
    let mut last_published: Option<Vec<Diagnostic>> = None;
    while ast_ready.recv().await.is_some() {
        let module = document.ast().await;
        let package = index.package_for_uri(&document.uri);
        let mut diagnostics = compute_diagnostics(&module, &index, &package);
        diagnostics.sort_by_key(|d| (d.range.start.line, d.range.start.character));

        if last_published.as_ref() == Some(&diagnostics) {
            debug!(uri = %document.uri, "diagnostics unchanged, skipping publish");
            continue;
        }
        client
            .publish_diagnostics(document.uri.clone(), diagnostics.clone(), Some(document.version()))
            .await;
        last_published = Some(diagnostics);
    }
}

/// Runs the full rule set over a parsed module and returns a deduplicated,
/// unordered diagnostic set (the caller sorts before comparing/publishing).
pub fn compute_diagnostics(module: &Module, index: &WorkspaceIndex, package: &str) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = module
        .errors
        .iter()
        .map(|err| Diagnostic {
            range: range_to_lsp(err.range),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some("buildfile".to_string()),
            message: err.message.clone(),
            ..Default::default()
        })
        .collect();

    diagnostics.extend(check_call_target(module, index));
    diagnostics.extend(check_label(module, index, package));
    diagnostics.extend(check_scope(module, index));
    diagnostics.extend(check_call_arguments(module, index));

    let mut seen = HashSet::new();
    diagnostics.retain(|d| seen.insert((d.range.start.line, d.range.start.character, d.message.clone())));
    diagnostics
}

fn diagnostic(call_or_range: tower_lsp::lsp_types::Range, message: impl Into<String>) -> Diagnostic {
    Diagnostic {
        range: call_or_range,
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some("buildfile".to_string()),
        message: message.into(),
        ..Default::default()
    }
}

/// Rule 1: every call's callee must be a known builtin or user-defined
/// function (or `subinclude`, handled as its own statement kind and never
/// reaches here).
fn check_call_target(module: &Module, index: &WorkspaceIndex) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    ast::walk_calls(module, |call: &Call| {
        if index.lookup_function(&call.callee.name).is_none() {
            out.push(diagnostic(
                range_to_lsp(call.callee.range),
                format!("unknown function `{}`", call.callee.name),
            ));
        }
    });
    out
}

/// Rule 2: string literals that look like build labels must resolve to an
/// existing, visible target.
fn check_label(module: &Module, index: &WorkspaceIndex, package: &str) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    ast::walk_string_literals(module, |lit| {
        if !crate::label::looks_like_label(&lit.value) {
            return;
        }
        let Ok(label) = lit.value.parse::<BuildLabel>() else {
            return;
        };
        let label = label.resolve_relative(package);
        if label.is_wildcard() || label.is_wildcard_path() {
            if !index.package_exists(&label.package) {
                out.push(diagnostic(range_to_lsp(lit.range), format!("no such package `//{}`", label.package)));
            }
            return;
        }
        match index.resolve_label(&label, package) {
            crate::index::LabelResolution::Ok => {}
            crate::index::LabelResolution::NoSuchPackage => {
                out.push(diagnostic(range_to_lsp(lit.range), format!("no such package `//{}`", label.package)));
            }
            crate::index::LabelResolution::NoSuchTarget => {
                out.push(diagnostic(range_to_lsp(lit.range), format!("no such target `{label}`")));
            }
            crate::index::LabelResolution::NotVisible => {
                out.push(diagnostic(
                    range_to_lsp(lit.range),
                    format!("target `{label}` is not visible from `//{package}`"),
                ));
            }
        }
    });
    out
}

/// Rule 3: bare identifier expressions must resolve against the scope
/// visible at their position (function parameters, prior assignments,
/// prior `def`s, or workspace-level constants such as `PUBLIC`).
fn check_scope(module: &Module, index: &WorkspaceIndex) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let globals = index.global_scope();
    ast::walk_identifier_expressions(module, |ident| {
        let scope = ast::build_scope_at(module, ident.range.start, &globals);
        if !scope.contains(&ident.name) {
            out.push(diagnostic(range_to_lsp(ident.range), format!("undefined name `{}`", ident.name)));
        }
    });
    out
}

/// Rule 4: call-argument arity and keyword checks against the target
/// function's declared parameters (builtins included, via their bundled
/// stub signatures). Positional arguments beyond the declared parameter
/// count, keyword arguments naming an undeclared parameter (except the
/// small variadic-builtin allowlist), and a required parameter left
/// unfilled by either a positional or keyword argument are all flagged.
fn check_call_arguments(module: &Module, index: &WorkspaceIndex) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    ast::walk_calls(module, |call: &Call| {
        let Some(func) = index.lookup_function(&call.callee.name) else { return };
        let Some(params) = func.params() else { return };

        let positional_count = call.args.iter().filter(|a| matches!(a, ast::Arg::Positional(_))).count();
        if positional_count > params.len() {
            if let Some(extra) = call.args.iter().filter(|a| matches!(a, ast::Arg::Positional(_))).nth(params.len())
            {
                out.push(diagnostic(
                    range_to_lsp(extra.value().range()),
                    format!("too many positional arguments in call to `{}`", call.callee.name),
                ));
            }
        }

        let mut filled: HashSet<&str> = params.iter().take(positional_count).map(|p| p.name.as_str()).collect();
        for arg in &call.args {
            if let ast::Arg::Keyword { name, name_range, .. } = arg {
                filled.insert(name.as_str());
                if !func.accepts_arbitrary_keywords() && !params.iter().any(|p| &p.name == name) {
                    out.push(diagnostic(
                        range_to_lsp(*name_range),
                        format!("`{}` takes no argument `{name}`", call.callee.name),
                    ));
                }
            }
        }

        let missing: Vec<&str> = params
            .iter()
            .filter(|p| !p.has_default && !filled.contains(p.name.as_str()))
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            out.push(diagnostic(
                range_to_lsp(call.callee.range),
                format!("not enough arguments in call to `{}` (missing {})", call.callee.name, missing.join(", ")),
            ));
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::WorkspaceIndex;

    #[test]
    fn flags_call_to_unknown_function() {
        let module = crate::parser::parse("frobnicate(name = \"x\")\n");
        let index = WorkspaceIndex::empty();
        let diags = compute_diagnostics(&module, &index, "pkg");
        assert!(diags.iter().any(|d| d.message.contains("unknown function")));
    }

    #[test]
    fn flags_undefined_identifier_reference() {
        let module = crate::parser::parse("go_library(name = \"a\", srcs = UNDEFINED)\n");
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs", "deps"]);
        let diags = compute_diagnostics(&module, &index, "pkg");
        assert!(diags.iter().any(|d| d.message.contains("undefined name `UNDEFINED`")));
    }

    #[test]
    fn does_not_flag_identifiers_bound_by_assignment() {
        let module = crate::parser::parse("SRCS = [\"a.go\"]\ngo_library(name = \"a\", srcs = SRCS)\n");
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs", "deps"]);
        let diags = compute_diagnostics(&module, &index, "pkg");
        assert!(!diags.iter().any(|d| d.message.contains("undefined name")));
    }

    #[test]
    fn flags_unknown_keyword_argument() {
        let module = crate::parser::parse("go_library(name = \"a\", bogus = 1)\n");
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs", "deps"]);
        let diags = compute_diagnostics(&module, &index, "pkg");
        assert!(diags.iter().any(|d| d.message.contains("takes no argument `bogus`")));
    }

    #[test]
    fn flags_missing_required_parameter() {
        let module = crate::parser::parse("go_library(srcs = [\"a.go\"])\n");
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs", "deps"]);
        let diags = compute_diagnostics(&module, &index, "pkg");
        assert!(diags.iter().any(|d| d.message.contains("not enough arguments") && d.message.contains("name")));
    }

    #[test]
    fn does_not_flag_required_parameter_filled_positionally() {
        let module = crate::parser::parse("go_library(\"a\", srcs = [\"a.go\"])\n");
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs", "deps"]);
        let diags = compute_diagnostics(&module, &index, "pkg");
        assert!(!diags.iter().any(|d| d.message.contains("not enough arguments")));
    }

    #[test]
    fn flags_excess_positional_arguments() {
        let module = crate::parser::parse("go_library(\"a\", \"b\", \"c\", \"d\")\n");
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs", "deps"]);
        let diags = compute_diagnostics(&module, &index, "pkg");
        assert!(diags.iter().any(|d| d.message.contains("too many positional arguments")));
    }

    #[test]
    fn variadic_builtin_accepts_arbitrary_keywords() {
        let module = crate::parser::parse("package(default_visibility = [\"PUBLIC\"], custom_flag = True)\n");
        let index = WorkspaceIndex::with_builtin("package", &["default_visibility"]);
        let diags = compute_diagnostics(&module, &index, "pkg");
        assert!(!diags.iter().any(|d| d.message.contains("takes no argument")));
    }

    #[test]
    fn identical_asts_produce_identical_diagnostic_sets() {
        let module = crate::parser::parse("frobnicate(name = \"x\")\n");
        let index = WorkspaceIndex::empty();
        let first = compute_diagnostics(&module, &index, "pkg");
        let second = compute_diagnostics(&module, &index, "pkg");
        assert_eq!(first, second);
    }
}
