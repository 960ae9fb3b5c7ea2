//! Goto-definition: jumps from a build label string
//! literal to the `name = "..."` call that declares it, or from a call's
//! callee identifier to the `def` (builtin or user-defined) that declares
//! that function. Deterministic by construction — there is exactly one
//! declaration site for any name this dialect lets you reference twice,
//! so there is never a choice to make about which one to return.

use std::path::Path;

use tower_lsp::lsp_types::{Location, Url};

use crate::ast::{self, Module};
use crate::index::{FunctionOrigin, WorkspaceIndex};
use crate::label::BuildLabel;
use crate::position::{range_to_lsp, Position, Range};

pub fn goto_definition(
    module: &Module,
    at: Position,
    index: &WorkspaceIndex,
    current_package: &str,
    current_uri: &Url,
) -> Option<Location> {
    if let Some(location) = label_definition(module, at, index, current_package) {
        return Some(location);
    }
    if let Some(location) = function_definition(module, at, index) {
        return Some(location);
    }
    if let Some(location) = variable_definition(module, at, current_uri) {
        return Some(location);
    }
    file_definition(module, at, current_uri)
}

/// A bare identifier expression (not a call's callee, handled above by
/// [`function_definition`]) that resolves against the scope active at its
/// own position jumps to whichever assignment or parameter bound it.
fn variable_definition(module: &Module, at: Position, current_uri: &Url) -> Option<Location> {
    let mut found = None;
    ast::walk_identifier_expressions(module, |ident| {
        if found.is_some() || !contains(ident.range, at) {
            return;
        }
        let scope = ast::build_scope_at(module, ident.range.start, &ast::Scope::default());
        found = scope
            .declaration_range(&ident.name)
            .map(|range| Location { uri: current_uri.clone(), range: range_to_lsp(range) });
    });
    found
}

fn label_definition(
    module: &Module,
    at: Position,
    index: &WorkspaceIndex,
    current_package: &str,
) -> Option<Location> {
    let mut found = None;
    ast::walk_string_literals(module, |lit| {
        if found.is_some() || !contains(lit.range, at) {
            return;
        }
        let Ok(label) = lit.value.parse::<BuildLabel>() else { return };
        let label = label.resolve_relative(current_package);
        if index.resolve_label(&label, current_package) != crate::index::LabelResolution::Ok {
            return;
        }
        found = index.definition_site(&label);
    });
    found
}

fn function_definition(module: &Module, at: Position, index: &WorkspaceIndex) -> Option<Location> {
    let mut found = None;
    ast::walk_calls(module, |call| {
        if found.is_some() || !contains(call.callee.range, at) {
            return;
        }
        let Some(info) = index.lookup_function(&call.callee.name) else { return };
        found = match info.origin {
            FunctionOrigin::Builtin { file } => index
                .builtin_definition_uri(file)
                .map(|uri| Location { uri, range: range_to_lsp(info.name_range) }),
            FunctionOrigin::User { defined_in } => {
                Some(Location { uri: defined_in, range: range_to_lsp(info.name_range) })
            }
        };
    });
    found
}

/// A string literal that isn't a build label but does name an existing
/// regular file relative to the document's own directory (e.g. a
/// `srcs = ["main.go"]` entry) resolves to a zero-width location at the
/// start of that file.
fn file_definition(module: &Module, at: Position, current_uri: &Url) -> Option<Location> {
    let current_dir = current_uri.to_file_path().ok()?.parent()?.to_path_buf();
    let mut found = None;
    ast::walk_string_literals(module, |lit| {
        if found.is_some() || !contains(lit.range, at) {
            return;
        }
        if lit.value.is_empty() || crate::label::looks_like_label(&lit.value) {
            return;
        }
        let candidate = resolve_relative_file(&current_dir, &lit.value);
        if candidate.as_deref().is_some_and(|p| p.is_file()) {
            let uri = Url::from_file_path(candidate.unwrap()).ok();
            found = uri.map(|uri| Location {
                uri,
                range: range_to_lsp(Range::point(lit.range.start)),
            });
        }
    });
    found
}

fn resolve_relative_file(dir: &Path, relative: &str) -> Option<std::path::PathBuf> {
    if relative.contains("..") {
        return None;
    }
    Some(dir.join(relative))
}

fn contains(range: crate::position::Range, at: Position) -> bool {
    range.start <= at && at <= range.end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::WorkspaceIndex;

    fn index_with_real_builtins() -> (tempfile::TempDir, std::sync::Arc<WorkspaceIndex>) {
        let root = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let index = WorkspaceIndex::build_with_cache_dir(root.path().to_path_buf(), cache.path().to_path_buf());
        (cache, index)
    }

    #[test]
    fn jumps_from_a_call_to_a_builtin_definition() {
        let (_cache, index) = index_with_real_builtins();
        let module = crate::parser::parse("go_library(name = \"core\")\n");
        let at = Position::new(1, 2); // inside `go_library`
        let location = goto_definition(&module, at, &index, "src/core", &"file:///repo/BUILD".parse().unwrap());
        let location = location.expect("expected a builtin definition location");
        assert_eq!(location.uri.scheme(), "file");
        assert!(location.uri.path().ends_with("go.build_rules"));
    }

    #[test]
    fn returns_none_off_any_identifiable_token() {
        let (_cache, index) = index_with_real_builtins();
        let module = crate::parser::parse("go_library(name = \"core\")\n");
        let at = Position::new(5, 1);
        let location = goto_definition(&module, at, &index, "src/core", &"file:///repo/BUILD".parse().unwrap());
        assert!(location.is_none());
    }

    #[test]
    fn jumps_from_a_variable_reference_to_its_assignment() {
        let (_cache, index) = index_with_real_builtins();
        let module = crate::parser::parse("SRCS = [\"a.go\"]\ngo_library(name = \"core\", srcs = SRCS)\n");
        let at = Position::new(2, 35); // inside the `SRCS` reference
        let location = goto_definition(&module, at, &index, "src/core", &"file:///repo/BUILD".parse().unwrap())
            .expect("expected a jump to the SRCS assignment");
        assert_eq!(location.range.start, crate::position::to_lsp(Position::new(1, 1)));
    }

    #[test]
    fn jumps_to_an_existing_relative_file_named_in_a_string_literal() {
        let (_cache, index) = index_with_real_builtins();
        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(workspace.path().join("main.go"), "package main\n").unwrap();
        let module = crate::parser::parse("go_library(name = \"core\", srcs = [\"main.go\"])\n");
        let at = Position::new(1, 37); // inside "main.go"
        let uri: Url = Url::from_file_path(workspace.path().join("BUILD")).unwrap();
        let location = goto_definition(&module, at, &index, "pkg", &uri).expect("expected a file location");
        assert!(location.uri.path().ends_with("main.go"));
        assert_eq!(location.range.start, location.range.end);
    }
}
