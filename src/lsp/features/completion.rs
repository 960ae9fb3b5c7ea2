//! Completion. Two contexts, decided from the raw text
//! of the current line rather than the AST — completion fires mid-token,
//! while the AST on hand may still describe the text before the user's
//! last keystroke:
//!
//! 1. Inside a string literal that looks like the start of a build label
//!    (`label::looks_like_label`): complete package path segments, then
//!    (once a `:` has been typed) target names within that package.
//! 2. Inside a string literal that doesn't look like a label (a `glob()`
//!    pattern, a `srcs` entry, any other bare-string argument): the tail
//!    typed so far is treated as a filesystem path prefix under the
//!    document's own directory and completed against directory entries
//!    there.
//! 3. Anywhere else: complete the names of known functions (builtins and
//!    `def`s discovered in the workspace), so typing a rule invocation from
//!    scratch completes against what the workspace actually offers — never
//!    a generic keyword list, which is the "completion honesty" property
//!    a generic keyword list would be.

use std::path::Path;

use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind};

use crate::index::WorkspaceIndex;
use crate::label::looks_like_label;

/// A completion response plus whether the client should re-query as the
/// user keeps typing (folder listings and the two bare-quote cases below
/// are always partial).
pub struct CompletionResult {
    pub items: Vec<CompletionItem>,
    pub is_incomplete: bool,
}

impl CompletionResult {
    fn complete(items: Vec<CompletionItem>) -> Self {
        Self { items, is_incomplete: false }
    }

    fn incomplete(items: Vec<CompletionItem>) -> Self {
        Self { items, is_incomplete: true }
    }
}

pub fn complete(
    line: &str,
    character: usize,
    index: &WorkspaceIndex,
    current_package: &str,
    document_dir: Option<&Path>,
) -> CompletionResult {
    let prefix_text: String = line.chars().take(character).collect();

    if let Some(partial_label) = string_literal_prefix(&prefix_text) {
        // A bare quote or a lone path separator typed so far: offering
        // nothing yet avoids dumping the entire package tree on every
        // opening quote, but the client should keep asking as more is typed.
        if partial_label.is_empty() || partial_label == "/" {
            return CompletionResult::incomplete(Vec::new());
        }
        return complete_label(&partial_label, index, current_package, document_dir);
    }

    CompletionResult::complete(complete_function_name(&identifier_prefix(&prefix_text), index))
}

/// If the cursor sits inside an open (odd number of preceding,
/// non-escaped) quote on this line, returns the text typed since that
/// quote opened.
fn string_literal_prefix(prefix_text: &str) -> Option<String> {
    let mut in_string = false;
    let mut quote_start = 0;
    let chars: Vec<char> = prefix_text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && in_string {
            i += 2;
            continue;
        }
        if chars[i] == '"' || chars[i] == '\'' {
            if in_string {
                in_string = false;
            } else {
                in_string = true;
                quote_start = i + 1;
            }
        }
        i += 1;
    }
    in_string.then(|| chars[quote_start..].iter().collect())
}

fn identifier_prefix(prefix_text: &str) -> String {
    prefix_text
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

fn complete_label(
    partial: &str,
    index: &WorkspaceIndex,
    current_package: &str,
    document_dir: Option<&Path>,
) -> CompletionResult {
    if !looks_like_label(partial) && !partial.is_empty() {
        // Doesn't look like the start of a label at all (a glob pattern or
        // an arbitrary string argument) — fall back to treating it as a
        // filesystem path prefix under the document's own directory.
        return complete_filesystem_prefix(partial, document_dir);
    }

    if let Some((package_part, target_prefix)) = partial.split_once(':') {
        let package = resolve_partial_package(package_part, current_package);
        let items = index
            .targets_in_package(&package)
            .into_iter()
            .filter(|t| t.starts_with(target_prefix))
            .map(|t| {
                let suffix = t[target_prefix.len()..].to_string();
                CompletionItem {
                    label: format!("//{package}:{t}"),
                    insert_text: Some(suffix),
                    kind: Some(CompletionItemKind::REFERENCE),
                    ..Default::default()
                }
            })
            .collect();
        return CompletionResult::complete(items);
    }

    if partial.starts_with(':') {
        let target_prefix = &partial[1..];
        let items = index
            .targets_in_package(current_package)
            .into_iter()
            .filter(|t| t.starts_with(target_prefix))
            .map(|t| {
                let suffix = t[target_prefix.len()..].to_string();
                CompletionItem {
                    label: format!(":{t}"),
                    insert_text: Some(suffix),
                    kind: Some(CompletionItemKind::REFERENCE),
                    ..Default::default()
                }
            })
            .collect();
        return CompletionResult::complete(items);
    }

    // A package path typed without a `:` yet names only a directory
    // prefix — there may be more packages nested underneath it than this
    // one level shows, so the list is always partial.
    let path_part = partial.trim_start_matches("//");
    let (parent, leaf_prefix) = match path_part.rsplit_once('/') {
        Some((parent, leaf)) => (parent.to_string(), leaf.to_string()),
        None => (String::new(), path_part.to_string()),
    };
    let tree = index.package_tree();
    let items = tree
        .children_of(&parent)
        .into_iter()
        .filter(|child| {
            let leaf = child.rsplit('/').next().unwrap_or(child);
            leaf.starts_with(&leaf_prefix)
        })
        .map(|child| {
            let leaf = child.rsplit('/').next().unwrap_or(child);
            let suffix = leaf[leaf_prefix.len()..].to_string();
            CompletionItem {
                label: format!("//{child}"),
                insert_text: Some(suffix),
                kind: Some(CompletionItemKind::FOLDER),
                ..Default::default()
            }
        })
        .collect();
    CompletionResult::incomplete(items)
}

fn resolve_partial_package(package_part: &str, current_package: &str) -> String {
    match package_part.strip_prefix("//") {
        Some(p) => p.to_string(),
        None if package_part.is_empty() => current_package.to_string(),
        None => package_part.to_string(),
    }
}

/// Lists directory entries under `document_dir` matching `partial` as a
/// relative filesystem path prefix (spec.md §4.5.1 step 3: a non-label
/// string argument's tail is a glob prefix against the document's own
/// directory). Always partial — the eventual target may be a file one
/// level deeper than whatever this directory listing shows.
fn complete_filesystem_prefix(partial: &str, document_dir: Option<&Path>) -> CompletionResult {
    let Some(document_dir) = document_dir else {
        return CompletionResult::complete(Vec::new());
    };
    if partial.contains("..") {
        return CompletionResult::complete(Vec::new());
    }
    let (parent, leaf_prefix) = match partial.rsplit_once('/') {
        Some((parent, leaf)) => (parent, leaf),
        None => ("", partial),
    };
    let scan_dir = if parent.is_empty() { document_dir.to_path_buf() } else { document_dir.join(parent) };
    let Ok(entries) = std::fs::read_dir(&scan_dir) else {
        return CompletionResult::incomplete(Vec::new());
    };

    let items = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(leaf_prefix) {
                return None;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let suffix = name[leaf_prefix.len()..].to_string();
            let label = if parent.is_empty() { name.clone() } else { format!("{parent}/{name}") };
            Some(CompletionItem {
                label,
                insert_text: Some(suffix),
                kind: Some(if is_dir { CompletionItemKind::FOLDER } else { CompletionItemKind::FILE }),
                ..Default::default()
            })
        })
        .collect();
    CompletionResult::incomplete(items)
}

fn complete_function_name(prefix: &str, index: &WorkspaceIndex) -> Vec<CompletionItem> {
    index
        .all_functions()
        .into_iter()
        .filter(|f| f.name.starts_with(prefix))
        .map(|f| {
            let suffix = f.name[prefix.len()..].to_string();
            CompletionItem {
                label: f.name.clone(),
                insert_text: Some(suffix),
                kind: Some(CompletionItemKind::FUNCTION),
                detail: Some(format!("({})", f.param_names().join(", "))),
                documentation: f.docstring.map(tower_lsp::lsp_types::Documentation::String),
                ..Default::default()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::WorkspaceIndex;

    #[test]
    fn completes_function_names_from_a_bare_identifier_prefix() {
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs"]);
        let result = complete("go_lib", 6, &index, "src/core", None);
        assert!(!result.is_incomplete);
        assert!(result.items.iter().any(|i| i.label == "go_library"));
    }

    #[test]
    fn does_not_complete_inside_a_non_label_string() {
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs"]);
        let line = "go_library(name = \"hello wor";
        let result = complete(line, line.len(), &index, "src/core", None);
        assert!(result.items.is_empty());
    }

    #[test]
    fn bare_opening_quote_is_incomplete_with_no_items() {
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs"]);
        let line = "go_library(deps = [\"";
        let result = complete(line, line.len(), &index, "src/core", None);
        assert!(result.is_incomplete);
        assert!(result.items.is_empty());
    }

    #[test]
    fn single_slash_is_incomplete_with_no_items() {
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs"]);
        let line = "go_library(deps = [\"/";
        let result = complete(line, line.len(), &index, "src/core", None);
        assert!(result.is_incomplete);
        assert!(result.items.is_empty());
    }

    #[test]
    fn completes_target_names_after_a_colon() {
        let index = WorkspaceIndex::empty();
        let line = "go_library(deps = [\":co";
        let result = complete(line, line.len(), &index, "src/core", None);
        // No targets registered yet in this synthetic index, but the
        // completion path itself should not panic or fall through to
        // function-name completion (which would offer `go_library` etc).
        assert!(result.items.iter().all(|i| i.kind == Some(CompletionItemKind::REFERENCE)));
    }

    #[test]
    fn package_prefix_completion_is_incomplete() {
        let root = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("src/core")).unwrap();
        std::fs::write(
            root.path().join("src/core/BUILD"),
            "go_library(name = \"core\", srcs = [], visibility = [\"PUBLIC\"])\n",
        )
        .unwrap();
        let index = WorkspaceIndex::build_with_cache_dir(root.path().to_path_buf(), cache.path().to_path_buf());

        let line = "go_library(deps = [\"//s";
        let result = complete(line, line.len(), &index, "elsewhere", None);
        assert!(result.is_incomplete);
        assert!(result.items.iter().any(|i| i.label == "//src"));
    }

    #[test]
    fn insert_text_carries_only_the_untyped_suffix() {
        let root = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("src/core")).unwrap();
        std::fs::write(
            root.path().join("src/core/BUILD"),
            "go_library(name = \"core\", srcs = [], visibility = [\"PUBLIC\"])\n",
        )
        .unwrap();
        let index = WorkspaceIndex::build_with_cache_dir(root.path().to_path_buf(), cache.path().to_path_buf());

        let line = "go_library(deps = [\"//src/core:co";
        let result = complete(line, line.len(), &index, "elsewhere", None);

        let item = result.items.iter().find(|i| i.label == "//src/core:core").expect("expected the public target");
        assert_eq!(item.insert_text.as_deref(), Some("re"));
    }

    #[test]
    fn non_label_string_completes_against_the_document_directory() {
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs"]);
        let package_dir = tempfile::tempdir().unwrap();
        std::fs::write(package_dir.path().join("main.go"), "package main\n").unwrap();
        std::fs::write(package_dir.path().join("main_test.go"), "package main\n").unwrap();

        let line = "go_library(name = \"core\", srcs = [\"main";
        let result = complete(line, line.len(), &index, "src/core", Some(package_dir.path()));
        assert!(result.is_incomplete);
        assert!(result.items.iter().any(|i| i.label == "main.go" && i.insert_text.as_deref() == Some(".go")));
        assert!(result.items.iter().any(|i| i.label == "main_test.go"));
    }

    #[test]
    fn non_label_string_completion_without_a_document_directory_offers_nothing() {
        let index = WorkspaceIndex::with_builtin("go_library", &["name", "srcs"]);
        let line = "go_library(name = \"core\", srcs = [\"main";
        let result = complete(line, line.len(), &index, "src/core", None);
        assert!(result.items.is_empty());
    }
}
