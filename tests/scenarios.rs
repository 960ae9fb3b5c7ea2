//! End-to-end scenarios exercising the feature handlers against a real,
//! on-disk workspace built by [`WorkspaceIndex::build_with_cache_dir`],
//! the same way a client's request would after `initialize`. These drive
//! the pure `lsp::features::*`/`diagnostics` functions directly rather
//! than a full JSON-RPC transport, since the transport itself (tower-lsp's
//! `Server`/`LspService`) carries no logic of this crate's own to verify —
//! everything it dispatches to is already exercised here and in each
//! module's own unit tests.

use buildfile_language_server::diagnostics::compute_diagnostics;
use buildfile_language_server::index::WorkspaceIndex;
use buildfile_language_server::lsp::features::{completion, definition, formatting};
use buildfile_language_server::parser::parse;
use buildfile_language_server::position::Position;
use indoc::indoc;
use tower_lsp::lsp_types::Url;

/// A workspace with one package, `src/core`, declaring a public target
/// `core` and a private target `config_test`.
fn workspace() -> (tempfile::TempDir, tempfile::TempDir, std::sync::Arc<WorkspaceIndex>) {
    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("src/core")).unwrap();
    std::fs::write(
        root.path().join("src/core/BUILD"),
        indoc! {r#"
            go_library(name = "core", srcs = [], visibility = ["PUBLIC"])
            go_library(name = "config_test", srcs = [])
        "#},
    )
    .unwrap();
    let index = WorkspaceIndex::build_with_cache_dir(root.path().to_path_buf(), cache.path().to_path_buf());
    (root, cache, index)
}

fn virtual_uri() -> Url {
    "file:///workspace/virtual/BUILD".parse().unwrap()
}

#[test]
fn scenario_1_definition_on_a_builtin_resolves_to_a_real_cache_file() {
    let (_root, _cache, index) = workspace();
    let module = parse("genrule()\n");

    let location = definition::goto_definition(&module, Position::new(1, 6), &index, "src/core", &virtual_uri())
        .expect("genrule is a bundled builtin");

    assert_eq!(location.uri.scheme(), "file");
    assert!(location.uri.path().ends_with("core.build_rules"));
}

#[test]
fn scenario_2_label_completion_offers_the_full_label_and_inserts_only_the_target() {
    let (_root, _cache, index) = workspace();
    let line = "        \"//src/core:\"";

    let result = completion::complete(line, 20, &index, "src/core", None);

    let item =
        result.items.iter().find(|i| i.label == "//src/core:core").expect("expected the public target to be offered");
    assert_eq!(item.insert_text.as_deref(), Some("core"));
}

#[test]
fn scenario_3_package_prefix_completion_is_incomplete_and_offers_the_next_segment() {
    let (_root, _cache, index) = workspace();
    let line = "        \"//src/core:\"";

    let result = completion::complete(line, 12, &index, "src/core", None);

    assert!(result.items.iter().any(|i| i.label == "//src"));
    assert!(result.is_incomplete, "package-path completions are never a final answer");
}

#[test]
fn scenario_4_diagnostic_on_an_invisible_label() {
    let (_root, _cache, index) = workspace();
    let module = parse(indoc! {r#"
        go_library(
            name = "test",
            deps = ["//src/core:config_test"],
        )
    "#});

    let diagnostics = compute_diagnostics(&module, &index, "test");

    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("config_test"));
    assert!(diagnostics[0].message.contains("not visible"));
}

#[test]
fn scenario_5_reparsing_unchanged_text_yields_an_identical_diagnostic_set() {
    let (_root, _cache, index) = workspace();
    let text = indoc! {r#"
        go_library(
            name = "test",
            deps = ["//src/core:config_test"],
        )
    "#};

    let first = compute_diagnostics(&parse(text), &index, "test");
    let second = compute_diagnostics(&parse(text), &index, "test");

    assert_eq!(first, second, "a no-op didChange must not produce a new diagnostic set");
}

#[test]
fn scenario_6_formatting_reindents_a_compact_call() {
    let outcome = formatting::format("go_test(name=\"x\",srcs=[\"x.go\"])\n");
    let edits = match outcome {
        formatting::Formatting::Edits(edits) => edits,
        formatting::Formatting::ParseErrors => panic!("expected a clean parse"),
    };
    assert!(!edits.is_empty());

    let formatted = apply_edits("go_test(name=\"x\",srcs=[\"x.go\"])\n", &edits);
    assert_eq!(
        formatted,
        "go_test(\n    name = \"x\",\n    srcs = [\"x.go\"],\n)\n"
    );
}

/// Applies a set of line/column `TextEdit`s to `text`, for asserting on
/// the result without duplicating `format::diff_to_edits`'s own logic.
fn apply_edits(text: &str, edits: &[tower_lsp::lsp_types::TextEdit]) -> String {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    // Applying from the last edit backward keeps earlier positions valid.
    let mut sorted = edits.to_vec();
    sorted.sort_by_key(|e| (e.range.start.line, e.range.start.character));
    for edit in sorted.iter().rev() {
        let start_line = edit.range.start.line as usize;
        let end_line = edit.range.end.line as usize;
        let start_col = edit.range.start.character as usize;
        let end_col = edit.range.end.character as usize;

        let prefix = lines[start_line][..start_col.min(lines[start_line].len())].to_string();
        let suffix = lines[end_line][end_col.min(lines[end_line].len())..].to_string();
        let replacement_lines: Vec<&str> = edit.new_text.split('\n').collect();

        let mut new_lines: Vec<String> = Vec::new();
        if replacement_lines.len() == 1 {
            new_lines.push(format!("{prefix}{}{suffix}", replacement_lines[0]));
        } else {
            new_lines.push(format!("{prefix}{}", replacement_lines[0]));
            for middle in &replacement_lines[1..replacement_lines.len() - 1] {
                new_lines.push(middle.to_string());
            }
            new_lines.push(format!("{}{suffix}", replacement_lines[replacement_lines.len() - 1]));
        }

        lines.splice(start_line..=end_line, new_lines);
    }
    lines.join("\n")
}
