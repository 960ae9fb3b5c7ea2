//! The function registry: builtin build-rule signatures bundled into the
//! binary, plus `def`-defined functions discovered by scanning the
//! workspace, kept fresh by periodic re-scans.
//!
//! Builtin signatures are shipped as data rather than a hardcoded Rust
//! match — actual BUILD-dialect source bundled via `include_str!` and run
//! through our own parser, so the "signature" a completion or diagnostic
//! sees is produced by the same code path a hand-written `def` would be.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tower_lsp::lsp_types::Url;

use crate::ast::Stmt;
use crate::position::Range;

pub(crate) const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("go.build_rules", include_str!("builtin_defs/go.build_rules")),
    ("core.build_rules", include_str!("builtin_defs/core.build_rules")),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionOrigin {
    Builtin { file: &'static str },
    User { defined_in: Url },
}

/// One declared parameter of a function, as seen by argument-checking and
/// completion. `has_default` mirrors `ast::Param::has_default` — a
/// parameter with a default is optional at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSignature {
    pub name: String,
    pub has_default: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub params: Vec<ParamSignature>,
    pub docstring: Option<String>,
    pub origin: FunctionOrigin,
    /// The `def`'s name-token range within whichever source it was
    /// extracted from — the bundled stub file for builtins, or the
    /// workspace BUILD file for user-defined functions. Used by
    /// goto-definition to jump straight to the declaration.
    pub name_range: Range,
}

/// Builtins whose real signature accepts arbitrary keyword arguments
/// beyond the ones declared in their stub (e.g. `package()` sets one of a
/// open-ended set of package-wide config keys). Exempted from the unknown-
/// keyword-argument check; still subject to the positional/required checks.
pub const VARIADIC_BUILTINS: &[&str] = &["package"];

impl FunctionInfo {
    pub fn params(&self) -> Option<&[ParamSignature]> {
        Some(&self.params)
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn accepts_arbitrary_keywords(&self) -> bool {
        VARIADIC_BUILTINS.contains(&self.name.as_str())
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.origin, FunctionOrigin::Builtin { .. })
    }
}

/// Extracts every top-level `def` in `source` as a [`FunctionInfo`].
pub fn extract_function_defs(source: &str, origin: impl Fn() -> FunctionOrigin) -> Vec<FunctionInfo> {
    let module = crate::parser::parse(source);
    module
        .statements
        .into_iter()
        .filter_map(|stmt| match stmt {
            Stmt::FunctionDef(func) => Some(FunctionInfo {
                name: func.name.name,
                name_range: func.name.range,
                params: func
                    .params
                    .into_iter()
                    .map(|p| ParamSignature { name: p.name, has_default: p.has_default })
                    .collect(),
                docstring: func.docstring,
                origin: origin(),
            }),
            _ => None,
        })
        .collect()
}

/// `name -> signature`, seeded with the bundled builtins and periodically
/// refreshed with whatever `def`s the workspace scan finds.
pub struct FunctionRegistry {
    entries: DashMap<String, FunctionInfo>,
}

impl FunctionRegistry {
    pub fn with_builtins() -> Arc<Self> {
        let entries = DashMap::new();
        for (file, source) in BUILTIN_SOURCES {
            for info in extract_function_defs(source, || FunctionOrigin::Builtin { file }) {
                entries.insert(info.name.clone(), info);
            }
        }
        Arc::new(Self { entries })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self { entries: DashMap::new() })
    }

    /// Registers a synthetic builtin for tests. `name` (the rule's own
    /// `name` parameter) is required; every other listed parameter is
    /// given a default, matching how every bundled stub in
    /// `builtin_defs/*.build_rules` actually declares its signature.
    pub fn insert_test_builtin(&self, name: &str, params: &[&str]) {
        self.entries.insert(
            name.to_string(),
            FunctionInfo {
                name: name.to_string(),
                params: params
                    .iter()
                    .map(|p| ParamSignature { name: p.to_string(), has_default: *p != "name" })
                    .collect(),
                docstring: None,
                origin: FunctionOrigin::Builtin { file: "test" },
                name_range: Range::point(crate::position::Position::new(1, 1)),
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<FunctionInfo> {
        self.entries.get(name).map(|entry| entry.clone())
    }

    pub fn all(&self) -> Vec<FunctionInfo> {
        self.entries.iter().map(|entry| entry.clone()).collect()
    }

    /// Replaces every user-defined entry with `discovered`, leaving
    /// builtins untouched. Called at startup and on each periodic rescan
    /// (a polling merge, not an incremental diff).
    pub fn replace_user_functions(&self, discovered: HashMap<String, FunctionInfo>) {
        self.entries.retain(|_, info| info.is_builtin());
        for (name, info) in discovered {
            // A user `def` with the same name as a builtin shadows it for
            // completion/diagnostics purposes within its own workspace,
            // matching how `subinclude`d overrides behave in practice.
            self.entries.insert(name, info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_builtins_parse_and_are_queryable() {
        let registry = FunctionRegistry::with_builtins();
        let go_library = registry.lookup("go_library").expect("go_library should be a known builtin");
        assert!(go_library.param_names().contains(&"srcs"));
        assert!(go_library.is_builtin());
    }

    #[test]
    fn user_function_replaces_stale_entries_but_not_builtins() {
        let registry = FunctionRegistry::with_builtins();
        let uri: Url = "file:///repo/build_defs/custom.build_defs".parse().unwrap();
        let mut discovered = HashMap::new();
        discovered.insert(
            "my_rule".to_string(),
            FunctionInfo {
                name: "my_rule".to_string(),
                params: vec![ParamSignature { name: "name".to_string(), has_default: false }],
                docstring: None,
                origin: FunctionOrigin::User { defined_in: uri.clone() },
                name_range: Range::point(crate::position::Position::new(1, 5)),
            },
        );
        registry.replace_user_functions(discovered);
        assert!(registry.lookup("go_library").is_some());
        assert!(registry.lookup("my_rule").is_some());

        registry.replace_user_functions(HashMap::new());
        assert!(registry.lookup("my_rule").is_none());
        assert!(registry.lookup("go_library").is_some());
    }
}
