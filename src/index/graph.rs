//! The build graph: every package discovered in the workspace, and the
//! targets each one declares along with their visibility.

use std::collections::HashMap;

use tower_lsp::lsp_types::Url;

use crate::ast::{self, Expr};
use crate::label::BuildLabel;
use crate::position::Range;

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    /// Raw visibility entries as written (`PUBLIC`, `//other/pkg:target`,
    /// `//other/pkg/...`). Interpreted by [`Target::visible_from`].
    pub visibility: Vec<String>,
    /// Range of the `name = "..."` string literal that declares this
    /// target, for goto-definition.
    pub name_range: Range,
}

impl Target {
    pub fn visible_from(&self, requesting_package: &str, owning_package: &str) -> bool {
        if requesting_package == owning_package {
            return true;
        }
        if self.visibility.is_empty() {
            // No explicit visibility: this dialect's convention (like the
            // build tools it borrows its vocabulary from) is package-private
            // by default.
            return false;
        }
        self.visibility.iter().any(|entry| {
            entry == "PUBLIC"
                || entry
                    .parse::<BuildLabel>()
                    .map(|label| {
                        if label.is_wildcard_path() {
                            requesting_package == label.package
                                || requesting_package.starts_with(&format!("{}/", label.package))
                        } else {
                            requesting_package == label.package
                        }
                    })
                    .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Package {
    pub name: String,
    pub targets: HashMap<String, Target>,
    pub default_visibility: Vec<String>,
    /// The BUILD file this package was parsed from. `None` only for
    /// synthetic packages built directly in tests.
    pub file: Option<Url>,
    /// Labels named by this package's own `subinclude(...)` statements,
    /// resolved against `name` so a `:sibling` form becomes a full label.
    pub subincludes: Vec<BuildLabel>,
}

#[derive(Debug, Default)]
pub struct BuildGraph {
    packages: HashMap<String, Package>,
}

impl BuildGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn package_exists(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn insert_package(&mut self, package: Package) {
        self.packages.insert(package.name.clone(), package);
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }
}

/// Builds a [`Package`] from one BUILD file's parsed contents.
pub fn package_from_module(package_name: &str, module: &ast::Module) -> Package {
    let mut pkg = Package { name: package_name.to_string(), ..Default::default() };

    for stmt in &module.statements {
        if let ast::Stmt::Expr(Expr::Call(call)) = stmt {
            if call.callee.name == "package" {
                if let Some(Expr::List(items, _)) = call.keyword_arg("default_visibility") {
                    pkg.default_visibility = items
                        .iter()
                        .filter_map(|e| match e {
                            Expr::String(s) => Some(s.value.clone()),
                            Expr::Identifier(i) if i.name == "PUBLIC" => Some("PUBLIC".to_string()),
                            _ => None,
                        })
                        .collect();
                }
            }
        }
    }

    for stmt in &module.statements {
        if let ast::Stmt::Subinclude(call) = stmt {
            if let Some(label) = subinclude_target(call) {
                pkg.subincludes.push(label.resolve_relative(package_name));
            }
        }
    }

    ast::walk_calls(module, |call| {
        if call.callee.name == "package" {
            return;
        }
        let Some(name) = call.target_name() else { return };
        let Some(name_range) = call.target_name_range() else { return };
        let visibility = match call.keyword_arg("visibility") {
            Some(Expr::List(items, _)) => items
                .iter()
                .filter_map(|e| match e {
                    Expr::String(s) => Some(s.value.clone()),
                    Expr::Identifier(i) if i.name == "PUBLIC" => Some("PUBLIC".to_string()),
                    _ => None,
                })
                .collect(),
            _ => pkg.default_visibility.clone(),
        };
        pkg.targets.insert(name.to_string(), Target { name: name.to_string(), visibility, name_range });
    });

    pkg
}

/// `subinclude("//build_defs:go.build_defs")` names its target as a bare
/// positional string argument; anything else (a concatenated label, an
/// identifier) isn't a form this dialect's index can resolve statically.
fn subinclude_target(call: &ast::Call) -> Option<BuildLabel> {
    call.args.iter().find_map(|arg| match arg {
        ast::Arg::Positional(Expr::String(s)) => s.value.parse::<BuildLabel>().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_range() -> Range {
        Range::point(crate::position::Position::new(1, 1))
    }

    #[test]
    fn public_visibility_is_visible_from_anywhere() {
        let target = Target { name: "core".into(), visibility: vec!["PUBLIC".into()], name_range: dummy_range() };
        assert!(target.visible_from("somewhere/else", "src/core"));
    }

    #[test]
    fn default_private_visibility_is_only_visible_from_its_own_package() {
        let target = Target { name: "core".into(), visibility: vec![], name_range: dummy_range() };
        assert!(target.visible_from("src/core", "src/core"));
        assert!(!target.visible_from("src/other", "src/core"));
    }

    #[test]
    fn explicit_package_visibility_allows_that_one_package() {
        let target = Target {
            name: "core".into(),
            visibility: vec!["//src/app:app".into()],
            name_range: dummy_range(),
        };
        assert!(target.visible_from("src/app", "src/core"));
        assert!(!target.visible_from("src/other", "src/core"));
    }

    #[test]
    fn package_from_module_collects_targets_and_visibility() {
        let module = crate::parser::parse(
            "go_library(name = \"core\", srcs = [\"a.go\"], visibility = [\"PUBLIC\"])\n",
        );
        let pkg = package_from_module("src/core", &module);
        let target = pkg.targets.get("core").unwrap();
        assert_eq!(target.visibility, vec!["PUBLIC".to_string()]);
    }

    #[test]
    fn package_from_module_records_subincludes_and_does_not_treat_them_as_targets() {
        let module = crate::parser::parse(
            "subinclude(\"//build_defs:go.build_defs\")\n\ngo_library(name = \"core\")\n",
        );
        let pkg = package_from_module("src/core", &module);
        assert_eq!(pkg.subincludes.len(), 1);
        assert_eq!(pkg.subincludes[0].package, "build_defs");
        assert_eq!(pkg.subincludes[0].target, "go.build_defs");
        assert!(!pkg.targets.contains_key("go.build_defs"));
    }

    #[test]
    fn relative_subinclude_resolves_against_its_own_package() {
        let module = crate::parser::parse("subinclude(\":local.build_defs\")\n");
        let pkg = package_from_module("src/core", &module);
        assert_eq!(pkg.subincludes[0].package, "src/core");
    }
}
