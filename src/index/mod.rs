//! The workspace index (component C6): built once at `initialize` by
//! walking the workspace for BUILD files, then kept fresh by a periodic
//! rescan that picks up newly written or edited files without requiring a
//! server restart.
//!
//! A `rayon`-parallel directory walk builds the in-memory package/target/
//! function graph once at startup, then the periodic rescan rebuilds it
//! the same way.

pub mod builtin_cache;
pub mod functions;
pub mod graph;
pub mod package_tree;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use rayon::prelude::*;
use tower_lsp::lsp_types::Url;
use tracing::info;
use walkdir::WalkDir;

use crate::ast::Scope;
use crate::label::BuildLabel;

pub use functions::{FunctionInfo, FunctionOrigin, FunctionRegistry};
pub use graph::{BuildGraph, Package, Target};
pub use package_tree::PackageTree;

/// How often the background rescan re-walks the workspace for new or
/// changed `def`s and targets.
pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(2);

/// The filename this dialect's build files are recognized by. A single
/// constant because every scan, label-resolution, and package-boundary
/// check needs to agree on it.
pub const BUILD_FILE_NAME: &str = "BUILD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelResolution {
    Ok,
    NoSuchPackage,
    NoSuchTarget,
    NotVisible,
}

pub struct WorkspaceIndex {
    workspace_root: PathBuf,
    builtin_cache_dir: PathBuf,
    functions: std::sync::Arc<FunctionRegistry>,
    graph: RwLock<BuildGraph>,
    package_tree: RwLock<PackageTree>,
}

impl WorkspaceIndex {
    /// Walks `workspace_root` once, synchronously, building the initial
    /// graph. Convenient for tests that want a ready-to-query index; the
    /// running server uses [`Self::build_empty`] instead, since this would
    /// block `initialize`'s reply on the entire workspace walk.
    pub fn build(workspace_root: PathBuf) -> std::sync::Arc<Self> {
        Self::build_with_cache_dir(workspace_root, builtin_cache::resolve_cache_dir(None))
    }

    pub fn build_with_cache_dir(workspace_root: PathBuf, builtin_cache_dir: PathBuf) -> std::sync::Arc<Self> {
        let index = Self::build_empty_with_cache_dir(workspace_root, builtin_cache_dir);
        index.rescan();
        index
    }

    /// Builds the index structure and extracts the bundled builtin stubs,
    /// but does not walk the workspace — the graph and package tree stay
    /// empty until [`Self::spawn_rescan_loop`] runs its first pass. This is
    /// what `initialize` calls: cheap enough to run inline, so the JSON-RPC
    /// reply never waits on the whole-graph walk ("no query blocks" /
    /// "queries return partial data" until the background scan completes).
    pub fn build_empty(workspace_root: PathBuf) -> std::sync::Arc<Self> {
        Self::build_empty_with_cache_dir(workspace_root, builtin_cache::resolve_cache_dir(None))
    }

    pub fn build_empty_with_cache_dir(workspace_root: PathBuf, builtin_cache_dir: PathBuf) -> std::sync::Arc<Self> {
        if let Err(err) = builtin_cache::extract_all(&builtin_cache_dir) {
            tracing::warn!(error = %err, dir = %builtin_cache_dir.display(), "failed to extract builtin stubs to cache");
        }
        let functions = FunctionRegistry::with_builtins();
        std::sync::Arc::new(Self {
            workspace_root,
            builtin_cache_dir,
            functions,
            graph: RwLock::new(BuildGraph::empty()),
            package_tree: RwLock::new(PackageTree::default()),
        })
    }

    pub fn empty() -> Self {
        Self {
            workspace_root: PathBuf::new(),
            builtin_cache_dir: std::env::temp_dir().join(builtin_cache::CACHE_DIR_NAME),
            functions: FunctionRegistry::empty(),
            graph: RwLock::new(BuildGraph::empty()),
            package_tree: RwLock::new(PackageTree::default()),
        }
    }

    #[cfg(test)]
    pub fn with_builtin(name: &str, params: &[&str]) -> Self {
        let index = Self::empty();
        index.functions.insert_test_builtin(name, params);
        index
    }

    /// Spawns the background rescan loop. The first scan (whether this
    /// index was constructed empty via [`Self::build_empty`] or already
    /// scanned once via [`Self::build`]) runs as soon as this task gets
    /// scheduled, then every `interval` after that. Returns the task handle
    /// so the caller can abort it at shutdown.
    pub fn spawn_rescan_loop(
        self: &std::sync::Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let index = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await; // fires immediately on the first iteration.
                index.rescan();
            }
        })
    }

    fn rescan(&self) {
        let build_files = find_build_files(&self.workspace_root);
        let parsed: Vec<(String, crate::ast::Module, PathBuf)> = build_files
            .par_iter()
            .map(|path| {
                let package = package_name_for(&self.workspace_root, path);
                let text = std::fs::read_to_string(path).unwrap_or_default();
                (package, crate::parser::parse(&text), path.clone())
            })
            .collect();

        let mut graph = BuildGraph::empty();
        let mut user_functions = HashMap::new();
        for (package, module, path) in &parsed {
            let file_uri = Url::from_file_path(path).ok();
            let mut pkg = graph::package_from_module(package, module);
            pkg.file = file_uri.clone();
            graph.insert_package(pkg);
            for info in functions::extract_function_defs(&std::fs::read_to_string(path).unwrap_or_default(), || {
                FunctionOrigin::User { defined_in: file_uri.clone().unwrap_or_else(|| "file:///unknown".parse().unwrap()) }
            }) {
                user_functions.insert(info.name.clone(), info);
            }
        }
        self.functions.replace_user_functions(user_functions);

        let package_names: Vec<String> = parsed.iter().map(|(pkg, _, _)| pkg.clone()).collect();
        *self.package_tree.write().unwrap() = PackageTree::build(package_names);
        *self.graph.write().unwrap() = graph;

        crate::metrics::metrics().record_workspace_index(parsed.len());
        info!(packages = parsed.len(), "workspace index rescanned");
    }

    pub fn lookup_function(&self, name: &str) -> Option<FunctionInfo> {
        self.functions.lookup(name)
    }

    pub fn all_functions(&self) -> Vec<FunctionInfo> {
        self.functions.all()
    }

    pub fn package_exists(&self, name: &str) -> bool {
        self.graph.read().unwrap().package_exists(name)
    }

    pub fn package_tree(&self) -> std::sync::RwLockReadGuard<'_, PackageTree> {
        self.package_tree.read().unwrap()
    }

    pub fn targets_in_package(&self, package: &str) -> Vec<String> {
        self.graph
            .read()
            .unwrap()
            .package(package)
            .map(|pkg| pkg.targets.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The location of a resolved label's `name = "..."` declaration, for
    /// goto-definition. Returns `None` if the package has no file on
    /// record (never true for anything `resolve_label` called `Ok`, but
    /// kept fallible rather than panicking on a synthetic test index).
    pub fn definition_site(&self, label: &BuildLabel) -> Option<tower_lsp::lsp_types::Location> {
        let graph = self.graph.read().unwrap();
        let package = graph.package(&label.package)?;
        let target = package.targets.get(&label.target)?;
        let uri = package.file.clone()?;
        Some(tower_lsp::lsp_types::Location {
            uri,
            range: crate::position::range_to_lsp(target.name_range),
        })
    }

    /// Guarantees a builtin's stub file exists in the cache directory and
    /// returns its `file://` URI, for goto-definition.
    pub fn builtin_definition_uri(&self, file: &str) -> Option<Url> {
        builtin_cache::ensure_extracted(&self.builtin_cache_dir, file).ok()?;
        builtin_cache::file_uri(&self.builtin_cache_dir, file)
    }

    pub fn resolve_label(&self, label: &BuildLabel, from_package: &str) -> LabelResolution {
        let graph = self.graph.read().unwrap();
        let Some(package) = graph.package(&label.package) else {
            return LabelResolution::NoSuchPackage;
        };
        let Some(target) = package.targets.get(&label.target) else {
            return LabelResolution::NoSuchTarget;
        };
        if target.visible_from(from_package, &label.package) {
            LabelResolution::Ok
        } else {
            LabelResolution::NotVisible
        }
    }

    /// Workspace-level identifiers available in every document's scope
    /// without assignment: the `PUBLIC` visibility constant, plus whatever
    /// repository-level configuration identifiers `config_identifiers`
    /// discovered at startup.
    pub fn global_scope(&self) -> Scope {
        let mut source = String::from("PUBLIC = None\n");
        for ident in self.config_identifiers() {
            source.push_str(&ident);
            source.push_str(" = None\n");
        }
        let module = crate::parser::parse(&source);
        let past_last_line = module.statements.len() as u32 + 1;
        crate::ast::build_scope_at(
            &module,
            crate::position::Position::new(past_last_line, 1),
            &Scope::default(),
        )
    }

    /// Repository-level configuration identifiers (spec.md §4.3 rule 3):
    /// read from a `.buildconfig` file at the workspace root, one
    /// `key = value` or `key: value` pair per line (`[section]` headers and
    /// `#`-comments are skipped; this is the "discovered at startup" format
    /// `spec.md` leaves otherwise unspecified — see DESIGN.md). Returns an
    /// empty list when the file doesn't exist or a key isn't a valid
    /// identifier.
    pub fn config_identifiers(&self) -> Vec<String> {
        let path = self.workspace_root.join(".buildconfig");
        let Ok(text) = std::fs::read_to_string(&path) else { return Vec::new() };
        parse_buildconfig_identifiers(&text)
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn package_for_uri(&self, uri: &Url) -> String {
        let Ok(path) = uri.to_file_path() else { return String::new() };
        package_name_for(&self.workspace_root, &path)
    }
}

fn find_build_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == BUILD_FILE_NAME)
        .map(|entry| entry.into_path())
        .collect()
}

/// Pulls the `key` out of each `key = value` / `key: value` line of a
/// `.buildconfig` file, skipping blanks, `#`-comments, and `[section]`
/// headers, and keeping only keys that parse as a plain identifier (so the
/// synthetic `key = None` assignment `global_scope` builds from them is
/// always valid BUILD syntax).
fn parse_buildconfig_identifiers(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('['))
        .filter_map(|line| line.split(['=', ':']).next())
        .map(str::trim)
        .filter(|key| is_identifier(key))
        .map(str::to_string)
        .collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn package_name_for(workspace_root: &Path, build_file: &Path) -> String {
    let dir = build_file.parent().unwrap_or(build_file);
    let relative = dir.strip_prefix(workspace_root).unwrap_or(dir);
    relative.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rescan_discovers_packages_targets_and_user_functions() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("src/core");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(
            pkg_dir.join("BUILD"),
            "def my_rule(name):\n    pass\n\nmy_rule(name = \"thing\", visibility = [\"PUBLIC\"])\n",
        )
        .unwrap();

        let index = WorkspaceIndex::build(dir.path().to_path_buf());
        assert!(index.package_exists("src/core"));
        assert!(index.lookup_function("my_rule").is_some());
        let label: BuildLabel = "//src/core:thing".parse().unwrap();
        assert_eq!(index.resolve_label(&label, "elsewhere"), LabelResolution::Ok);
    }

    #[test]
    fn package_name_for_strips_workspace_root_and_filename() {
        let root = Path::new("/repo");
        let file = Path::new("/repo/src/core/BUILD");
        assert_eq!(package_name_for(root, file), "src/core");
    }

    #[test]
    fn config_identifiers_are_read_from_a_buildconfig_file_at_the_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".buildconfig"),
            "# comment\n[go]\ngo_version = 1.21\nrelease-channel: stable\n\nmax_workers = 4\n",
        )
        .unwrap();

        let index = WorkspaceIndex::build_empty(dir.path().to_path_buf());
        let identifiers = index.config_identifiers();
        assert!(identifiers.contains(&"go_version".to_string()));
        assert!(identifiers.contains(&"max_workers".to_string()));
        // `release-channel` isn't a valid identifier (contains `-`), so it's skipped.
        assert!(!identifiers.iter().any(|i| i.contains('-')));
    }

    #[test]
    fn config_identifiers_are_visible_in_the_global_scope() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".buildconfig"), "max_workers = 4\n").unwrap();

        let index = WorkspaceIndex::build_empty(dir.path().to_path_buf());
        let scope = index.global_scope();
        assert!(scope.contains("PUBLIC"));
        assert!(scope.contains("max_workers"));
    }

    #[test]
    fn missing_buildconfig_yields_no_config_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let index = WorkspaceIndex::build_empty(dir.path().to_path_buf());
        assert!(index.config_identifiers().is_empty());
    }

    #[test]
    fn build_empty_does_not_walk_the_workspace() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/core")).unwrap();
        fs::write(
            dir.path().join("src/core/BUILD"),
            "go_library(name = \"core\", visibility = [\"PUBLIC\"])\n",
        )
        .unwrap();

        let index = WorkspaceIndex::build_empty(dir.path().to_path_buf());
        assert!(!index.package_exists("src/core"));

        index.rescan();
        assert!(index.package_exists("src/core"));
    }
}
