//! The directory-shaped view of every package in the workspace, used by
//! package-path completion (completing `//src/co`
//! against sibling and child packages).

use std::collections::{BTreeSet, HashMap};

/// Packages grouped by path component, so completion can answer "what
/// comes after `//src/`" without re-splitting every package name on every
/// keystroke.
#[derive(Debug, Default)]
pub struct PackageTree {
    /// Every package path that actually contains a BUILD file.
    packages: BTreeSet<String>,
    /// `parent path -> immediate child path segments`, including
    /// directories that are themselves not packages but contain one
    /// further down (mirroring how `//pkg/...` wildcards treat them).
    children: HashMap<String, BTreeSet<String>>,
}

impl PackageTree {
    pub fn build(package_names: impl IntoIterator<Item = String>) -> Self {
        let mut tree = Self::default();
        for name in package_names {
            tree.insert(name);
        }
        tree
    }

    fn insert(&mut self, package: String) {
        let segments: Vec<&str> = package.split('/').filter(|s| !s.is_empty()).collect();
        let mut prefix = String::new();
        for segment in &segments {
            let parent = prefix.clone();
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            self.children.entry(parent).or_default().insert(prefix.clone());
        }
        self.packages.insert(package);
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.contains(package)
    }

    /// Immediate child package-path segments of `prefix` (an empty prefix
    /// asks for top-level packages).
    pub fn children_of(&self, prefix: &str) -> Vec<&str> {
        self.children.get(prefix).map(|set| set.iter().map(String::as_str).collect()).unwrap_or_default()
    }

    pub fn all_packages(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_nested_packages_and_their_children() {
        let tree = PackageTree::build(["src/core".to_string(), "src/app".to_string(), "tools".to_string()]);
        assert!(tree.contains("src/core"));
        let mut top: Vec<&str> = tree.children_of("");
        top.sort();
        assert_eq!(top, vec!["src", "tools"]);
        let mut under_src: Vec<&str> = tree.children_of("src");
        under_src.sort();
        assert_eq!(under_src, vec!["src/app", "src/core"]);
    }
}
