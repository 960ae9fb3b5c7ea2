//! Build labels: `//package/path:target`, `:target` (current-package
//! shorthand), and subrepo-qualified `@subrepo//package:target`.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label package path contains a '..' segment: {0}")]
    ParentTraversal(String),
    #[error("label has an empty target name")]
    EmptyTarget,
    #[error("not a build label")]
    NotALabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildLabel {
    pub subrepo: Option<String>,
    pub package: String,
    pub target: String,
}

impl BuildLabel {
    /// `true` for the wildcard target name `all` ("all targets in the package").
    pub fn is_wildcard(&self) -> bool {
        self.target == "all"
    }

    /// `true` for the `//pkg/...` wildcard-over-subpackages form.
    pub fn is_wildcard_path(&self) -> bool {
        self.target == "..."
    }

    /// Resolves a `:target`-shorthand label against the package that
    /// contains the document it appears in.
    pub fn resolve_relative(self, current_package: &str) -> Self {
        if self.package.is_empty() {
            BuildLabel { package: current_package.to_string(), ..self }
        } else {
            self
        }
    }
}

impl fmt::Display for BuildLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(subrepo) = &self.subrepo {
            write!(f, "@{subrepo}")?;
        }
        write!(f, "//{}:{}", self.package, self.target)
    }
}

impl FromStr for BuildLabel {
    type Err = LabelError;

    /// Parses any of:
    /// - `//package/path:target`
    /// - `//package/path` (shorthand for the target with the same basename)
    /// - `:target` (current package, resolved later by [`BuildLabel::resolve_relative`])
    /// - `@subrepo//package:target`
    /// - `//package/...` wildcard over subpackages, where `target` becomes `"..."`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s;

        let subrepo = if let Some(stripped) = rest.strip_prefix('@') {
            let (name, after) = stripped.split_once("//").ok_or(LabelError::NotALabel)?;
            rest = after;
            Some(name.to_string())
        } else {
            None
        };

        if let Some(stripped) = rest.strip_prefix("//") {
            let (package, target) = match stripped.split_once(':') {
                Some((pkg, tgt)) => (pkg.to_string(), tgt.to_string()),
                None => {
                    // `//package/path` with no `:target` — PACKAGE/... wildcard or
                    // shorthand for the target named after the last path segment.
                    if let Some(pkg) = stripped.strip_suffix("/...") {
                        (pkg.to_string(), "...".to_string())
                    } else {
                        let name = stripped.rsplit('/').next().unwrap_or(stripped).to_string();
                        (stripped.to_string(), name)
                    }
                }
            };
            validate_package(&package)?;
            if target.is_empty() {
                return Err(LabelError::EmptyTarget);
            }
            Ok(BuildLabel { subrepo, package, target })
        } else if let Some(target) = rest.strip_prefix(':') {
            if target.is_empty() {
                return Err(LabelError::EmptyTarget);
            }
            Ok(BuildLabel { subrepo, package: String::new(), target: target.to_string() })
        } else {
            Err(LabelError::NotALabel)
        }
    }
}

fn validate_package(package: &str) -> Result<(), LabelError> {
    if package.split('/').any(|segment| segment == "..") {
        return Err(LabelError::ParentTraversal(package.to_string()));
    }
    Ok(())
}

/// Heuristic used by completion: does this string
/// tail look like the start of a build label, as opposed to a filesystem
/// glob or an arbitrary string?
pub fn looks_like_label(tail: &str) -> bool {
    tail.starts_with(':')
        || tail.starts_with("//")
        || tail.starts_with('@')
        || tail
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && tail.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fully_qualified_label() {
        let label: BuildLabel = "//src/core:core".parse().unwrap();
        assert_eq!(label.package, "src/core");
        assert_eq!(label.target, "core");
        assert_eq!(label.subrepo, None);
    }

    #[test]
    fn parses_relative_target_shorthand() {
        let label: BuildLabel = ":config_test".parse().unwrap();
        assert_eq!(label.package, "");
        assert_eq!(label.target, "config_test");
        let resolved = label.resolve_relative("src/core");
        assert_eq!(resolved.package, "src/core");
    }

    #[test]
    fn parses_subrepo_qualified_label() {
        let label: BuildLabel = "@third_party//src/core:core".parse().unwrap();
        assert_eq!(label.subrepo.as_deref(), Some("third_party"));
        assert_eq!(label.package, "src/core");
    }

    #[test]
    fn parses_wildcard_over_subpackages() {
        let label: BuildLabel = "//src/...".parse().unwrap();
        assert!(label.is_wildcard_path());
    }

    #[test]
    fn rejects_parent_traversal() {
        assert_eq!(
            "//../etc:passwd".parse::<BuildLabel>(),
            Err(LabelError::ParentTraversal("../etc".to_string()))
        );
    }

    #[test]
    fn rejects_empty_target() {
        assert_eq!("//src/core:".parse::<BuildLabel>(), Err(LabelError::EmptyTarget));
    }

    #[test]
    fn display_round_trips() {
        let label: BuildLabel = "//src/core:core".parse().unwrap();
        assert_eq!(label.to_string(), "//src/core:core");
    }
}
