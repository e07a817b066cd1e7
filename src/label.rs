//! Bazel labels
//!
//! A label names one rule across the whole build graph: the repository it
//! lives in, the slash-separated package path relative to that repository's
//! root, and the rule name. Labels are the values written into dependency
//! attributes once resolution has run.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label is empty")]
    Empty,

    #[error("invalid label {label:?}: {reason}")]
    Invalid { label: String, reason: &'static str },
}

/// A `(repository, package, name)` triple.
///
/// `relative` labels print as `:name` and are only meaningful inside the
/// package they were made relative to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub repo: String,
    pub pkg: String,
    pub name: String,
    pub relative: bool,
}

impl Label {
    pub fn new(repo: impl Into<String>, pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            pkg: pkg.into(),
            name: name.into(),
            relative: false,
        }
    }

    /// Rewrites the label so it reads naturally from inside `repo//pkg`.
    pub fn rel(&self, repo: &str, pkg: &str) -> Label {
        if self.relative || self.repo != repo {
            return self.clone();
        }
        if self.pkg == pkg {
            return Label {
                repo: String::new(),
                pkg: String::new(),
                name: self.name.clone(),
                relative: true,
            };
        }
        Label {
            repo: String::new(),
            ..self.clone()
        }
    }

    /// True when both labels point at the same rule, ignoring relativity.
    pub fn same_target(&self, other: &Label) -> bool {
        self.repo == other.repo && self.pkg == other.pkg && self.name == other.name
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative {
            return write!(f, ":{}", self.name);
        }
        if !self.repo.is_empty() {
            write!(f, "@{}", self.repo)?;
        }
        write!(f, "//{}", self.pkg)?;
        let last = self.pkg.rsplit('/').next().unwrap_or("");
        if last != self.name {
            write!(f, ":{}", self.name)?;
        }
        Ok(())
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(LabelError::Empty);
        }
        let invalid = |reason| LabelError::Invalid {
            label: s.to_string(),
            reason,
        };

        let (repo, rest) = match s.strip_prefix('@') {
            Some(stripped) => {
                let end = stripped
                    .find("//")
                    .ok_or_else(|| invalid("repository must be followed by //"))?;
                (&stripped[..end], &stripped[end..])
            }
            None => ("", s),
        };
        if repo.contains('/') {
            return Err(invalid("repository name contains '/'"));
        }

        if let Some(abs) = rest.strip_prefix("//") {
            let (pkg, name) = match abs.split_once(':') {
                Some((pkg, name)) => (pkg, name),
                None => (abs, abs.rsplit('/').next().unwrap_or(abs)),
            };
            if name.is_empty() {
                return Err(invalid("rule name is empty"));
            }
            if pkg.starts_with('/') || pkg.ends_with('/') {
                return Err(invalid("package path has a stray '/'"));
            }
            return Ok(Label::new(repo, pkg, name));
        }

        if !repo.is_empty() {
            return Err(invalid("repository must be followed by //"));
        }
        let name = rest.strip_prefix(':').unwrap_or(rest);
        if name.is_empty() || name.contains(':') {
            return Err(invalid("relative label has no usable name"));
        }
        Ok(Label {
            repo: String::new(),
            pkg: String::new(),
            name: name.to_string(),
            relative: true,
        })
    }
}

/// Derives a repository name from a Go import path, e.g.
/// `github.com/foo/bar-baz` becomes `com_github_foo_bar_baz`.
pub fn import_path_to_repo_name(import_path: &str) -> String {
    let lower = import_path.to_lowercase();
    let mut components = lower.split('/');
    let host = components.next().unwrap_or_default();

    let mut parts: Vec<&str> = host.split('.').rev().collect();
    parts.extend(components);
    parts.join("_").replace(['-', '.'], "_")
}
