//! Run configuration for buildsmith
//!
//! A [`Config`] is assembled once per run from a chain of [`Configurer`]s:
//! each one validates the command-line flags it owns, and later adjusts a
//! per-directory copy of the configuration from `# buildsmith:key value`
//! directives found in build files. Settings owned by a single extension live
//! in typed slots (`update`, `go`, `proto`) rather than a string-keyed map.
//!
//! # Environment Variables
//!
//! - `BUILDSMITH_LOG_LEVEL`: Logging level - default: "info"
//! - `BUILDSMITH_LOG_JSON`: JSON log output (true|false) - default: "false"
//!
//! # Directives
//!
//! - `build_file_name NAME[,NAME...]`: build file names for this subtree
//! - `exclude NAME`: skip a file or subdirectory of this directory
//! - `repo NAME`: declares an external repository by name (workspace only)

use crate::cli::FixUpdateArgs;
use crate::language::go::GoConfig;
use crate::language::proto::ProtoConfig;
use crate::rule::File;
use crate::update::{FixUpdateCommand, UpdateConfig};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const DEFAULT_BUILD_FILE_NAMES: &[&str] = &["BUILD.bazel", "BUILD"];

/// Files whose presence marks the repository root.
pub const WORKSPACE_FILE_NAMES: &[&str] = &["WORKSPACE.bazel", "WORKSPACE"];

/// Configuration errors. All of them abort the run before any file is written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find a WORKSPACE file in {} or any parent directory; use --repo-root", .start.display())]
    RepoRootNotFound { start: PathBuf },

    #[error("{}: failed to find absolute path: {source}", .path.display())]
    AbsolutePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: failed to resolve symlinks: {source}", .path.display())]
    Symlinks {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dir {:?} is not a subdirectory of repo root {:?}", .dir, .root)]
    OutsideRepoRoot { dir: PathBuf, root: PathBuf },

    #[error("unrecognized emit mode: {0:?}")]
    UnknownEmitMode(String),

    #[error("invalid value for {flag}: {reason}")]
    InvalidFlag { flag: &'static str, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Absolute, symlink-free repository root.
    pub repo_root: PathBuf,

    /// Name from the workspace file's `workspace(name = ...)` rule.
    pub repo_name: String,

    /// Absolute, symlink-free directories requested for update.
    pub dirs: Vec<PathBuf>,

    /// Set by the `fix` command; allows potentially breaking rewrites.
    pub should_fix: bool,

    /// Build file names recognized in this directory; the first is used for
    /// new files.
    pub valid_build_file_names: Vec<String>,

    /// Names in the current directory to skip. Not inherited.
    pub excludes: Vec<String>,

    pub update: UpdateConfig,
    pub go: GoConfig,
    pub proto: ProtoConfig,
}

impl Config {
    pub fn default_build_file_name(&self) -> &str {
        self.valid_build_file_names
            .first()
            .map_or(DEFAULT_BUILD_FILE_NAMES[0], String::as_str)
    }

    pub fn is_valid_build_file_name(&self, name: &str) -> bool {
        self.valid_build_file_names.iter().any(|n| n == name)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excludes.iter().any(|e| e == name)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Buildsmith Configuration:")?;
        writeln!(f, "  Repo Root: {}", self.repo_root.display())?;
        writeln!(f, "  Repo Name: {}", self.repo_name)?;
        writeln!(f, "  Fix: {}", self.should_fix)?;
        writeln!(
            f,
            "  Build File Names: {}",
            self.valid_build_file_names.join(",")
        )?;
        for dir in &self.dirs {
            writeln!(f, "  Dir: {}", dir.display())?;
        }
        Ok(())
    }
}

/// One link of the configuration chain.
pub trait Configurer: Send + Sync {
    /// Validates flags and stores their effect on `c`.
    fn check_flags(
        &self,
        cmd: FixUpdateCommand,
        args: &FixUpdateArgs,
        c: &mut Config,
    ) -> Result<(), ConfigError>;

    /// Directive keys this configurer understands.
    fn known_directives(&self) -> &'static [&'static str];

    /// Applies directives from the build file in `rel`, if there is one.
    fn configure(&self, c: &mut Config, rel: &str, f: Option<&File>);
}

/// Repository root, build file names and exclusions.
pub struct CommonConfigurer;

impl Configurer for CommonConfigurer {
    fn check_flags(
        &self,
        _cmd: FixUpdateCommand,
        args: &FixUpdateArgs,
        c: &mut Config,
    ) -> Result<(), ConfigError> {
        let root = match &args.repo_root {
            Some(root) => root.clone(),
            None => {
                let cwd = current_dir()?;
                find_repo_root(&cwd).ok_or(ConfigError::RepoRootNotFound { start: cwd })?
            }
        };
        c.repo_root = resolve_dir(&root)?;

        c.valid_build_file_names = split_names(&args.build_file_name);
        if c.valid_build_file_names.is_empty() {
            return Err(ConfigError::InvalidFlag {
                flag: "--build-file-name",
                reason: "at least one name is required".to_string(),
            });
        }

        debug!(repo_root = %c.repo_root.display(), "Repository root resolved");
        Ok(())
    }

    fn known_directives(&self) -> &'static [&'static str] {
        &["build_file_name", "exclude", "repo"]
    }

    fn configure(&self, c: &mut Config, _rel: &str, f: Option<&File>) {
        let Some(f) = f else {
            return;
        };
        for d in f.directives() {
            match d.key.as_str() {
                "build_file_name" => {
                    let names = split_names(&d.value);
                    if !names.is_empty() {
                        c.valid_build_file_names = names;
                    }
                }
                "exclude" if !d.value.is_empty() => c.excludes.push(d.value.clone()),
                _ => {}
            }
        }
    }
}

fn split_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

fn current_dir() -> Result<PathBuf, ConfigError> {
    std::env::current_dir().map_err(|source| ConfigError::AbsolutePath {
        path: PathBuf::from("."),
        source,
    })
}

/// Nearest ancestor of `start` (inclusive) that holds a workspace file.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| WORKSPACE_FILE_NAMES.iter().any(|n| dir.join(n).is_file()))
        .map(Path::to_path_buf)
}

/// Makes `path` absolute and resolves symlinks.
pub fn resolve_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        current_dir()?.join(path)
    };
    abs.canonicalize().map_err(|source| ConfigError::Symlinks {
        path: path.to_path_buf(),
        source,
    })
}
