use super::FixUpdateCommand;
use crate::cli::FixUpdateArgs;
use crate::config::{resolve_dir, Config, ConfigError, Configurer};
use crate::resolve::Repo;
use crate::rule::File;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// What happens to a formatted build file once it is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitMode {
    /// Write it to standard output.
    Print,
    /// Write it to disk.
    #[default]
    Fix,
    /// Write a unified diff against the file on disk to standard output.
    Diff,
}

impl FromStr for EmitMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "print" => Ok(EmitMode::Print),
            "fix" => Ok(EmitMode::Fix),
            "diff" => Ok(EmitMode::Diff),
            other => Err(ConfigError::UnknownEmitMode(other.to_string())),
        }
    }
}

impl fmt::Display for EmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitMode::Print => write!(f, "print"),
            EmitMode::Fix => write!(f, "fix"),
            EmitMode::Diff => write!(f, "diff"),
        }
    }
}

/// Settings owned by the update pipeline.
#[derive(Debug, Clone, Default)]
pub struct UpdateConfig {
    pub emit: EmitMode,
    pub out_dir: Option<PathBuf>,
    pub out_suffix: String,
    /// External repositories, harvested from the workspace file before the
    /// walk. Shared by every directory's copy of the config.
    pub repos: Arc<Vec<Repo>>,
}

pub struct UpdateConfigurer;

impl Configurer for UpdateConfigurer {
    fn check_flags(
        &self,
        cmd: FixUpdateCommand,
        args: &FixUpdateArgs,
        c: &mut Config,
    ) -> Result<(), ConfigError> {
        c.should_fix = cmd == FixUpdateCommand::Fix;
        c.update.emit = args.mode.parse()?;
        c.update.out_dir = args.out_dir.clone();
        c.update.out_suffix = args.out_suffix.clone();

        let requested: Vec<PathBuf> = if args.dirs.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            args.dirs.clone()
        };

        c.dirs.clear();
        for dir in &requested {
            let resolved = resolve_dir(dir)?;
            if !is_descending_dir(&resolved, &c.repo_root) {
                return Err(ConfigError::OutsideRepoRoot {
                    dir: dir.clone(),
                    root: c.repo_root.clone(),
                });
            }
            c.dirs.push(resolved);
        }

        debug!(mode = %c.update.emit, dirs = c.dirs.len(), "Update flags checked");
        Ok(())
    }

    fn known_directives(&self) -> &'static [&'static str] {
        &[]
    }

    fn configure(&self, _c: &mut Config, _rel: &str, _f: Option<&File>) {}
}

/// True when `dir` is `root` or lies below it.
pub fn is_descending_dir(dir: &Path, root: &Path) -> bool {
    dir.starts_with(root)
}
