//! Emission of formatted build files
//!
//! The mode is chosen once per run. Every mode receives identical, already
//! formatted content, so print, diff and fix always agree.

use super::EmitMode;
use anyhow::{Context, Result};
use similar::TextDiff;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct Emitter<'a> {
    mode: EmitMode,
    repo_root: PathBuf,
    out: &'a mut dyn Write,
}

impl<'a> Emitter<'a> {
    pub fn new(mode: EmitMode, repo_root: impl Into<PathBuf>, out: &'a mut dyn Write) -> Self {
        Self {
            mode,
            repo_root: repo_root.into(),
            out,
        }
    }

    pub fn mode(&self) -> EmitMode {
        self.mode
    }

    /// Emits `content`. `source` is where the existing file lives (it may not
    /// exist yet); `dest` is where fix mode writes.
    pub fn emit(&mut self, content: &str, source: &Path, dest: &Path) -> Result<()> {
        match self.mode {
            EmitMode::Print => self
                .out
                .write_all(content.as_bytes())
                .context("Failed to write to output"),
            EmitMode::Fix => write_if_changed(content, dest),
            EmitMode::Diff => self.diff(content, source),
        }
    }

    fn diff(&mut self, content: &str, source: &Path) -> Result<()> {
        let existing = read_existing(source)?;
        if existing == content {
            return Ok(());
        }

        let rel = source
            .strip_prefix(&self.repo_root)
            .unwrap_or(source)
            .to_string_lossy()
            .replace('\\', "/");
        let diff = TextDiff::from_lines(existing.as_str(), content);
        let unified = diff
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", rel), &format!("b/{}", rel))
            .to_string();

        self.out
            .write_all(unified.as_bytes())
            .context("Failed to write diff to output")
    }
}

fn read_existing(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

fn write_if_changed(content: &str, dest: &Path) -> Result<()> {
    if read_existing(dest).ok().as_deref() == Some(content) {
        debug!(path = %dest.display(), "Build file unchanged");
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(dest, content).with_context(|| format!("Failed to write {}", dest.display()))?;
    info!(path = %dest.display(), "Wrote build file");
    Ok(())
}

/// Destination of a build file, honoring `--out-dir` and `--out-suffix`.
pub fn destination(path: &Path, pkg_rel: &str, out_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let Some(out_dir) = out_dir else {
        return path.to_path_buf();
    };
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut dest = out_dir.to_path_buf();
    if !pkg_rel.is_empty() {
        dest.push(pkg_rel);
    }
    dest.push(format!("{}{}", base, suffix));
    dest
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_print_writes_content() {
        let temp = TempDir::new().unwrap();
        let mut out = Vec::new();
        let path = temp.path().join("BUILD.bazel");

        Emitter::new(EmitMode::Print, temp.path(), &mut out)
            .emit("x()\n", &path, &path)
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "x()\n");
        assert!(!path.exists());
    }

    #[test]
    fn test_fix_creates_parent_dirs_and_skips_unchanged() {
        let temp = TempDir::new().unwrap();
        let mut out = Vec::new();
        let path = temp.path().join("a/b/BUILD.bazel");

        let mut emitter = Emitter::new(EmitMode::Fix, temp.path(), &mut out);
        emitter.emit("x()\n", &path, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "x()\n");

        let before = fs::metadata(&path).unwrap().modified().unwrap();
        emitter.emit("x()\n", &path, &path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
        assert!(out.is_empty());
    }

    #[test]
    fn test_diff_against_missing_file() {
        let temp = TempDir::new().unwrap();
        let mut out = Vec::new();
        let path = temp.path().join("pkg/BUILD.bazel");

        Emitter::new(EmitMode::Diff, temp.path(), &mut out)
            .emit("x()\n", &path, &path)
            .unwrap();

        let diff = String::from_utf8(out).unwrap();
        assert!(diff.starts_with("--- a/pkg/BUILD.bazel\n+++ b/pkg/BUILD.bazel\n"));
        assert!(diff.contains("+x()\n"));
        assert!(!path.exists());
    }

    #[test]
    fn test_diff_prints_nothing_when_equal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("BUILD.bazel");
        fs::write(&path, "x()\n").unwrap();
        let mut out = Vec::new();

        Emitter::new(EmitMode::Diff, temp.path(), &mut out)
            .emit("x()\n", &path, &path)
            .unwrap();

        assert!(out.is_empty());
    }

    #[test]
    fn test_destination() {
        let path = Path::new("/repo/pkg/BUILD.bazel");
        assert_eq!(destination(path, "pkg", None, ".new"), path);
        assert_eq!(
            destination(path, "pkg", Some(Path::new("/out")), ".new"),
            PathBuf::from("/out/pkg/BUILD.bazel.new")
        );
        assert_eq!(
            destination(Path::new("/repo/BUILD"), "", Some(Path::new("/out")), ""),
            PathBuf::from("/out/BUILD")
        );
    }
}
