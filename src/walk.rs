//! Repository traversal
//!
//! [`walk`] visits every directory under the repository root exactly once,
//! children before their parent. Each directory gets its own copy of the
//! parent's [`Config`], adjusted by the directives in its build file. The
//! whole tree is always visited so the rule index sees every build file;
//! [`WalkedDir::update`] says whether a directory was requested for update.

use crate::config::{Config, Configurer};
use crate::rule::File;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const BAZEL_IGNORE: &str = ".bazelignore";

/// One visited directory.
#[derive(Debug)]
pub struct WalkedDir {
    /// Absolute path.
    pub dir: PathBuf,
    /// Slash-separated path relative to the repository root.
    pub rel: String,
    pub config: Config,
    /// True if the directory is one of the requested directories or below one.
    pub update: bool,
    /// The existing build file. `None` if there is none or it did not parse.
    pub file: Option<File>,
    pub subdirs: Vec<String>,
    pub regular_files: Vec<String>,
    /// Files named in `out`/`outs` of existing rules.
    pub gen_files: Vec<String>,
}

pub fn walk<F>(c: &Config, cexts: &[Arc<dyn Configurer>], mut visit: F) -> Result<()>
where
    F: FnMut(WalkedDir),
{
    let known: HashSet<&str> = cexts
        .iter()
        .flat_map(|cext| cext.known_directives().iter().copied())
        .collect();
    std::fs::metadata(&c.repo_root).with_context(|| {
        format!("Failed to read repository root {}", c.repo_root.display())
    })?;
    let walker = Walker { cexts, known };
    walker.visit_dir(c, &c.repo_root, "", &mut visit)
}

struct Walker<'a> {
    cexts: &'a [Arc<dyn Configurer>],
    known: HashSet<&'static str>,
}

impl Walker<'_> {
    fn visit_dir<F>(&self, parent: &Config, dir: &Path, rel: &str, visit: &mut F) -> Result<()>
    where
        F: FnMut(WalkedDir),
    {
        let mut c = parent.clone();
        c.excludes.clear();

        let (file, parse_failed) = match load_build_file(&c, dir, rel) {
            Ok(file) => (file, false),
            Err(e) => {
                warn!(rel = %rel, error = %e, "Ignoring build file that could not be read");
                (None, true)
            }
        };

        for cext in self.cexts {
            cext.configure(&mut c, rel, file.as_ref());
        }
        if let Some(f) = &file {
            for d in f.directives() {
                if !self.known.contains(d.key.as_str()) {
                    warn!(path = %f.path.display(), directive = %d.key, "Unknown directive");
                }
            }
        }

        let (subdirs, regular_files) = list_dir(&c, dir);

        for sub in &subdirs {
            let sub_rel = if rel.is_empty() {
                sub.clone()
            } else {
                format!("{}/{}", rel, sub)
            };
            self.visit_dir(&c, &dir.join(sub), &sub_rel, visit)?;
        }

        let update = !parse_failed && c.dirs.iter().any(|d| dir.starts_with(d));
        let gen_files = file.as_ref().map(generated_files).unwrap_or_default();
        debug!(rel = %rel, update, files = regular_files.len(), "Visiting directory");

        visit(WalkedDir {
            dir: dir.to_path_buf(),
            rel: rel.to_string(),
            config: c,
            update,
            file,
            subdirs,
            regular_files,
            gen_files,
        });
        Ok(())
    }
}

/// Loads the first build file found among the configured names.
fn load_build_file(c: &Config, dir: &Path, rel: &str) -> Result<Option<File>> {
    for name in &c.valid_build_file_names {
        let path = dir.join(name);
        if path.is_file() {
            return File::load(&path, rel).map(Some);
        }
    }
    Ok(None)
}

/// Immediate children of `dir`, sorted by name, split into directories and
/// files. Hidden and excluded entries are skipped; symlinks are not followed.
fn list_dir(c: &Config, dir: &Path) -> (Vec<String>, Vec<String>) {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();

    let walker = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .hidden(true)
        .parents(true)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .add_custom_ignore_filename(BAZEL_IGNORE)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Failed to read directory entry");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if c.is_excluded(&name) {
            debug!(dir = %dir.display(), name = %name, "Excluded");
            continue;
        }

        match entry.file_type() {
            Some(ft) if ft.is_dir() => subdirs.push(name),
            Some(ft) if ft.is_file() => files.push(name),
            // Symlinks count as files when they point at one.
            _ if entry.path().is_file() => files.push(name),
            _ => {}
        }
    }
    (subdirs, files)
}

fn generated_files(f: &File) -> Vec<String> {
    let mut out = Vec::new();
    for r in f.rules() {
        if let Some(single) = r.attr_string("out") {
            out.push(single.to_string());
        }
        if let Some(outs) = r.attr_strings("outs") {
            out.extend(outs.iter().cloned());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommonConfigurer;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(root: &Path, dirs: &[&str]) -> Config {
        let root = root.canonicalize().unwrap();
        Config {
            dirs: dirs.iter().map(|d| root.join(d)).collect(),
            repo_root: root,
            valid_build_file_names: vec!["BUILD.bazel".to_string(), "BUILD".to_string()],
            ..Default::default()
        }
    }

    fn walk_all(c: &Config) -> Vec<WalkedDir> {
        let cexts: Vec<Arc<dyn Configurer>> = vec![Arc::new(CommonConfigurer)];
        let mut visited = Vec::new();
        walk(c, &cexts, |d| visited.push(d)).unwrap();
        visited
    }

    #[test]
    fn test_post_order_and_classification() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::create_dir_all(temp.path().join(".hidden")).unwrap();
        fs::write(temp.path().join("a/x.go"), "package a\n").unwrap();
        fs::write(temp.path().join("a/b/y.go"), "package b\n").unwrap();

        let visited = walk_all(&config_for(temp.path(), &[""]));
        let rels: Vec<&str> = visited.iter().map(|d| d.rel.as_str()).collect();
        assert_eq!(rels, vec!["a/b", "a", ""]);

        let a = &visited[1];
        assert_eq!(a.subdirs, vec!["b".to_string()]);
        assert_eq!(a.regular_files, vec!["x.go".to_string()]);
        assert!(a.file.is_none());
        assert!(a.update);
    }

    #[test]
    fn test_update_scope() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("in/sub")).unwrap();
        fs::create_dir_all(temp.path().join("out")).unwrap();

        let visited = walk_all(&config_for(temp.path(), &["in"]));
        let updated: Vec<&str> = visited
            .iter()
            .filter(|d| d.update)
            .map(|d| d.rel.as_str())
            .collect();
        assert_eq!(updated, vec!["in/sub", "in"]);
        assert_eq!(visited.len(), 4);
    }

    #[test]
    fn test_exclude_and_gen_files() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("vendor")).unwrap();
        fs::write(
            temp.path().join("BUILD.bazel"),
            "# buildsmith:exclude vendor\n\ngenrule(\n    name = \"g\",\n    outs = [\"gen.go\"],\n)\n",
        )
        .unwrap();

        let visited = walk_all(&config_for(temp.path(), &[""]));
        assert_eq!(visited.len(), 1);
        let root = &visited[0];
        assert!(root.subdirs.is_empty());
        assert_eq!(root.gen_files, vec!["gen.go".to_string()]);
        assert_eq!(root.regular_files, vec!["BUILD.bazel".to_string()]);
    }

    #[test]
    fn test_bazelignore() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("node_modules")).unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join(".bazelignore"), "node_modules\n").unwrap();

        let visited = walk_all(&config_for(temp.path(), &[""]));
        let rels: Vec<&str> = visited.iter().map(|d| d.rel.as_str()).collect();
        assert_eq!(rels, vec!["src", ""]);
    }

    #[test]
    fn test_unparsable_build_file_is_not_updated() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("bad")).unwrap();
        fs::write(temp.path().join("bad/BUILD"), "go_library(name = \n").unwrap();

        let visited = walk_all(&config_for(temp.path(), &[""]));
        let bad = visited.iter().find(|d| d.rel == "bad").unwrap();
        assert!(bad.file.is_none());
        assert!(!bad.update);
    }

    #[test]
    fn test_build_file_name_directive_is_inherited() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::write(temp.path().join("BUILD"), "# buildsmith:build_file_name BUILD\n").unwrap();
        fs::write(temp.path().join("a/BUILD.bazel"), "x(name = \"ignored\")\n").unwrap();
        fs::write(temp.path().join("a/BUILD"), "x(name = \"used\")\n").unwrap();

        let visited = walk_all(&config_for(temp.path(), &[""]));
        let a = visited.iter().find(|d| d.rel == "a").unwrap();
        assert_eq!(a.config.default_build_file_name(), "BUILD");
        assert_eq!(a.file.as_ref().unwrap().rules().next().unwrap().name(), "used");
    }
}
