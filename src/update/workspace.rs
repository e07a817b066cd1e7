use super::emit::{destination, Emitter};
use super::UpdateError;
use crate::config::{Config, WORKSPACE_FILE_NAMES};
use crate::label::import_path_to_repo_name;
use crate::merger::{check_bootstrap_loaded, fix_loads, fix_workspace, WORKSPACE_LOADS};
use crate::resolve::{list_repositories, Repo};
use crate::rule::File;
use anyhow::Context;
use std::path::Path;
use tracing::{debug, error, info};

/// The workspace file at the repository root, if there is one.
pub fn load_workspace(root: &Path) -> anyhow::Result<Option<File>> {
    for name in WORKSPACE_FILE_NAMES {
        let path = root.join(name);
        if path.is_file() {
            let f = File::load(&path, "")
                .with_context(|| format!("Failed to load workspace file {}", path.display()))?;
            return Ok(Some(f));
        }
    }
    Ok(None)
}

/// `name` of the `workspace(...)` rule.
pub fn find_workspace_name(f: &File) -> Option<String> {
    f.rules()
        .find(|r| r.kind() == "workspace")
        .map(|r| r.name().to_string())
        .filter(|name| !name.is_empty())
}

/// Reads repository metadata from the workspace file into `c`, fixing the
/// file first when the `fix` command covers the repository root.
pub(super) fn prepare(
    c: &mut Config,
    known_imports: &[String],
    emitter: &mut Emitter<'_>,
) -> Result<(), UpdateError> {
    let mut repos = Vec::new();
    if let Some(mut f) = load_workspace(&c.repo_root)? {
        if c.should_fix && c.dirs.iter().any(|d| d == &c.repo_root) {
            fix_workspace(&mut f);
            fix_loads(&mut f, WORKSPACE_LOADS);
            check_bootstrap_loaded(&f)?;
            f.sync();

            let dest = destination(
                &f.path,
                "",
                c.update.out_dir.as_deref(),
                &c.update.out_suffix,
            );
            if let Err(e) = emitter.emit(&f.format(), &f.path, &dest) {
                error!(path = %f.path.display(), error = %format!("{:#}", e), "Failed to emit workspace file");
            }
        }

        c.repo_name = find_workspace_name(&f).unwrap_or_default();
        repos = list_repositories(&f);
        debug!(
            repo_name = %c.repo_name,
            repos = repos.len(),
            "Loaded workspace file"
        );
    }

    add_known_imports(&mut repos, known_imports);
    if !repos.is_empty() {
        info!(repos = repos.len(), "External repositories available for resolution");
    }
    c.update.repos = repos.into();
    Ok(())
}

/// Adds a repository for every known import no declared repository serves.
pub fn add_known_imports(repos: &mut Vec<Repo>, known_imports: &[String]) {
    for imp in known_imports {
        let imp = imp.trim_end_matches('/');
        if imp.is_empty() || repos.iter().any(|r| r.go_prefix == imp) {
            continue;
        }
        repos.push(Repo::new(import_path_to_repo_name(imp), imp));
    }
}
