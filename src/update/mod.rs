//! The `update` and `fix` commands
//!
//! A run has three phases:
//!
//! 1. Walk the whole repository once. Directories outside the requested
//!    scope only register their existing rules in the [`RuleIndex`].
//!    Directories in scope are fixed, get rules generated by every language
//!    in order, and have them merged into their build file
//!    ([`Phase::PreResolve`]). The result is kept as a [`VisitRecord`] and
//!    its rules are registered too.
//! 2. Seal the index. Every generated rule has its imports resolved into
//!    dependency labels, and the file is merged again
//!    ([`Phase::PostResolve`]).
//! 3. Normalize loads, format and emit every recorded file.
//!
//! Configuration errors abort the run before anything is written. A file
//! that fails to emit is logged and the run continues.

mod config;
mod emit;
mod workspace;

pub use config::{is_descending_dir, EmitMode, UpdateConfig, UpdateConfigurer};
pub use emit::{destination, Emitter};
pub use workspace::{add_known_imports, find_workspace_name, load_workspace};

use crate::cli::FixUpdateArgs;
use crate::config::{CommonConfigurer, Config, ConfigError, Configurer};
use crate::label::Label;
use crate::language::{GenerateArgs, Language, LanguageRegistry};
use crate::merger::{fix_loads, merge_file, MergeError, Phase};
use crate::resolve::{RemoteCache, RuleIndex};
use crate::rule::{File, KindMap, Rule};
use crate::walk::{walk, WalkedDir};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixUpdateCommand {
    Update,
    Fix,
}

impl fmt::Display for FixUpdateCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixUpdateCommand::Update => write!(f, "update"),
            FixUpdateCommand::Fix => write!(f, "fix"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What phase 1 produced for one directory in scope.
#[derive(Debug)]
pub struct VisitRecord {
    pub pkg_rel: String,
    pub config: Config,
    /// Generated rules, carrying the imports they require.
    pub rules: Vec<Rule>,
    pub empty: Vec<Rule>,
    /// The build file after the pre-resolve merge.
    pub file: File,
}

/// Runs `cmd` over the repository. Print and diff output goes to `out`.
pub fn run_fix_update(
    cmd: FixUpdateCommand,
    args: &FixUpdateArgs,
    registry: &LanguageRegistry,
    out: &mut dyn Write,
) -> Result<(), UpdateError> {
    let cexts = configurer_chain(registry);
    let mut c = Config::default();
    for cext in &cexts {
        cext.check_flags(cmd, args, &mut c)?;
    }
    debug!(config = %c, "Configuration assembled");

    let mut emitter = Emitter::new(c.update.emit, c.repo_root.clone(), out);
    workspace::prepare(&mut c, &args.known_imports, &mut emitter)?;

    let kinds = registry.kinds();
    let mut index = RuleIndex::new(registry.kind_to_language());
    let mut visits = Vec::new();
    walk(&c, &cexts, |d| {
        collect_visit(d, registry.languages(), &kinds, &mut index, &mut visits)
    })?;

    let ix = index.finish();
    let rc = RemoteCache::new(Arc::clone(&c.update.repos));
    let kind_to_lang = registry.kind_to_language();
    for v in &mut visits {
        for r in &mut v.rules {
            let Some(lang) = kind_to_lang.get(r.kind()) else {
                continue;
            };
            let from = Label::new(v.config.repo_name.as_str(), v.pkg_rel.as_str(), r.name());
            lang.resolve(&v.config, &ix, &rc, r, &from);
        }
        merge_file(&mut v.file, &v.empty, &v.rules, Phase::PostResolve, &kinds);
    }

    let loads = registry.loads();
    let total = visits.len();
    let mut failed = 0;
    for v in visits {
        let VisitRecord {
            pkg_rel,
            config,
            mut file,
            ..
        } = v;
        fix_loads(&mut file, &loads);
        file.sync();

        let dest = destination(
            &file.path,
            &pkg_rel,
            config.update.out_dir.as_deref(),
            &config.update.out_suffix,
        );
        if let Err(e) = emitter.emit(&file.format(), &file.path, &dest) {
            failed += 1;
            error!(path = %dest.display(), error = %format!("{:#}", e), "Failed to emit build file");
        }
    }

    info!(
        command = %cmd,
        mode = %emitter.mode(),
        files = total,
        failed,
        "Finished"
    );
    Ok(())
}

/// Common flags first, then update flags, then each language in order.
fn configurer_chain(registry: &LanguageRegistry) -> Vec<Arc<dyn Configurer>> {
    let mut cexts: Vec<Arc<dyn Configurer>> =
        vec![Arc::new(CommonConfigurer), Arc::new(UpdateConfigurer)];
    cexts.extend(registry.configurers().iter().cloned());
    cexts
}

fn collect_visit(
    d: WalkedDir,
    languages: &[Arc<dyn Language>],
    kinds: &KindMap,
    index: &mut RuleIndex,
    visits: &mut Vec<VisitRecord>,
) {
    let WalkedDir {
        dir,
        rel,
        config,
        update,
        mut file,
        subdirs,
        regular_files,
        gen_files,
    } = d;

    if !update {
        if let Some(f) = &file {
            for r in f.rules() {
                index.add_rule(&config, r, f);
            }
        }
        return;
    }

    if let Some(f) = file.as_mut() {
        for lang in languages {
            lang.fix(&config, f);
        }
    }

    let mut gen = Vec::new();
    let mut empty = Vec::new();
    for lang in languages {
        let result = lang.generate_rules(&GenerateArgs {
            config: &config,
            dir: &dir,
            rel: &rel,
            file: file.as_ref(),
            subdirs: &subdirs,
            regular_files: &regular_files,
            gen_files: &gen_files,
            other_empty: &empty,
            other_gen: &gen,
        });
        empty.extend(result.empty);
        gen.extend(result.gen);
    }

    let mut file = match file {
        Some(f) => f,
        None if gen.is_empty() => return,
        None => File::empty(dir.join(config.default_build_file_name()), rel.as_str()),
    };
    merge_file(&mut file, &empty, &gen, Phase::PreResolve, kinds);

    for r in file.rules() {
        index.add_rule(&config, r, &file);
    }
    debug!(rel = %rel, generated = gen.len(), empty = empty.len(), "Recorded directory");
    visits.push(VisitRecord {
        pkg_rel: rel,
        config,
        rules: gen,
        empty,
        file,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display() {
        assert_eq!(FixUpdateCommand::Update.to_string(), "update");
        assert_eq!(FixUpdateCommand::Fix.to_string(), "fix");
    }

    #[test]
    fn test_configurer_chain_order() {
        let registry = LanguageRegistry::with_defaults();
        let chain = configurer_chain(&registry);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[2].known_directives(), &["proto"]);
        assert_eq!(chain[3].known_directives(), &["prefix"]);
    }
}
