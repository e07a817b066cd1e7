//! Merging generated rules into existing build files
//!
//! Generated content is merged in two passes over the same [`File`]. The
//! pre-resolve pass, run right after generation, adds new rules, updates the
//! attributes generators own and prunes rules that became empty. The
//! post-resolve pass, run once the rule index is sealed, only rewrites
//! dependency attributes of rules that survived the first pass.
//!
//! A rule or attribute marked with a `# keep` comment is never changed, and
//! rules of kinds no language knows about are never changed either.

use crate::rule::{File, KindInfo, KindMap, Load, LoadInfo, Rule};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

const RULES_GO_PREFIX: &str = "@io_bazel_rules_go//";
const RULES_GO_DEF: &str = "@io_bazel_rules_go//go:def.bzl";
const BOOTSTRAP_REPO: &str = "buildsmith";
const DEPS_BZL: &str = "@buildsmith//:deps.bzl";
const DEPS_MACRO: &str = "buildsmith_dependencies";

/// Load files the workspace fix knows about.
pub const WORKSPACE_LOADS: &[LoadInfo] = &[LoadInfo {
    name: DEPS_BZL,
    symbols: &[DEPS_MACRO, "go_repository"],
}];

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(
        "{}: rules from @io_bazel_rules_go are loaded but the buildsmith repository is not declared; \
         add a repository rule named \"buildsmith\" or a \"# buildsmith:repo buildsmith\" directive",
        .path.display()
    )]
    BootstrapMissing { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Right after generation, before dependencies are known.
    PreResolve,
    /// After resolution; only dependency attributes change.
    PostResolve,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::PreResolve => write!(f, "pre-resolve"),
            Phase::PostResolve => write!(f, "post-resolve"),
        }
    }
}

/// Merges `empty` and `gen` into `f`.
///
/// In [`Phase::PreResolve`], existing rules matching an empty rule by kind
/// and name lose their merge attributes and are deleted once none of their
/// non-empty attributes remain; generated rules update their match or are
/// inserted. In [`Phase::PostResolve`] only the resolve attributes of
/// matched rules change.
pub fn merge_file(f: &mut File, empty: &[Rule], gen: &[Rule], phase: Phase, kinds: &KindMap) {
    match phase {
        Phase::PreResolve => {
            let pkg = f.pkg.clone();
            for e in empty {
                let Some(info) = kinds.get(e.kind()) else {
                    continue;
                };
                if let Some(existing) = find_match(f, e) {
                    merge_attrs(existing, e, info.merge_attrs);
                    if is_empty(existing, info) {
                        debug!(pkg = %pkg, kind = %e.kind(), name = %e.name(), "Deleting empty rule");
                        existing.delete();
                    }
                }
            }
            for g in gen {
                let attrs = kinds.get(g.kind()).map_or(&[] as &[&str], |info| info.merge_attrs);
                match find_match(f, g) {
                    Some(existing) => merge_attrs(existing, g, attrs),
                    None => f.insert_rule(g.clone()),
                }
            }
        }
        Phase::PostResolve => {
            for g in gen {
                let Some(info) = kinds.get(g.kind()) else {
                    continue;
                };
                if let Some(existing) = find_match(f, g) {
                    merge_attrs(existing, g, info.resolve_attrs);
                }
            }
        }
    }
}

fn find_match<'a>(f: &'a mut File, r: &Rule) -> Option<&'a mut Rule> {
    f.rules_mut()
        .find(|existing| existing.kind() == r.kind() && existing.name() == r.name())
}

/// Copies `attrs` from `src` to `dst`, deleting those `src` lacks.
fn merge_attrs(dst: &mut Rule, src: &Rule, attrs: &[&str]) {
    if dst.has_keep() {
        return;
    }
    for &key in attrs {
        if dst.attr_has_keep(key) {
            continue;
        }
        match src.attr(key) {
            Some(value) => dst.set_attr(key, value.clone()),
            None => dst.del_attr(key),
        }
    }
}

fn is_empty(r: &Rule, info: &KindInfo) -> bool {
    !r.has_keep() && !info.non_empty_attrs.iter().any(|key| r.attr(key).is_some())
}

/// Makes the loads of `f` match the rule kinds it uses.
///
/// For each known load file, the first load of it gets exactly the known
/// symbols in use, later duplicate loads lose them, and a load is inserted
/// if none exists. Symbols the file loads from some other module are left
/// alone, as are loads of unknown files.
pub fn fix_loads(f: &mut File, known: &[LoadInfo]) {
    let used: HashSet<String> = f.rules().map(|r| r.kind().to_string()).collect();
    let existing: Vec<(String, Vec<String>)> = f
        .loads()
        .map(|l| (l.module.clone(), l.local_symbols().map(str::to_string).collect()))
        .collect();
    let loaded_elsewhere = |sym: &str, module: &str| {
        existing
            .iter()
            .any(|(m, syms)| m != module && syms.iter().any(|s| s == sym))
    };

    for info in known {
        let needed: Vec<&str> = info
            .symbols
            .iter()
            .copied()
            .filter(|s| used.contains(*s) && !loaded_elsewhere(*s, info.name))
            .collect();

        let mut seen = false;
        for load in f.loads_mut().filter(|l| l.module == info.name) {
            for sym in info.symbols {
                if !seen && needed.contains(sym) {
                    load.add(sym);
                } else {
                    load.remove(sym);
                }
            }
            if load.symbols.is_empty() {
                load.delete();
            }
            seen = true;
        }

        if !seen && !needed.is_empty() {
            let mut load = Load::new(info.name);
            for sym in &needed {
                load.add(sym);
            }
            debug!(pkg = %f.pkg, module = %info.name, "Adding load");
            f.insert_load(load);
        }
    }
}

/// Moves `go_repository` from rules_go to the buildsmith repository and
/// makes sure its dependency macro is called.
pub fn fix_workspace(f: &mut File) {
    let mut migrated = false;
    for load in f.loads_mut().filter(|l| l.module == RULES_GO_DEF) {
        if load.has("go_repository") {
            load.remove("go_repository");
            if load.symbols.is_empty() {
                load.delete();
            }
            migrated = true;
        }
    }
    if migrated {
        debug!(path = %f.path.display(), "Migrated go_repository load");
    }

    let uses_go_repository = f.rules().any(|r| r.kind() == "go_repository");
    let calls_deps = f.rules().any(|r| r.kind() == DEPS_MACRO);
    if uses_go_repository && !calls_deps {
        f.insert_rule(Rule::anonymous(DEPS_MACRO));
    }
}

/// Fails when rules_go is used without declaring the buildsmith repository.
pub fn check_bootstrap_loaded(f: &File) -> Result<(), MergeError> {
    let uses_rules_go = f.loads().any(|l| l.module.starts_with(RULES_GO_PREFIX));
    if !uses_rules_go {
        return Ok(());
    }
    let declared = f.rules().any(|r| r.name() == BOOTSTRAP_REPO)
        || f
            .directives()
            .iter()
            .any(|d| d.key == "repo" && d.value == BOOTSTRAP_REPO);
    if declared {
        Ok(())
    } else {
        Err(MergeError::BootstrapMissing {
            path: f.path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageRegistry;
    use std::path::Path;

    fn parse(content: &str) -> File {
        File::parse(Path::new("BUILD.bazel"), "pkg", content).unwrap()
    }

    fn kinds() -> KindMap {
        LanguageRegistry::with_defaults().kinds()
    }

    fn lib(srcs: &[&str]) -> Rule {
        let mut r = Rule::new("go_library", "go_default_library");
        r.set_attr("srcs", srcs.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        r.set_attr("importpath", "example.com/pkg");
        r
    }

    #[test]
    fn test_pre_resolve_inserts_new_rule() {
        let mut f = parse("genrule(name = \"g\")\n");
        merge_file(&mut f, &[], &[lib(&["a.go"])], Phase::PreResolve, &kinds());

        let out = f.format();
        assert!(out.starts_with("genrule(name = \"g\")\n\ngo_library(\n"));
        assert!(out.contains("importpath = \"example.com/pkg\""));
    }

    #[test]
    fn test_pre_resolve_updates_merge_attrs_only() {
        let mut f = parse(
            r#"go_library(
    name = "go_default_library",
    srcs = ["old.go"],
    importpath = "example.com/pkg",
    deps = ["//other"],
    visibility = ["//visibility:private"],
)
"#,
        );
        merge_file(&mut f, &[], &[lib(&["new.go"])], Phase::PreResolve, &kinds());

        let r = f.rules().next().unwrap();
        assert_eq!(r.attr_strings("srcs").unwrap(), &["new.go".to_string()]);
        assert_eq!(r.attr_strings("deps").unwrap(), &["//other".to_string()]);
        assert_eq!(
            r.attr_strings("visibility").unwrap(),
            &["//visibility:private".to_string()]
        );
    }

    #[test]
    fn test_keep_protects_rules_and_attrs() {
        let mut f = parse(
            r#"go_library(
    name = "go_default_library",
    srcs = ["old.go"],  # keep
    importpath = "example.com/old",
)

go_test(  # keep
    name = "go_default_test",
    srcs = ["x_test.go"],
)
"#,
        );
        let empty = vec![Rule::new("go_test", "go_default_test")];
        merge_file(&mut f, &empty, &[lib(&["new.go"])], Phase::PreResolve, &kinds());

        let rules: Vec<&Rule> = f.rules().collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].attr_strings("srcs").unwrap(), &["old.go".to_string()]);
        assert_eq!(rules[0].attr_string("importpath"), Some("example.com/pkg"));
        assert_eq!(rules[1].attr_strings("srcs").unwrap(), &["x_test.go".to_string()]);
    }

    #[test]
    fn test_empty_rule_prunes_generated_kind() {
        let mut f = parse(
            "go_test(\n    name = \"go_default_test\",\n    srcs = [\"x_test.go\"],\n)\n\ncc_library(name = \"c\")\n",
        );
        let empty = vec![
            Rule::new("go_test", "go_default_test"),
            Rule::new("cc_library", "c"),
        ];
        merge_file(&mut f, &empty, &[], Phase::PreResolve, &kinds());
        f.sync();

        assert_eq!(f.format(), "cc_library(name = \"c\")\n");
    }

    #[test]
    fn test_empty_rule_keeps_rule_with_remaining_content() {
        let mut f = parse(
            "go_binary(\n    name = \"tool\",\n    embed = [\":go_default_library\"],\n    deps = [\"//x\"],\n)\n",
        );
        merge_file(
            &mut f,
            &[Rule::new("go_binary", "tool")],
            &[],
            Phase::PreResolve,
            &kinds(),
        );

        let r = f.rules().next().unwrap();
        assert!(r.attr("embed").is_none());
        assert!(r.attr("deps").is_some());
    }

    #[test]
    fn test_post_resolve_touches_only_resolve_attrs() {
        let mut f = parse(
            "go_library(\n    name = \"go_default_library\",\n    srcs = [\"a.go\"],\n    deps = [\"//stale\"],\n)\n",
        );
        let mut resolved = lib(&["b.go"]);
        resolved.set_attr("deps", vec!["//fresh".to_string()]);
        let unknown = Rule::new("go_test", "go_default_test");
        merge_file(
            &mut f,
            &[],
            &[resolved, unknown],
            Phase::PostResolve,
            &kinds(),
        );

        let rules: Vec<&Rule> = f.rules().collect();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].attr_strings("srcs").unwrap(), &["a.go".to_string()]);
        assert_eq!(rules[0].attr_strings("deps").unwrap(), &["//fresh".to_string()]);
    }

    #[test]
    fn test_fix_loads_adds_and_trims() {
        let mut f = parse(
            r#"load("@io_bazel_rules_go//go:def.bzl", "go_binary", "go_library", "go_test")
load("@io_bazel_rules_go//go:def.bzl", "go_library")
load("//tools:defs.bzl", "custom")

go_library(name = "go_default_library")

go_proto_library(name = "x_go_proto")
"#,
        );
        fix_loads(&mut f, &LanguageRegistry::with_defaults().loads());
        f.sync();

        assert_eq!(
            f.format(),
            r#"load("@io_bazel_rules_go//go:def.bzl", "go_library")
load("//tools:defs.bzl", "custom")
load("@io_bazel_rules_go//proto:def.bzl", "go_proto_library")

go_library(name = "go_default_library")

go_proto_library(name = "x_go_proto")
"#
        );
    }

    #[test]
    fn test_fix_loads_respects_other_modules() {
        let mut f = parse("load(\"//my:go.bzl\", \"go_library\")\n\ngo_library(name = \"x\")\n");
        fix_loads(&mut f, &LanguageRegistry::with_defaults().loads());
        f.sync();
        assert_eq!(f.loads().count(), 1);
    }

    #[test]
    fn test_fix_workspace_migrates_go_repository() {
        let mut f = parse(
            r#"load("@io_bazel_rules_go//go:def.bzl", "go_repository", "go_rules_dependencies")

go_rules_dependencies()

go_repository(
    name = "org_golang_x_text",
    importpath = "golang.org/x/text",
)
"#,
        );
        fix_workspace(&mut f);
        fix_loads(&mut f, WORKSPACE_LOADS);
        f.sync();

        let out = f.format();
        assert!(out.contains("load(\"@io_bazel_rules_go//go:def.bzl\", \"go_rules_dependencies\")\n"));
        assert!(out.contains(
            "load(\"@buildsmith//:deps.bzl\", \"buildsmith_dependencies\", \"go_repository\")\n"
        ));
        assert!(out.ends_with("buildsmith_dependencies()\n"));
    }

    #[test]
    fn test_check_bootstrap_loaded() {
        let missing = parse("load(\"@io_bazel_rules_go//go:def.bzl\", \"go_rules_dependencies\")\n");
        assert!(matches!(
            check_bootstrap_loaded(&missing),
            Err(MergeError::BootstrapMissing { .. })
        ));

        let by_rule = parse(
            "load(\"@io_bazel_rules_go//go:def.bzl\", \"go_rules_dependencies\")\n\nhttp_archive(name = \"buildsmith\")\n",
        );
        assert!(check_bootstrap_loaded(&by_rule).is_ok());

        let by_directive = parse(
            "# buildsmith:repo buildsmith\n\nload(\"@io_bazel_rules_go//go:def.bzl\", \"go_rules_dependencies\")\n",
        );
        assert!(check_bootstrap_loaded(&by_directive).is_ok());

        assert!(check_bootstrap_loaded(&parse("workspace(name = \"x\")\n")).is_ok());
    }
}
