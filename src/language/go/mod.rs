//! Go rules
//!
//! Generates `go_library`, `go_binary` and `go_test` rules from the `.go`
//! files of a directory, and `go_proto_library` when the proto language
//! generated a `proto_library` for the same directory. Import paths are
//! derived from the Go prefix set with `--go-prefix` or a
//! `# buildsmith:prefix` directive.

mod fileinfo;
mod generate;
mod resolve;

pub use fileinfo::{parse_go_source, GoFileInfo};
pub use resolve::is_standard;

use super::{join_rel, GenerateArgs, GenerateResult, Language};
use crate::cli::FixUpdateArgs;
use crate::config::{Config, ConfigError, Configurer};
use crate::label::Label;
use crate::resolve::{ImportSpec, RemoteCache, SealedRuleIndex};
use crate::rule::{File, KindInfo, KindMap, LoadInfo, Rule, Value};
use crate::update::FixUpdateCommand;
use tracing::debug;

pub const GO_NAME: &str = "go";
pub const DEFAULT_LIB_NAME: &str = "go_default_library";
pub const DEFAULT_TEST_NAME: &str = "go_default_test";

const GO_LOADS: &[LoadInfo] = &[
    LoadInfo {
        name: "@io_bazel_rules_go//go:def.bzl",
        symbols: &["go_binary", "go_library", "go_test"],
    },
    LoadInfo {
        name: "@io_bazel_rules_go//proto:def.bzl",
        symbols: &["go_proto_library"],
    },
];

#[derive(Debug, Clone, Default)]
pub struct GoConfig {
    /// Import path of the directory where the prefix was set.
    pub prefix: String,
    /// Repository-relative directory where the prefix was set.
    pub prefix_rel: String,
}

/// Import path for the package at `rel`.
pub fn import_path(c: &Config, rel: &str) -> String {
    let suffix = if c.go.prefix_rel.is_empty() {
        rel
    } else if rel == c.go.prefix_rel {
        ""
    } else {
        rel.strip_prefix(c.go.prefix_rel.as_str())
            .and_then(|s| s.strip_prefix('/'))
            .unwrap_or(rel)
    };
    join_rel(&c.go.prefix, suffix)
}

pub struct GoLanguage;

impl Configurer for GoLanguage {
    fn check_flags(
        &self,
        _cmd: FixUpdateCommand,
        args: &FixUpdateArgs,
        c: &mut Config,
    ) -> Result<(), ConfigError> {
        if let Some(prefix) = &args.go_prefix {
            if prefix.starts_with('/') || prefix.ends_with('/') {
                return Err(ConfigError::InvalidFlag {
                    flag: "--go-prefix",
                    reason: format!("{:?} must not start or end with '/'", prefix),
                });
            }
            c.go.prefix = prefix.clone();
            c.go.prefix_rel = String::new();
        }
        Ok(())
    }

    fn known_directives(&self) -> &'static [&'static str] {
        &["prefix"]
    }

    fn configure(&self, c: &mut Config, rel: &str, f: Option<&File>) {
        let Some(f) = f else {
            return;
        };
        if let Some(d) = f.directives().iter().rev().find(|d| d.key == "prefix") {
            c.go.prefix = d.value.trim_end_matches('/').to_string();
            c.go.prefix_rel = rel.to_string();
            debug!(rel = %rel, prefix = %c.go.prefix, "Go prefix set");
        }
    }
}

impl Language for GoLanguage {
    fn name(&self) -> &'static str {
        GO_NAME
    }

    fn kinds(&self) -> KindMap {
        KindMap::from([
            (
                "go_library",
                KindInfo {
                    non_empty_attrs: &["srcs", "deps", "embed"],
                    merge_attrs: &["srcs", "importpath", "embed"],
                    resolve_attrs: &["deps"],
                },
            ),
            (
                "go_binary",
                KindInfo {
                    non_empty_attrs: &["srcs", "deps", "embed"],
                    merge_attrs: &["srcs", "embed"],
                    resolve_attrs: &["deps"],
                },
            ),
            (
                "go_test",
                KindInfo {
                    non_empty_attrs: &["srcs", "deps", "embed"],
                    merge_attrs: &["srcs", "embed"],
                    resolve_attrs: &["deps"],
                },
            ),
            (
                "go_proto_library",
                KindInfo {
                    non_empty_attrs: &["proto"],
                    merge_attrs: &["proto", "importpath"],
                    resolve_attrs: &[],
                },
            ),
        ])
    }

    fn loads(&self) -> &'static [LoadInfo] {
        GO_LOADS
    }

    /// `library` on `go_test` and `go_binary` is replaced by `embed`.
    fn fix(&self, c: &Config, f: &mut File) {
        if !c.should_fix {
            return;
        }
        for r in f.rules_mut() {
            if r.kind() != "go_test" && r.kind() != "go_binary" {
                continue;
            }
            let Some(library) = r.attr_string("library").map(str::to_string) else {
                continue;
            };
            if r.attr("embed").is_none() {
                r.set_attr("embed", vec![library]);
            }
            r.del_attr("library");
            debug!(rule = %r.name(), "Replaced library with embed");
        }
    }

    fn generate_rules(&self, args: &GenerateArgs<'_>) -> GenerateResult {
        generate::generate(args)
    }

    fn imports(&self, _c: &Config, r: &Rule, f: &File) -> Vec<ImportSpec> {
        let importpath = match r.attr("importpath") {
            Some(Value::String(s)) if !s.is_empty() => s.as_str(),
            _ => return Vec::new(),
        };
        let provides = match r.kind() {
            "go_library" => true,
            // Embedded into the library, which then provides the path.
            "go_proto_library" => !f.rules().any(|other| other.kind() == "go_library"),
            _ => false,
        };
        if provides {
            vec![ImportSpec::new(GO_NAME, importpath)]
        } else {
            Vec::new()
        }
    }

    fn resolve(
        &self,
        _c: &Config,
        ix: &SealedRuleIndex,
        rc: &RemoteCache,
        r: &mut Rule,
        from: &Label,
    ) {
        if r.kind() == "go_proto_library" {
            return;
        }
        resolve::resolve(ix, rc, r, from);
    }
}
