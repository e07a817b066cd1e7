//! Protocol buffer rules
//!
//! Every directory with `.proto` files gets one `proto_library` named after
//! the directory. Imports are read from `import "path/to/file.proto";`
//! statements and resolved against the `.proto` files other libraries
//! provide.

use super::{join_rel, package_base_name, GenerateArgs, GenerateResult, Language};
use crate::cli::FixUpdateArgs;
use crate::config::{Config, ConfigError, Configurer};
use crate::label::Label;
use crate::resolve::{ImportSpec, RemoteCache, SealedRuleIndex};
use crate::rule::{File, KindInfo, KindMap, LoadInfo, Rule};
use crate::update::FixUpdateCommand;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const PROTO_NAME: &str = "proto";

const WELL_KNOWN_PREFIX: &str = "google/protobuf/";
const WELL_KNOWN_REPO: &str = "com_google_protobuf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtoMode {
    #[default]
    Default,
    /// No proto rules are generated or pruned.
    Disable,
}

#[derive(Debug, Clone, Default)]
pub struct ProtoConfig {
    pub mode: ProtoMode,
}

pub struct ProtoLanguage;

/// Name of the `proto_library` generated for the package at `rel`.
pub fn library_name(c: &Config, rel: &str) -> String {
    format!("{}_proto", package_base_name(c, rel))
}

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*import\s+(?:public\s+|weak\s+)?"([^"]+)"\s*;"#).expect("valid regex")
    })
}

/// `.proto` files imported by `content`.
pub fn parse_imports(content: &str) -> Vec<String> {
    import_regex()
        .captures_iter(content)
        .map(|cap| cap[1].to_string())
        .collect()
}

impl Configurer for ProtoLanguage {
    fn check_flags(
        &self,
        _cmd: FixUpdateCommand,
        _args: &FixUpdateArgs,
        _c: &mut Config,
    ) -> Result<(), ConfigError> {
        Ok(())
    }

    fn known_directives(&self) -> &'static [&'static str] {
        &["proto"]
    }

    fn configure(&self, c: &mut Config, rel: &str, f: Option<&File>) {
        let Some(f) = f else {
            return;
        };
        for d in f.directives().iter().filter(|d| d.key == "proto") {
            match d.value.as_str() {
                "default" => c.proto.mode = ProtoMode::Default,
                "disable" => c.proto.mode = ProtoMode::Disable,
                other => warn!(rel = %rel, value = %other, "Unknown proto mode"),
            }
        }
    }
}

impl Language for ProtoLanguage {
    fn name(&self) -> &'static str {
        PROTO_NAME
    }

    fn kinds(&self) -> KindMap {
        KindMap::from([(
            "proto_library",
            KindInfo {
                non_empty_attrs: &["srcs"],
                merge_attrs: &["srcs"],
                resolve_attrs: &["deps"],
            },
        )])
    }

    fn loads(&self) -> &'static [LoadInfo] {
        &[]
    }

    fn fix(&self, _c: &Config, _f: &mut File) {}

    fn generate_rules(&self, args: &GenerateArgs<'_>) -> GenerateResult {
        let c = args.config;
        if c.proto.mode == ProtoMode::Disable {
            return GenerateResult::default();
        }

        let name = library_name(c, args.rel);
        let mut srcs: Vec<String> = args
            .regular_files
            .iter()
            .filter(|f| f.ends_with(".proto"))
            .cloned()
            .collect();
        srcs.sort();

        if srcs.is_empty() {
            return GenerateResult {
                gen: Vec::new(),
                empty: vec![Rule::new("proto_library", name)],
            };
        }

        let mut imports = BTreeSet::new();
        for src in &srcs {
            let path = args.dir.join(src);
            match fs::read_to_string(&path) {
                Ok(content) => imports.extend(parse_imports(&content)),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to read proto file"),
            }
        }

        let mut rule = Rule::new("proto_library", name);
        rule.set_attr("srcs", srcs);
        rule.set_attr("visibility", vec!["//visibility:public".to_string()]);
        rule.set_imports(imports.into_iter().collect());

        GenerateResult {
            gen: vec![rule],
            empty: Vec::new(),
        }
    }

    fn imports(&self, _c: &Config, r: &Rule, f: &File) -> Vec<ImportSpec> {
        if r.kind() != "proto_library" {
            return Vec::new();
        }
        r.attr_strings("srcs")
            .unwrap_or_default()
            .iter()
            .map(|src| ImportSpec::new(PROTO_NAME, join_rel(&f.pkg, src)))
            .collect()
    }

    fn resolve(
        &self,
        _c: &Config,
        ix: &SealedRuleIndex,
        _rc: &RemoteCache,
        r: &mut Rule,
        from: &Label,
    ) {
        let mut deps = BTreeSet::new();
        for imp in r.imports() {
            let spec = ImportSpec::new(PROTO_NAME, imp.as_str());
            let label = if let Some(label) = ix.find(&spec) {
                if label.same_target(from) {
                    continue;
                }
                label.clone()
            } else if let Some(file) = imp.strip_prefix(WELL_KNOWN_PREFIX) {
                let stem = file.strip_suffix(".proto").unwrap_or(file);
                Label::new(WELL_KNOWN_REPO, "", format!("{}_proto", stem))
            } else {
                warn!(import = %imp, rule = %from, "Unresolved proto import");
                continue;
            };
            debug!(import = %imp, label = %label, "Resolved proto import");
            deps.insert(label.rel(&from.repo, &from.pkg).to_string());
        }

        if deps.is_empty() {
            r.del_attr("deps");
        } else {
            r.set_attr("deps", deps.into_iter().collect::<Vec<_>>());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::RuleIndex;
    use std::path::Path;
    use tempfile::TempDir;

    fn generate(c: &Config, dir: &Path, rel: &str, files: &[String]) -> GenerateResult {
        ProtoLanguage.generate_rules(&GenerateArgs {
            config: c,
            dir,
            rel,
            file: None,
            subdirs: &[],
            regular_files: files,
            gen_files: &[],
            other_empty: &[],
            other_gen: &[],
        })
    }

    #[test]
    fn test_parse_imports() {
        let content = r#"syntax = "proto3";
import "google/protobuf/any.proto";
import public "a/b.proto";
  import weak "c.proto";
// import "commented.proto"
"#;
        assert_eq!(
            parse_imports(content),
            vec!["google/protobuf/any.proto", "a/b.proto", "c.proto"]
        );
    }

    #[test]
    fn test_generate_library() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("b.proto"),
            "syntax = \"proto3\";\nimport \"other/x.proto\";\n",
        )
        .unwrap();
        fs::write(temp.path().join("a.proto"), "syntax = \"proto3\";\n").unwrap();
        let files = vec![
            "b.proto".to_string(),
            "a.proto".to_string(),
            "README.md".to_string(),
        ];

        let result = generate(&Config::default(), temp.path(), "api/v1", &files);

        assert!(result.empty.is_empty());
        let rule = &result.gen[0];
        assert_eq!(rule.kind(), "proto_library");
        assert_eq!(rule.name(), "v1_proto");
        assert_eq!(
            rule.attr_strings("srcs").unwrap(),
            &["a.proto".to_string(), "b.proto".to_string()]
        );
        assert_eq!(rule.imports(), &["other/x.proto".to_string()]);
    }

    #[test]
    fn test_no_protos_yields_empty_rule() {
        let temp = TempDir::new().unwrap();
        let result = generate(&Config::default(), temp.path(), "pkg", &["a.go".to_string()]);
        assert!(result.gen.is_empty());
        assert_eq!(result.empty.len(), 1);
        assert_eq!(result.empty[0].name(), "pkg_proto");
    }

    #[test]
    fn test_disable_directive() {
        let f = File::parse(Path::new("BUILD"), "", "# buildsmith:proto disable\n").unwrap();
        let mut c = Config::default();
        ProtoLanguage.configure(&mut c, "", Some(&f));
        assert_eq!(c.proto.mode, ProtoMode::Disable);

        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.proto"), "").unwrap();
        let result = generate(&c, temp.path(), "", &["a.proto".to_string()]);
        assert!(result.gen.is_empty());
        assert!(result.empty.is_empty());
    }

    #[test]
    fn test_resolve() {
        let lib = File::parse(
            Path::new("BUILD.bazel"),
            "other",
            "proto_library(\n    name = \"other_proto\",\n    srcs = [\"x.proto\"],\n)\n",
        )
        .unwrap();
        let c = Config::default();
        let mut index = RuleIndex::new(crate::language::LanguageRegistry::with_defaults().kind_to_language());
        for r in lib.rules() {
            index.add_rule(&c, r, &lib);
        }
        let ix = index.finish();

        let mut rule = Rule::new("proto_library", "api_proto");
        rule.set_imports(vec![
            "other/x.proto".to_string(),
            "google/protobuf/timestamp.proto".to_string(),
            "missing/y.proto".to_string(),
        ]);
        ProtoLanguage.resolve(
            &c,
            &ix,
            &RemoteCache::default(),
            &mut rule,
            &Label::new("", "api", "api_proto"),
        );

        assert_eq!(
            rule.attr_strings("deps").unwrap(),
            &[
                "//other:other_proto".to_string(),
                "@com_google_protobuf//:timestamp_proto".to_string(),
            ]
        );
    }
}
