//! Repository-wide rule index
//!
//! The index has two states. [`RuleIndex`] only accepts registrations and is
//! filled while the tree is walked; [`RuleIndex::finish`] consumes it and
//! returns a [`SealedRuleIndex`], which only answers lookups. No lookup can
//! happen before every registration is done because the sealed form does not
//! exist until then.

mod remote;

pub use remote::{list_repositories, RemoteCache, Repo};

use crate::config::Config;
use crate::label::Label;
use crate::language::Language;
use crate::rule::{File, Rule};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// An import identity in the namespace of one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportSpec {
    pub lang: &'static str,
    pub imp: String,
}

impl ImportSpec {
    pub fn new(lang: &'static str, imp: impl Into<String>) -> Self {
        Self {
            lang,
            imp: imp.into(),
        }
    }
}

impl fmt::Display for ImportSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lang, self.imp)
    }
}

/// Write side of the index, used during the walk.
pub struct RuleIndex {
    kind_to_lang: HashMap<&'static str, Arc<dyn Language>>,
    labels: HashMap<ImportSpec, Label>,
}

impl RuleIndex {
    pub fn new(kind_to_lang: HashMap<&'static str, Arc<dyn Language>>) -> Self {
        Self {
            kind_to_lang,
            labels: HashMap::new(),
        }
    }

    /// Records every identity `r` provides. Rules of kinds no language owns
    /// provide nothing.
    ///
    /// A later registration of the same identity replaces the earlier one.
    /// Two different rules claiming one identity is a mistake in the
    /// repository that is reported but not rejected.
    pub fn add_rule(&mut self, c: &Config, r: &Rule, f: &File) {
        let Some(lang) = self.kind_to_lang.get(r.kind()) else {
            return;
        };
        if r.name().is_empty() {
            return;
        }
        let label = Label::new(c.repo_name.as_str(), f.pkg.as_str(), r.name());
        for spec in lang.imports(c, r, f) {
            if let Some(previous) = self.labels.get(&spec) {
                if !previous.same_target(&label) {
                    warn!(
                        import = %spec,
                        previous = %previous,
                        replacement = %label,
                        "Multiple rules provide the same import; using the last one"
                    );
                }
            }
            self.labels.insert(spec, label.clone());
        }
    }

    pub fn finish(self) -> SealedRuleIndex {
        debug!(imports = self.labels.len(), "Rule index sealed");
        SealedRuleIndex {
            labels: self.labels,
        }
    }
}

/// Read side of the index, used during resolution.
#[derive(Debug)]
pub struct SealedRuleIndex {
    labels: HashMap<ImportSpec, Label>,
}

impl SealedRuleIndex {
    pub fn find(&self, spec: &ImportSpec) -> Option<&Label> {
        self.labels.get(spec)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageRegistry;
    use std::path::Path;

    fn build_file(pkg: &str, content: &str) -> File {
        File::parse(Path::new("BUILD.bazel"), pkg, content).unwrap()
    }

    fn index_files(files: &[File]) -> SealedRuleIndex {
        let registry = LanguageRegistry::with_defaults();
        let mut index = RuleIndex::new(registry.kind_to_language());
        let c = Config::default();
        for f in files {
            for r in f.rules() {
                index.add_rule(&c, r, f);
            }
        }
        index.finish()
    }

    #[test]
    fn test_go_library_registers_importpath() {
        let f = build_file(
            "lib",
            "go_library(\n    name = \"go_default_library\",\n    importpath = \"example.com/lib\",\n)\n",
        );
        let ix = index_files(&[f]);

        let label = ix.find(&ImportSpec::new("go", "example.com/lib")).unwrap();
        assert_eq!(label.to_string(), "//lib:go_default_library");
        assert!(ix.find(&ImportSpec::new("proto", "example.com/lib")).is_none());
    }

    #[test]
    fn test_unknown_kinds_register_nothing() {
        let f = build_file("a", "genrule(name = \"g\")\n");
        assert!(index_files(&[f]).is_empty());
    }

    #[test]
    fn test_last_registration_wins() {
        let lib = "go_library(\n    name = \"go_default_library\",\n    importpath = \"example.com/dup\",\n)\n";
        let ix = index_files(&[build_file("first", lib), build_file("second", lib)]);

        assert_eq!(ix.len(), 1);
        assert_eq!(
            ix.find(&ImportSpec::new("go", "example.com/dup")).unwrap().pkg,
            "second"
        );
    }
}
