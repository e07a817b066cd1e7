//! Language extensions
//!
//! Each [`Language`] generates rules for one ecosystem, says which import
//! identities a rule provides, and resolves the imports a generated rule
//! requires into dependency labels. Languages run in registration order and
//! later ones see what earlier ones generated in the same directory.

pub mod go;
pub mod proto;

use crate::config::{Config, Configurer};
use crate::label::Label;
use crate::resolve::{ImportSpec, RemoteCache, SealedRuleIndex};
use crate::rule::{File, KindMap, LoadInfo, Rule};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Loads for rules that do not belong to any language.
pub const GENERIC_LOADS: &[LoadInfo] = &[LoadInfo {
    name: "@buildsmith//:def.bzl",
    symbols: &["buildsmith"],
}];

/// Everything a language may look at when generating rules for a directory.
pub struct GenerateArgs<'a> {
    pub config: &'a Config,
    /// Absolute path of the directory.
    pub dir: &'a Path,
    /// Slash-separated path relative to the repository root; empty at the root.
    pub rel: &'a str,
    /// The existing build file, if any.
    pub file: Option<&'a File>,
    pub subdirs: &'a [String],
    pub regular_files: &'a [String],
    /// Files produced by existing rules of this directory.
    pub gen_files: &'a [String],
    /// Empty rules from languages that already ran for this directory.
    pub other_empty: &'a [Rule],
    /// Generated rules from languages that already ran for this directory.
    pub other_gen: &'a [Rule],
}

#[derive(Debug, Default)]
pub struct GenerateResult {
    /// Rules that should exist. They carry the imports they require.
    pub gen: Vec<Rule>,
    /// Rules that should be deleted if they exist and become empty.
    pub empty: Vec<Rule>,
}

pub trait Language: Configurer {
    fn name(&self) -> &'static str;

    /// Merge metadata for every rule kind this language generates.
    fn kinds(&self) -> KindMap;

    fn loads(&self) -> &'static [LoadInfo];

    /// Rewrites deprecated usage in an existing file.
    fn fix(&self, c: &Config, f: &mut File);

    fn generate_rules(&self, args: &GenerateArgs<'_>) -> GenerateResult;

    /// Identities `r` provides to other rules.
    fn imports(&self, c: &Config, r: &Rule, f: &File) -> Vec<ImportSpec>;

    /// Turns the imports `r` requires into dependency attributes.
    fn resolve(
        &self,
        c: &Config,
        ix: &SealedRuleIndex,
        rc: &RemoteCache,
        r: &mut Rule,
        from: &Label,
    );
}

/// Ordered set of languages.
#[derive(Clone, Default)]
pub struct LanguageRegistry {
    languages: Vec<Arc<dyn Language>>,
    configurers: Vec<Arc<dyn Configurer>>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(proto::ProtoLanguage);
        registry.register(go::GoLanguage);
        registry
    }

    pub fn register<L: Language + 'static>(&mut self, lang: L) {
        let lang = Arc::new(lang);
        self.configurers.push(lang.clone());
        self.languages.push(lang);
    }

    pub fn languages(&self) -> &[Arc<dyn Language>] {
        &self.languages
    }

    pub fn configurers(&self) -> &[Arc<dyn Configurer>] {
        &self.configurers
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Language>> {
        self.languages.iter().find(|l| l.name() == name)
    }

    /// Kind metadata of all languages combined.
    pub fn kinds(&self) -> KindMap {
        self.languages.iter().flat_map(|l| l.kinds()).collect()
    }

    pub fn kind_to_language(&self) -> HashMap<&'static str, Arc<dyn Language>> {
        let mut map = HashMap::new();
        for lang in &self.languages {
            for kind in lang.kinds().into_keys() {
                map.insert(kind, Arc::clone(lang));
            }
        }
        map
    }

    /// Known load files: generic ones first, then each language's.
    pub fn loads(&self) -> Vec<LoadInfo> {
        GENERIC_LOADS
            .iter()
            .chain(self.languages.iter().flat_map(|l| l.loads().iter()))
            .copied()
            .collect()
    }
}

/// Joins slash-separated path segments, skipping empty ones.
pub(crate) fn join_rel(base: &str, name: &str) -> String {
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, name),
    }
}

/// Base name used for rules named after their directory.
pub(crate) fn package_base_name(c: &Config, rel: &str) -> String {
    match rel.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ if !c.repo_name.is_empty() => c.repo_name.clone(),
        _ => "root".to_string(),
    }
}
