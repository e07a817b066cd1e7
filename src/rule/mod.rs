//! Declarative model of a build file
//!
//! A [`File`] is an ordered list of statements: `load(...)` statements,
//! rule calls, standalone comment blocks and anything else kept verbatim.
//! Generators and the merger work on [`Rule`]s; the statement list is the
//! single source of truth and [`File::sync`] drops whatever was deleted
//! before printing.

mod parser;
mod printer;

pub use parser::ParseError;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix of in-file configuration comments (`# buildsmith:key value`).
pub const DIRECTIVE_PREFIX: &str = "buildsmith:";

/// `# keep` or `# keep: reason`.
pub(crate) fn is_keep_comment(comment: &str) -> bool {
    let body = comment.trim_start_matches('#').trim();
    body == "keep" || body.starts_with("keep:")
}

/// An attribute value.
///
/// Anything the model does not understand is kept as [`Value::Raw`] source
/// text and printed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    List(Vec<String>),
    Bool(bool),
    Int(i64),
    Raw(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub key: String,
    pub value: Value,
    /// Comment lines printed above the attribute.
    pub comments: Vec<String>,
    /// Comment on the same line after the value, printed after the comma.
    pub suffix_comment: Option<String>,
    /// Set by a `# keep` comment after or inside the value; merging never
    /// touches the value.
    pub keep: bool,
}

/// A rule call such as `go_library(name = "go_default_library", ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    kind: String,
    attrs: Vec<Attr>,
    pub comments: Vec<String>,
    pub end_comments: Vec<String>,
    /// Comment on the same line after the closing parenthesis.
    pub suffix_comment: Option<String>,
    keep: bool,
    deleted: bool,
    imports: Vec<String>,
}

impl Rule {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        let mut rule = Self::anonymous(kind);
        let name = name.into();
        if !name.is_empty() {
            rule.set_attr("name", name);
        }
        rule
    }

    /// A call without a `name` attribute, e.g. `buildsmith_dependencies()`.
    pub fn anonymous(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: Vec::new(),
            comments: Vec::new(),
            end_comments: Vec::new(),
            suffix_comment: None,
            keep: false,
            deleted: false,
            imports: Vec::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: impl Into<String>) {
        self.kind = kind.into();
    }

    pub fn name(&self) -> &str {
        self.attr_string("name").unwrap_or("")
    }

    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.iter().find(|a| a.key == key).map(|a| &a.value)
    }

    pub fn attr_string(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Value::as_str)
    }

    pub fn attr_strings(&self, key: &str) -> Option<&[String]> {
        self.attr(key).and_then(Value::as_list)
    }

    pub fn attr_keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(|a| a.key.as_str())
    }

    pub fn attr_has_keep(&self, key: &str) -> bool {
        self.attrs.iter().any(|a| a.key == key && a.keep)
    }

    /// Replaces the value in place, or appends the attribute if it is new.
    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|a| a.key == key) {
            Some(attr) => attr.value = value,
            None => self.attrs.push(Attr {
                key: key.to_string(),
                value,
                comments: Vec::new(),
                suffix_comment: None,
                keep: false,
            }),
        }
    }

    pub fn del_attr(&mut self, key: &str) {
        self.attrs.retain(|a| a.key != key);
    }

    pub(crate) fn push_attr(&mut self, attr: Attr) {
        self.attrs.push(attr);
    }

    pub fn has_keep(&self) -> bool {
        self.keep
    }

    pub fn set_keep(&mut self, keep: bool) {
        self.keep = keep;
    }

    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Import identities this rule requires. Never printed.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn set_imports(&mut self, imports: Vec<String>) {
        self.imports = imports;
    }
}

/// A `load("module", "sym", alias = "sym")` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Load {
    pub module: String,
    /// `(local, original)` pairs; equal for plain symbols.
    pub symbols: Vec<(String, String)>,
    /// Comment lines printed above the statement, including any written
    /// between its arguments.
    pub comments: Vec<String>,
    /// Comment on the same line after the closing parenthesis.
    pub suffix_comment: Option<String>,
    deleted: bool,
}

impl Load {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            symbols: Vec::new(),
            comments: Vec::new(),
            suffix_comment: None,
            deleted: false,
        }
    }

    pub fn has(&self, sym: &str) -> bool {
        self.symbols.iter().any(|(local, _)| local == sym)
    }

    pub fn add(&mut self, sym: &str) {
        if !self.has(sym) {
            self.symbols.push((sym.to_string(), sym.to_string()));
        }
    }

    pub fn remove(&mut self, sym: &str) {
        self.symbols.retain(|(local, _)| local != sym);
    }

    pub fn local_symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|(local, _)| local.as_str())
    }

    pub fn delete(&mut self) {
        self.deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Statements that are not rules or loads, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verbatim {
    pub comments: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Load(Load),
    Rule(Rule),
    /// Comment block separated from the next statement by a blank line.
    Comments(Vec<String>),
    Verbatim(Verbatim),
}

/// A `# buildsmith:key value` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub value: String,
}

/// Merge metadata for one rule kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindInfo {
    /// A matched rule is deleted by an empty rule once none of these remain.
    pub non_empty_attrs: &'static [&'static str],
    /// Overwritten from the generated rule during the pre-resolve merge.
    pub merge_attrs: &'static [&'static str],
    /// Overwritten during the post-resolve merge.
    pub resolve_attrs: &'static [&'static str],
}

pub type KindMap = HashMap<&'static str, KindInfo>;

/// A `.bzl` file and the symbols generated rules may need from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadInfo {
    pub name: &'static str,
    pub symbols: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Where the file was read from, or will be created.
    pub path: PathBuf,
    /// Slash-separated package path relative to the repository root.
    pub pkg: String,
    stmts: Vec<Stmt>,
    trailing_comments: Vec<String>,
    directives: Vec<Directive>,
}

impl File {
    pub fn empty(path: impl Into<PathBuf>, pkg: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pkg: pkg.into(),
            stmts: Vec::new(),
            trailing_comments: Vec::new(),
            directives: Vec::new(),
        }
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path, pkg: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read build file {}", path.display()))?;
        Ok(Self::parse(path, pkg, &content)?)
    }

    pub fn parse(path: &Path, pkg: &str, content: &str) -> Result<Self, ParseError> {
        let (stmts, trailing_comments) = parser::parse(path, content)?;
        let mut file = Self {
            path: path.to_path_buf(),
            pkg: pkg.to_string(),
            stmts,
            trailing_comments,
            directives: Vec::new(),
        };
        file.directives = file.scan_directives();
        Ok(file)
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Rule(r) if !r.is_deleted() => Some(r),
            _ => None,
        })
    }

    pub fn rules_mut(&mut self) -> impl Iterator<Item = &mut Rule> {
        self.stmts.iter_mut().filter_map(|s| match s {
            Stmt::Rule(r) if !r.is_deleted() => Some(r),
            _ => None,
        })
    }

    pub fn loads(&self) -> impl Iterator<Item = &Load> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Load(l) if !l.is_deleted() => Some(l),
            _ => None,
        })
    }

    pub fn loads_mut(&mut self) -> impl Iterator<Item = &mut Load> {
        self.stmts.iter_mut().filter_map(|s| match s {
            Stmt::Load(l) if !l.is_deleted() => Some(l),
            _ => None,
        })
    }

    pub fn insert_rule(&mut self, rule: Rule) {
        self.stmts.push(Stmt::Rule(rule));
    }

    /// Inserts after the last existing load, or after any leading comment
    /// blocks when the file has no loads yet.
    pub fn insert_load(&mut self, load: Load) {
        let at = match self.stmts.iter().rposition(|s| matches!(s, Stmt::Load(_))) {
            Some(i) => i + 1,
            None => self
                .stmts
                .iter()
                .position(|s| !matches!(s, Stmt::Comments(_)))
                .unwrap_or(self.stmts.len()),
        };
        self.stmts.insert(at, Stmt::Load(load));
    }

    /// Drops deleted rules, deleted loads and loads left without symbols.
    pub fn sync(&mut self) {
        self.stmts.retain(|s| match s {
            Stmt::Rule(r) => !r.is_deleted(),
            Stmt::Load(l) => !l.is_deleted() && !l.symbols.is_empty(),
            _ => true,
        });
    }

    /// Renders the file in canonical form.
    pub fn format(&self) -> String {
        printer::print(&self.stmts, &self.trailing_comments)
    }

    fn scan_directives(&self) -> Vec<Directive> {
        let mut all: Vec<&String> = Vec::new();
        for stmt in &self.stmts {
            match stmt {
                Stmt::Comments(c) => all.extend(c),
                Stmt::Load(l) => all.extend(&l.comments),
                Stmt::Rule(r) => all.extend(&r.comments),
                Stmt::Verbatim(v) => all.extend(&v.comments),
            }
        }
        all.extend(&self.trailing_comments);

        all.into_iter()
            .filter_map(|c| {
                let body = c.trim_start_matches('#').trim();
                let rest = body.strip_prefix(DIRECTIVE_PREFIX)?;
                let (key, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Some(Directive {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                })
            })
            .collect()
    }
}
