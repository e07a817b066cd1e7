//! Go source file scanning
//!
//! Only the package clause and import declarations matter for rule
//! generation, so files are scanned with regular expressions rather than
//! parsed.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoFileInfo {
    pub name: String,
    pub package: String,
    pub imports: Vec<String>,
    pub is_test: bool,
}

impl GoFileInfo {
    pub fn is_main(&self) -> bool {
        self.package == "main"
    }
}

struct Patterns {
    block_comment: Regex,
    line_comment: Regex,
    package: Regex,
    import_single: Regex,
    import_block: Regex,
    quoted: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        block_comment: Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"),
        line_comment: Regex::new(r"(?m)//.*$").expect("valid regex"),
        package: Regex::new(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"),
        import_single: Regex::new(r#"(?m)^\s*import\s+(?:[A-Za-z_.][A-Za-z0-9_]*\s+)?"([^"]+)""#)
            .expect("valid regex"),
        import_block: Regex::new(r"(?s)\bimport\s*\((.*?)\)").expect("valid regex"),
        quoted: Regex::new(r#""([^"]+)""#).expect("valid regex"),
    })
}

/// Scans Go source text. Returns `None` when there is no package clause.
pub fn parse_go_source(name: &str, content: &str) -> Option<GoFileInfo> {
    let p = patterns();
    let stripped = p.block_comment.replace_all(content, "");
    let stripped = p.line_comment.replace_all(&stripped, "");

    let package = p.package.captures(&stripped)?[1].to_string();

    let mut imports: Vec<String> = p
        .import_single
        .captures_iter(&stripped)
        .map(|cap| cap[1].to_string())
        .collect();
    for block in p.import_block.captures_iter(&stripped) {
        imports.extend(p.quoted.captures_iter(&block[1]).map(|cap| cap[1].to_string()));
    }
    imports.sort();
    imports.dedup();

    Some(GoFileInfo {
        name: name.to_string(),
        package,
        imports,
        is_test: name.ends_with("_test.go"),
    })
}

/// Reads and scans `dir/name`.
pub fn go_file_info(dir: &Path, name: &str) -> Result<Option<GoFileInfo>> {
    let path = dir.join(name);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read Go file {}", path.display()))?;
    Ok(parse_go_source(name, &content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_block_imports() {
        let src = r#"// Package x does things.
package x

import "fmt"

import (
	"strings"
	errs "github.com/pkg/errors"
	_ "example.com/repo/lib" // side effects
	/* "commented.out/pkg" */
)

func main() {}
"#;
        let info = parse_go_source("x.go", src).unwrap();
        assert_eq!(info.package, "x");
        assert!(!info.is_test);
        assert_eq!(
            info.imports,
            vec!["example.com/repo/lib", "fmt", "github.com/pkg/errors", "strings"]
        );
    }

    #[test]
    fn test_named_single_import() {
        let info = parse_go_source("a_test.go", "package a_test\nimport t \"testing\"\n").unwrap();
        assert_eq!(info.imports, vec!["testing"]);
        assert!(info.is_test);
        assert!(!info.is_main());
    }

    #[test]
    fn test_missing_package_clause() {
        assert!(parse_go_source("bad.go", "// package x\nfunc f() {}\n").is_none());
    }
}
