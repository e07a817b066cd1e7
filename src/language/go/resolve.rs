use super::{DEFAULT_LIB_NAME, GO_NAME};
use crate::label::Label;
use crate::resolve::{ImportSpec, RemoteCache, SealedRuleIndex};
use crate::rule::Rule;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Standard library packages have no dot in their first path element.
pub fn is_standard(imp: &str) -> bool {
    let first = imp.split('/').next().unwrap_or(imp);
    !first.contains('.')
}

pub(super) fn resolve(ix: &SealedRuleIndex, rc: &RemoteCache, r: &mut Rule, from: &Label) {
    let own_importpath = r.attr_string("importpath").map(str::to_string);
    let embeds: Vec<String> = r.attr_strings("embed").unwrap_or_default().to_vec();

    let mut deps = BTreeSet::new();
    for imp in r.imports() {
        if is_standard(imp) || own_importpath.as_deref() == Some(imp.as_str()) {
            continue;
        }

        let label = match resolve_import(ix, rc, imp, from) {
            Some(label) => label,
            None => continue,
        };
        let dep = label.rel(&from.repo, &from.pkg).to_string();
        if embeds.contains(&dep) {
            continue;
        }
        debug!(import = %imp, label = %dep, "Resolved Go import");
        deps.insert(dep);
    }

    if deps.is_empty() {
        r.del_attr("deps");
    } else {
        r.set_attr("deps", deps.into_iter().collect::<Vec<_>>());
    }
}

fn resolve_import(
    ix: &SealedRuleIndex,
    rc: &RemoteCache,
    imp: &str,
    from: &Label,
) -> Option<Label> {
    if let Some(label) = ix.find(&ImportSpec::new(GO_NAME, imp)) {
        if label.same_target(from) {
            return None;
        }
        return Some(label.clone());
    }
    if let Some((repo, sub)) = rc.root(imp) {
        return Some(Label::new(repo.name.as_str(), sub, DEFAULT_LIB_NAME));
    }
    warn!(import = %imp, rule = %from, "Unresolved Go import");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        fmt = { "fmt", true },
        net_http = { "net/http", true },
        github = { "github.com/pkg/errors", false },
        golang_x = { "golang.org/x/text", false },
    )]
    fn test_is_standard(imp: &str, expected: bool) {
        assert_eq!(is_standard(imp), expected);
    }
}
