use crate::rule::File;
use std::sync::Arc;

/// An external repository declared in the workspace file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    pub name: String,
    /// Import path prefix served by the repository.
    pub go_prefix: String,
}

impl Repo {
    pub fn new(name: impl Into<String>, go_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            go_prefix: go_prefix.into(),
        }
    }
}

/// Repositories declared by `go_repository(name = ..., importpath = ...)`.
pub fn list_repositories(f: &File) -> Vec<Repo> {
    f.rules()
        .filter(|r| r.kind() == "go_repository")
        .filter_map(|r| {
            let name = r.name();
            let prefix = r.attr_string("importpath")?;
            (!name.is_empty() && !prefix.is_empty()).then(|| Repo::new(name, prefix))
        })
        .collect()
}

/// Maps import paths to the external repository that serves them.
#[derive(Debug, Default)]
pub struct RemoteCache {
    repos: Arc<Vec<Repo>>,
}

impl RemoteCache {
    pub fn new(repos: impl Into<Arc<Vec<Repo>>>) -> Self {
        Self {
            repos: repos.into(),
        }
    }

    /// The repository with the longest prefix matching `imp`, plus the import
    /// path relative to that prefix.
    pub fn root<'a>(&self, imp: &'a str) -> Option<(&Repo, &'a str)> {
        self.repos
            .iter()
            .filter_map(|repo| {
                let rest = imp.strip_prefix(repo.go_prefix.as_str())?;
                if rest.is_empty() {
                    Some((repo, rest))
                } else {
                    rest.strip_prefix('/').map(|sub| (repo, sub))
                }
            })
            .max_by_key(|(repo, _)| repo.go_prefix.len())
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_list_repositories() {
        let f = File::parse(
            Path::new("WORKSPACE"),
            "",
            r#"workspace(name = "example")

go_repository(
    name = "org_golang_x_text",
    importpath = "golang.org/x/text",
)

go_repository(name = "no_importpath")

http_archive(name = "other")
"#,
        )
        .unwrap();

        assert_eq!(
            list_repositories(&f),
            vec![Repo::new("org_golang_x_text", "golang.org/x/text")]
        );
    }

    #[test]
    fn test_root_prefers_longest_prefix() {
        let rc = RemoteCache::new(vec![
            Repo::new("com_github_a", "github.com/a"),
            Repo::new("com_github_a_b", "github.com/a/b"),
        ]);

        let (repo, rel) = rc.root("github.com/a/b/c").unwrap();
        assert_eq!(repo.name, "com_github_a_b");
        assert_eq!(rel, "c");

        let (repo, rel) = rc.root("github.com/a").unwrap();
        assert_eq!(repo.name, "com_github_a");
        assert_eq!(rel, "");

        assert!(rc.root("github.com/ab").is_none());
        assert!(rc.root("example.com/x").is_none());
    }
}
