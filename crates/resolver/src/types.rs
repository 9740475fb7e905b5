use crate::error::ResolveError;
use crate::path;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const WEB_HOSTS: [&str; 2] = ["github.com", "www.github.com"];

/// Owner/name pair identifying a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RepositoryRef {
    owner: String,
    name: String,
}

impl RepositoryRef {
    pub fn new(owner: &str, name: &str) -> Result<Self, ResolveError> {
        let name = name.strip_suffix(".git").unwrap_or(name);
        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(ResolveError::InvalidReference(format!("{owner}/{name}")));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for RepositoryRef {
    type Err = ResolveError;

    /// Accepts `owner/name` or a web URL such as `https://github.com/owner/name/tree/main`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ResolveError::InvalidReference(raw.to_string());
        let trimmed = raw.trim();

        if let Some(rest) = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
        {
            let (host, path) = rest.split_once('/').ok_or_else(invalid)?;
            if !WEB_HOSTS.contains(&host.to_ascii_lowercase().as_str()) {
                return Err(invalid());
            }
            let mut parts = path.split('/').filter(|p| !p.is_empty());
            let owner = parts.next().ok_or_else(invalid)?;
            let name = parts.next().ok_or_else(invalid)?;
            return Self::new(owner, name).map_err(|_| invalid());
        }

        if trimmed.contains("://") {
            return Err(invalid());
        }

        let parts: Vec<&str> = trimmed.trim_end_matches('/').split('/').collect();
        match parts.as_slice() {
            [owner, name] => Self::new(owner, name).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for RepositoryRef {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepositoryRef> for String {
    fn from(value: RepositoryRef) -> Self {
        value.full_name()
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn file(path: &str, size: Option<u64>) -> Self {
        Self::with_kind(path, EntryKind::File, size)
    }

    pub fn directory(path: &str) -> Self {
        Self::with_kind(path, EntryKind::Directory, None)
    }

    fn with_kind(path: &str, kind: EntryKind, size: Option<u64>) -> Self {
        let path = path::normalize(path);
        Self {
            name: path::file_name(&path).to_string(),
            path,
            kind,
            size,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// What a source returns for a path: a single file or a directory's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "entries", rename_all = "snake_case")]
pub enum Listing {
    File(TreeEntry),
    Directory(Vec<TreeEntry>),
}

impl Listing {
    pub fn entries(&self) -> &[TreeEntry] {
        match self {
            Listing::File(entry) => std::slice::from_ref(entry),
            Listing::Directory(entries) => entries,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Listing::Directory(_))
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Listing::File(_) => EntryKind::File,
            Listing::Directory(_) => EntryKind::Directory,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub snippet: String,
    pub score: f64,
}

/// Narrows a code search to one file extension and/or one subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchScope {
    extension: Option<String>,
    path: Option<String>,
}

impl SearchScope {
    /// `extension` may carry a leading dot; a root `path` means no path filter.
    pub fn new(extension: Option<&str>, path: Option<&str>) -> Self {
        Self {
            extension: extension
                .map(|e| e.trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty()),
            path: path.map(path::normalize).filter(|p| !path::is_root(p)),
        }
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.extension.is_none() && self.path.is_none()
    }

    pub fn allows(&self, file: &str) -> bool {
        let extension_ok = self.extension.as_deref().map_or(true, |ext| {
            path::file_name(file)
                .rsplit_once('.')
                .is_some_and(|(_, actual)| actual.eq_ignore_ascii_case(ext))
        });
        let path_ok = self
            .path
            .as_deref()
            .map_or(true, |prefix| path::is_within(prefix, &path::normalize(file)));
        extension_ok && path_ok
    }
}

/// Decoded text of one file, cut to the read budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub repository: RepositoryRef,
    pub path: String,
    pub name: String,
    /// Size of the full file in bytes.
    pub size: u64,
    pub content: String,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_scope_filters_extension_and_subtree() {
        let scope = SearchScope::new(Some(".java"), Some("/src/filters/"));
        assert_eq!(scope.extension(), Some("java"));
        assert_eq!(scope.path(), Some("src/filters"));
        assert!(scope.allows("src/filters/AuthFilter.java"));
        assert!(scope.allows("src/filters/deep/Util.JAVA"));
        assert!(!scope.allows("src/filters/README.md"));
        assert!(!scope.allows("src/filtersx/AuthFilter.java"));
        assert!(!scope.allows("src/Main.java"));

        let open = SearchScope::new(Some("  "), Some("/"));
        assert!(open.is_empty());
        assert!(open.allows("anything"));
    }

    #[test]
    fn parses_owner_name() {
        let repo: RepositoryRef = "hutool/hutool".parse().unwrap();
        assert_eq!(repo.owner(), "hutool");
        assert_eq!(repo.name(), "hutool");
        assert_eq!(repo.to_string(), "hutool/hutool");
    }

    #[test]
    fn parses_web_url_with_extra_segments() {
        let repo: RepositoryRef = "https://github.com/spring-projects/spring-framework/tree/main/spring-core"
            .parse()
            .unwrap();
        assert_eq!(repo.full_name(), "spring-projects/spring-framework");

        let repo: RepositoryRef = "https://github.com/yangzongzhuan/RuoYi.git".parse().unwrap();
        assert_eq!(repo.name(), "RuoYi");
    }

    #[test]
    fn rejects_malformed_references() {
        for raw in [
            "",
            "just-a-name",
            "a/b/c",
            "/name",
            "owner/",
            "https://gitlab.com/owner/name",
            "https://github.com/owner",
            "ftp://github.com/owner/name",
            "owner/na me",
        ] {
            let err = raw.parse::<RepositoryRef>().unwrap_err();
            assert!(
                matches!(err, ResolveError::InvalidReference(_)),
                "expected InvalidReference for {raw:?}"
            );
        }
    }

    #[test]
    fn serializes_as_full_name() {
        let repo: RepositoryRef = "o/r".parse().unwrap();
        assert_eq!(serde_json::to_string(&repo).unwrap(), "\"o/r\"");
        let back: RepositoryRef = serde_json::from_str("\"o/r\"").unwrap();
        assert_eq!(back, repo);
        assert!(serde_json::from_str::<RepositoryRef>("\"nope\"").is_err());
    }

    #[test]
    fn entry_name_comes_from_path() {
        let entry = TreeEntry::file("/src/filters/AuthFilter.java", Some(10));
        assert_eq!(entry.name, "AuthFilter.java");
        assert_eq!(entry.path, "src/filters/AuthFilter.java");
        assert!(!entry.is_directory());
    }
}
