use crate::error::{SourceError, SourceResult};
use crate::path;
use crate::source::RepositorySource;
use crate::types::{Listing, RepositoryRef, SearchHit, SearchScope, TreeEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceOp {
    List,
    Read,
    Search,
}

/// One recorded call: operation, repository, and path or query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCall {
    pub op: SourceOp,
    pub repository: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Fixture {
    repositories: BTreeMap<String, FixtureRepo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureRepo {
    #[serde(default)]
    files: BTreeMap<String, String>,
}

/// Offline [`RepositorySource`] over a fixed set of files.
///
/// Directories are implied by file paths. Git refs are ignored. Every call
/// is recorded, and failures can be injected per operation and target.
#[derive(Debug, Default)]
pub struct InMemorySource {
    repos: HashMap<RepositoryRef, BTreeMap<String, String>>,
    failures: HashMap<(SourceOp, String), SourceError>,
    latency: Option<Duration>,
    calls: Mutex<Vec<SourceCall>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `{"repositories": {"owner/name": {"files": {path: content}}}}`.
    pub fn from_fixture_json(raw: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(raw).context("Invalid fixture JSON")?;
        let mut source = Self::new();
        for (name, repo) in fixture.repositories {
            let repo_ref: RepositoryRef = name
                .parse()
                .with_context(|| format!("Invalid fixture repository '{name}'"))?;
            source = source.with_repository(&repo_ref);
            for (file, content) in repo.files {
                source = source.with_file(&repo_ref, &file, &content);
            }
        }
        Ok(source)
    }

    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file {}", path.display()))?;
        Self::from_fixture_json(&raw)
    }

    pub fn with_repository(mut self, repo: &RepositoryRef) -> Self {
        self.repos.entry(repo.clone()).or_default();
        self
    }

    pub fn with_file(mut self, repo: &RepositoryRef, file: &str, content: &str) -> Self {
        self.repos
            .entry(repo.clone())
            .or_default()
            .insert(path::normalize(file), content.to_string());
        self
    }

    /// Makes every `op` on `target` (a path, or a query for searches) fail with `err`.
    pub fn with_failure(mut self, op: SourceOp, target: &str, err: SourceError) -> Self {
        let target = match op {
            SourceOp::Search => target.to_string(),
            _ => path::normalize(target),
        };
        self.failures.insert((op, target), err);
        self
    }

    /// Delays every answer, so callers can observe in-flight calls.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.lock_calls().clone()
    }

    pub fn call_count(&self, op: SourceOp) -> usize {
        self.lock_calls().iter().filter(|c| c.op == op).count()
    }

    /// Paths passed to `list`, in call order.
    pub fn listed_paths(&self) -> Vec<String> {
        self.lock_calls()
            .iter()
            .filter(|c| c.op == SourceOp::List)
            .map(|c| c.target.clone())
            .collect()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<SourceCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self, op: SourceOp, repo: &RepositoryRef, target: &str) -> SourceResult<()> {
        self.lock_calls().push(SourceCall {
            op,
            repository: repo.full_name(),
            target: target.to_string(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failures.get(&(op, target.to_string())) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn files(&self, repo: &RepositoryRef) -> SourceResult<&BTreeMap<String, String>> {
        self.repos
            .get(repo)
            .ok_or_else(|| SourceError::NotFound(format!("repository {repo}")))
    }
}

#[async_trait]
impl RepositorySource for InMemorySource {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn list(
        &self,
        repo: &RepositoryRef,
        path: &str,
        _git_ref: Option<&str>,
    ) -> SourceResult<Listing> {
        let path = path::normalize(path);
        self.enter(SourceOp::List, repo, &path).await?;
        let files = self.files(repo)?;

        if let Some(content) = files.get(&path) {
            return Ok(Listing::File(TreeEntry::file(&path, Some(content.len() as u64))));
        }

        let prefix = if path::is_root(&path) {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut children: BTreeMap<&str, TreeEntry> = BTreeMap::new();
        for (file, content) in files.range(prefix.clone()..) {
            let Some(rest) = file.strip_prefix(&prefix) else {
                break;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children
                        .entry(dir)
                        .or_insert_with(|| TreeEntry::directory(&path::join(&path, dir)));
                }
                None => {
                    children.insert(rest, TreeEntry::file(file, Some(content.len() as u64)));
                }
            }
        }

        if children.is_empty() && !path::is_root(&path) {
            return Err(SourceError::NotFound(format!("{repo}:{path}")));
        }
        Ok(Listing::Directory(children.into_values().collect()))
    }

    async fn read_file(
        &self,
        repo: &RepositoryRef,
        path: &str,
        _git_ref: Option<&str>,
    ) -> SourceResult<Vec<u8>> {
        let path = path::normalize(path);
        self.enter(SourceOp::Read, repo, &path).await?;
        self.files(repo)?
            .get(&path)
            .map(|content| content.clone().into_bytes())
            .ok_or_else(|| SourceError::NotFound(format!("{repo}:{path}")))
    }

    async fn search_text(
        &self,
        repo: &RepositoryRef,
        query: &str,
        scope: &SearchScope,
    ) -> SourceResult<Vec<SearchHit>> {
        self.enter(SourceOp::Search, repo, query).await?;
        let files = self.files(repo)?;
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        Ok(files
            .iter()
            .filter(|(file, _)| scope.allows(file))
            .filter_map(|(file, content)| {
                let at = find_phrase(content, query)?;
                Some(SearchHit {
                    path: file.clone(),
                    snippet: line_at(content, at).trim().to_string(),
                    score: 1.0,
                })
            })
            .collect())
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte offset of the first occurrence of `needle` that is not glued to
/// surrounding identifier characters.
fn find_phrase(haystack: &str, needle: &str) -> Option<usize> {
    let starts_word = needle.chars().next().is_some_and(is_word);
    let ends_word = needle.chars().next_back().is_some_and(is_word);
    haystack.match_indices(needle).map(|(i, _)| i).find(|&i| {
        let before_ok = !starts_word || !haystack[..i].chars().next_back().is_some_and(is_word);
        let after_ok = !ends_word || !haystack[i + needle.len()..].chars().next().is_some_and(is_word);
        before_ok && after_ok
    })
}

fn line_at(text: &str, at: usize) -> &str {
    let start = text[..at].rfind('\n').map_or(0, |i| i + 1);
    let end = text[at..].find('\n').map_or(text.len(), |i| at + i);
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;
    use pretty_assertions::assert_eq;

    fn repo() -> RepositoryRef {
        "o/r".parse().unwrap()
    }

    fn source() -> InMemorySource {
        InMemorySource::new()
            .with_file(&repo(), "src/filters/AuthFilter.java", "public class AuthFilter {}")
            .with_file(&repo(), "src/filters/AuthFilters.java", "class AuthFilters {}")
            .with_file(&repo(), "README.md", "# demo")
    }

    #[tokio::test]
    async fn lists_implied_directories() {
        let src = source();
        let root = src.list(&repo(), "", None).await.unwrap();
        let names: Vec<_> = root.entries().iter().map(|e| (e.name.as_str(), e.kind)).collect();
        assert_eq!(
            names,
            vec![("README.md", EntryKind::File), ("src", EntryKind::Directory)]
        );

        let dir = src.list(&repo(), "/src/filters/", None).await.unwrap();
        assert_eq!(dir.entries().len(), 2);
        assert_eq!(dir.entries()[0].path, "src/filters/AuthFilter.java");
    }

    #[tokio::test]
    async fn missing_paths_and_repos_are_not_found() {
        let src = source();
        let err = src.list(&repo(), "src/filter", None).await.unwrap_err();
        assert!(err.is_not_found());
        let other: RepositoryRef = "x/y".parse().unwrap();
        assert!(src.list(&other, "", None).await.unwrap_err().is_not_found());
        assert!(src.read_file(&repo(), "src", None).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn file_path_lists_as_single_entry() {
        let listing = source().list(&repo(), "README.md", None).await.unwrap();
        assert!(matches!(listing, Listing::File(ref e) if e.size == Some(6)));
    }

    #[tokio::test]
    async fn search_matches_whole_words() {
        let src = source();
        let hits = src
            .search_text(&repo(), "class AuthFilter", &SearchScope::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "src/filters/AuthFilter.java");
        assert_eq!(hits[0].snippet, "public class AuthFilter {}");
    }

    #[tokio::test]
    async fn search_honours_scope() {
        let src = source().with_file(&repo(), "docs/AuthFilter.md", "class AuthFilter notes");
        let all = src
            .search_text(&repo(), "AuthFilter", &SearchScope::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let java = SearchScope::new(Some("java"), None);
        let hits = src.search_text(&repo(), "AuthFilter", &java).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "src/filters/AuthFilter.java");

        let docs = SearchScope::new(None, Some("docs"));
        let hits = src.search_text(&repo(), "AuthFilter", &docs).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "docs/AuthFilter.md");
    }

    #[tokio::test]
    async fn injected_failures_and_call_log() {
        let src = source().with_failure(
            SourceOp::List,
            "src",
            SourceError::RateLimited("slow down".into()),
        );
        let err = src.list(&repo(), "src", None).await.unwrap_err();
        assert_eq!(err, SourceError::RateLimited("slow down".into()));
        src.list(&repo(), "", None).await.unwrap();
        assert_eq!(src.listed_paths(), vec!["src".to_string(), String::new()]);
        assert_eq!(src.call_count(SourceOp::Search), 0);
    }

    #[test]
    fn fixture_json_loads() {
        let src = InMemorySource::from_fixture_json(
            r#"{"repositories":{"o/r":{"files":{"a/b.txt":"x"}},"o/empty":{}}}"#,
        )
        .unwrap();
        assert_eq!(src.repos.len(), 2);
        assert!(InMemorySource::from_fixture_json(r#"{"repositories":{"bad":{}}}"#).is_err());
    }

    #[test]
    fn phrase_boundaries() {
        assert_eq!(find_phrase("class FooBar\nclass Foo {", "class Foo"), Some(13));
        assert_eq!(find_phrase("xisBlank(s)", "isBlank("), None);
        assert_eq!(find_phrase("StrUtil.isBlank(s)", "isBlank("), Some(8));
    }
}
