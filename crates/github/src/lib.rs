//! [`RepositorySource`] over the GitHub REST API (contents + code search).

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use navigator_resolver::{
    Listing, RepositoryRef, RepositorySource, SearchHit, SearchScope, SourceError, SourceResult,
    TreeEntry,
};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const API_URL_ENV: &str = "NAVIGATOR_API_URL";

const RAW_CONTENT_HOST: &str = "raw.githubusercontent.com";
const AGENT: &str = concat!("repo-navigator/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA: &str = "application/vnd.github+json";
const TEXT_MATCH_MEDIA: &str = "application/vnd.github.text-match+json";
const SEARCH_PER_PAGE: &str = "20";
const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GitHubConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            api_url: non_empty(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token: non_empty(TOKEN_ENV),
            ..Self::default()
        }
    }
}

/// Talks to `/repos/{owner}/{name}/contents` and `/search/code`.
///
/// The token, when present, is forwarded as a bearer header and never inspected.
/// It only goes to the API origin and to GitHub's raw content host.
#[derive(Debug, Clone)]
pub struct GitHubSource {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl GitHubSource {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let base = Url::parse(config.api_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid GitHub API url '{}'", config.api_url))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("GitHub API url '{}' cannot be a base", config.api_url));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base,
            token: config.token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn sends_token_to(&self, url: &Url) -> bool {
        url.origin() == self.base.origin()
            || (url.scheme() == "https" && url.host_str() == Some(RAW_CONTENT_HOST))
    }

    async fn get(&self, url: Url, accept: &str, what: &str) -> SourceResult<Vec<u8>> {
        log::debug!("GET {url}");
        let token = self.token.as_ref().filter(|_| self.sends_token_to(&url));
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .header(USER_AGENT, AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| SourceError::Network(format!("{what}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let remaining = response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, remaining.as_deref(), &body, what);
            log::warn!("GitHub {status} for {what}: {err}");
            return Err(err);
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|err| SourceError::Network(format!("{what}: {err}")))
    }

    async fn contents(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> SourceResult<ContentsResponse> {
        let url = contents_url(&self.base, repo, path, git_ref)?;
        let bytes = self.get(url, JSON_MEDIA, &format!("{repo}:{path}")).await?;
        serde_json::from_slice(&bytes).map_err(|err| SourceError::Decode(err.to_string()))
    }
}

#[async_trait]
impl RepositorySource for GitHubSource {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn list(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> SourceResult<Listing> {
        Ok(self.contents(repo, path, git_ref).await?.into_listing())
    }

    async fn read_file(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> SourceResult<Vec<u8>> {
        match self.contents(repo, path, git_ref).await? {
            ContentsResponse::One(item) if item.kind != "dir" => match item.download_only() {
                Some(raw_url) => {
                    let url = Url::parse(raw_url).map_err(|err| SourceError::Decode(err.to_string()))?;
                    self.get(url, "application/octet-stream", &format!("{repo}:{path}"))
                        .await
                }
                None => decode_content(&item),
            },
            _ => Err(SourceError::NotFound(format!("{repo}:{path} is a directory"))),
        }
    }

    async fn search_text(
        &self,
        repo: &RepositoryRef,
        query: &str,
        scope: &SearchScope,
    ) -> SourceResult<Vec<SearchHit>> {
        let url = search_url(&self.base, repo, query, scope)?;
        let bytes = self
            .get(url, TEXT_MATCH_MEDIA, &format!("search {query:?} in {repo}"))
            .await?;
        parse_search(&bytes)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Many(Vec<ContentItem>),
    One(ContentItem),
}

impl ContentsResponse {
    fn into_listing(self) -> Listing {
        match self {
            ContentsResponse::Many(items) => {
                Listing::Directory(items.iter().map(ContentItem::to_entry).collect())
            }
            ContentsResponse::One(item) => Listing::File(item.to_entry()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

impl ContentItem {
    fn to_entry(&self) -> TreeEntry {
        if self.kind == "dir" {
            TreeEntry::directory(&self.path)
        } else {
            TreeEntry::file(&self.path, self.size)
        }
    }

    /// Files over 1 MB come back without inline content.
    fn download_only(&self) -> Option<&str> {
        let inline = self
            .content
            .as_deref()
            .is_some_and(|c| !c.is_empty())
            && self.encoding.as_deref() != Some("none");
        if inline {
            None
        } else {
            self.download_url.as_deref()
        }
    }
}

fn decode_content(item: &ContentItem) -> SourceResult<Vec<u8>> {
    let content = item.content.as_deref().unwrap_or_default();
    match item.encoding.as_deref() {
        Some("base64") => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|err| SourceError::Decode(format!("{}: {err}", item.path)))
        }
        Some("utf-8") | None => Ok(content.as_bytes().to_vec()),
        Some(other) => Err(SourceError::Decode(format!(
            "{}: unsupported encoding {other}",
            item.path
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    path: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    text_matches: Vec<TextMatch>,
}

#[derive(Debug, Deserialize)]
struct TextMatch {
    #[serde(default)]
    fragment: String,
}

fn parse_search(bytes: &[u8]) -> SourceResult<Vec<SearchHit>> {
    let response: SearchResponse =
        serde_json::from_slice(bytes).map_err(|err| SourceError::Decode(err.to_string()))?;
    Ok(response
        .items
        .into_iter()
        .map(|item| SearchHit {
            snippet: item
                .text_matches
                .into_iter()
                .map(|m| m.fragment)
                .find(|f| !f.is_empty())
                .unwrap_or_default(),
            score: item.score.unwrap_or(1.0),
            path: item.path,
        })
        .collect())
}

fn api_url(base: &Url, segments: &[&str]) -> SourceResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| SourceError::Network(format!("API url {base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn contents_url(
    base: &Url,
    repo: &RepositoryRef,
    path: &str,
    git_ref: Option<&str>,
) -> SourceResult<Url> {
    let mut segments = vec!["repos", repo.owner(), repo.name(), "contents"];
    segments.extend(path.split('/').filter(|s| !s.is_empty()));
    let mut url = api_url(base, &segments)?;
    if let Some(git_ref) = git_ref.filter(|r| !r.is_empty()) {
        url.query_pairs_mut().append_pair("ref", git_ref);
    }
    Ok(url)
}

fn search_url(
    base: &Url,
    repo: &RepositoryRef,
    query: &str,
    scope: &SearchScope,
) -> SourceResult<Url> {
    let mut q = format!("{} repo:{}", query.trim(), repo.full_name());
    if let Some(extension) = scope.extension() {
        q.push_str(&format!(" extension:{extension}"));
    }
    if let Some(path) = scope.path() {
        q.push_str(&format!(" path:{path}"));
    }
    let mut url = api_url(base, &["search", "code"])?;
    url.query_pairs_mut()
        .append_pair("q", &q)
        .append_pair("per_page", SEARCH_PER_PAGE);
    Ok(url)
}

fn classify_status(status: StatusCode, remaining: Option<&str>, body: &str, what: &str) -> SourceError {
    let detail = {
        let body = body.trim();
        let cut = body.char_indices().nth(ERROR_BODY_CHARS).map_or(body.len(), |(i, _)| i);
        format!("{what} (HTTP {}): {}", status.as_u16(), &body[..cut])
    };
    match status.as_u16() {
        404 => SourceError::NotFound(what.to_string()),
        // Code search answers 422 for repositories it cannot see.
        422 => SourceError::NotFound(detail),
        401 => SourceError::Unauthorized(detail),
        429 => SourceError::RateLimited(detail),
        403 if remaining == Some("0") || body.to_ascii_lowercase().contains("rate limit") => {
            SourceError::RateLimited(detail)
        }
        403 => SourceError::Unauthorized(detail),
        _ => SourceError::Network(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navigator_resolver::EntryKind;
    use pretty_assertions::assert_eq;

    fn base() -> Url {
        Url::parse(DEFAULT_API_URL).unwrap()
    }

    fn repo() -> RepositoryRef {
        "hutool/hutool".parse().unwrap()
    }

    #[test]
    fn contents_url_encodes_path_and_ref() {
        let url = contents_url(&base(), &repo(), "src/main/My File.java", Some("v5.8")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/hutool/hutool/contents/src/main/My%20File.java?ref=v5.8"
        );
        let root = contents_url(&base(), &repo(), "", None).unwrap();
        assert_eq!(root.as_str(), "https://api.github.com/repos/hutool/hutool/contents");
    }

    #[test]
    fn search_url_scopes_to_repository() {
        let url = search_url(&base(), &repo(), "class StrUtil", &SearchScope::default()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "class StrUtil repo:hutool/hutool".to_string()),
                ("per_page".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn search_url_appends_scope_qualifiers() {
        let scope = SearchScope::new(Some(".java"), Some("hutool-core/src"));
        let url = search_url(&base(), &repo(), "isBlank", &scope).unwrap();
        let q = url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(
            q,
            "isBlank repo:hutool/hutool extension:java path:hutool-core/src"
        );
    }

    #[test]
    fn token_only_goes_to_github_origins() {
        let source = GitHubSource::new(GitHubConfig {
            token: Some("ghp_x".to_string()),
            ..GitHubConfig::default()
        })
        .unwrap();
        let url = |raw: &str| Url::parse(raw).unwrap();
        assert!(source.sends_token_to(&url("https://api.github.com/repos/o/r/contents")));
        assert!(source.sends_token_to(&url("https://raw.githubusercontent.com/o/r/main/big.bin")));
        assert!(!source.sends_token_to(&url("http://raw.githubusercontent.com/o/r/main/big.bin")));
        assert!(!source.sends_token_to(&url("https://api.github.com.evil.example/repos")));
        assert!(!source.sends_token_to(&url("https://attacker.example/big.bin")));

        let enterprise = GitHubSource::new(GitHubConfig {
            api_url: "https://ghe.example.com/api/v3".to_string(),
            token: Some("ghp_x".to_string()),
            ..GitHubConfig::default()
        })
        .unwrap();
        assert!(enterprise.sends_token_to(&url("https://ghe.example.com/raw/o/r/main/a")));
        assert!(!enterprise.sends_token_to(&url("https://api.github.com/repos")));
    }

    #[test]
    fn enterprise_base_keeps_its_prefix() {
        let base = Url::parse("https://ghe.example.com/api/v3").unwrap();
        let url = contents_url(&base, &repo(), "a", None).unwrap();
        assert_eq!(url.path(), "/api/v3/repos/hutool/hutool/contents/a");
    }

    #[test]
    fn parses_directory_and_file_listings() {
        let dir: ContentsResponse = serde_json::from_str(
            r#"[{"name":"src","path":"src","type":"dir","size":0},
                {"name":"pom.xml","path":"pom.xml","type":"file","size":42}]"#,
        )
        .unwrap();
        let listing = dir.into_listing();
        assert!(listing.is_directory());
        assert_eq!(listing.entries()[0].kind, EntryKind::Directory);
        assert_eq!(listing.entries()[1].size, Some(42));

        let file: ContentsResponse = serde_json::from_str(
            r#"{"name":"pom.xml","path":"pom.xml","type":"file","size":42,"content":"","encoding":"base64"}"#,
        )
        .unwrap();
        assert!(matches!(file.into_listing(), Listing::File(ref e) if e.name == "pom.xml"));
    }

    #[test]
    fn decodes_wrapped_base64() {
        let item = ContentItem {
            path: "a.txt".to_string(),
            kind: "file".to_string(),
            size: Some(11),
            content: Some("aGVsbG8g\nd29ybGQ=\n".to_string()),
            encoding: Some("base64".to_string()),
            download_url: None,
        };
        assert_eq!(item.download_only(), None);
        assert_eq!(decode_content(&item).unwrap(), b"hello world".to_vec());
    }

    #[test]
    fn large_files_use_download_url() {
        let item = ContentItem {
            path: "big.bin".to_string(),
            kind: "file".to_string(),
            size: Some(5_000_000),
            content: Some(String::new()),
            encoding: Some("none".to_string()),
            download_url: Some("https://raw.example.com/big.bin".to_string()),
        };
        assert_eq!(item.download_only(), Some("https://raw.example.com/big.bin"));
    }

    #[test]
    fn search_uses_first_fragment() {
        let hits = parse_search(
            br#"{"total_count":1,"items":[{"path":"A.java","score":3.5,
                "text_matches":[{"fragment":""},{"fragment":"public class A {"}]},
                {"path":"B.java"}]}"#,
        )
        .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "public class A {");
        assert_eq!(hits[0].score, 3.5);
        assert_eq!(hits[1].snippet, "");
        assert_eq!(hits[1].score, 1.0);
    }

    #[test]
    fn status_mapping() {
        let code = |status: u16, remaining: Option<&str>, body: &str| {
            classify_status(StatusCode::from_u16(status).unwrap(), remaining, body, "x").code()
        };
        assert_eq!(code(404, None, ""), "not_found");
        assert_eq!(code(422, None, "Validation Failed"), "not_found");
        assert_eq!(code(401, None, "Bad credentials"), "unauthorized");
        assert_eq!(code(403, Some("0"), ""), "rate_limited");
        assert_eq!(code(403, Some("12"), "API rate limit exceeded"), "rate_limited");
        assert_eq!(code(403, Some("12"), "Resource not accessible"), "unauthorized");
        assert_eq!(code(429, None, ""), "rate_limited");
        assert_eq!(code(502, None, "bad gateway"), "network");
    }

    #[test]
    fn config_reads_lookup() {
        let config = GitHubConfig::from_lookup(|key| match key {
            TOKEN_ENV => Some(" ghp_x ".to_string()),
            API_URL_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.token.as_deref(), Some("ghp_x"));
        assert_eq!(config.api_url, DEFAULT_API_URL);

        let source = GitHubSource::new(config).unwrap();
        assert!(source.has_token());
        assert!(GitHubSource::new(GitHubConfig {
            api_url: "not a url".to_string(),
            ..GitHubConfig::default()
        })
        .is_err());
    }
}
