use crate::command::domain::{Hint, HintKind, RequestOptions};
use anyhow::{Context as AnyhowContext, Result};
use navigator_github::{GitHubConfig, GitHubSource};
use navigator_resolver::{
    InMemorySource, Navigator, PathFilters, RepositorySource, ResolveError, ResolverProfile,
};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

pub const SOURCE_ENV: &str = "NAVIGATOR_SOURCE";
pub const FIXTURE_ENV: &str = "NAVIGATOR_FIXTURE";
pub const PROFILE_ENV: &str = "NAVIGATOR_PROFILE";

const BUILTIN_PROFILE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Github,
    Fixture,
}

impl SourceKind {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(SourceKind::Github),
            "fixture" => Ok(SourceKind::Fixture),
            other => Err(ResolveError::InvalidRequest(format!(
                "unknown source '{other}' (expected github or fixture)"
            ))
            .into()),
        }
    }
}

/// The `config` object of a request. Unset fields fall back to the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    #[serde(default)]
    pub source: Option<SourceKind>,
    #[serde(default)]
    pub fixture: Option<PathBuf>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

/// Who sent the request. Remote callers may not point the server at other
/// hosts or files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTrust {
    Local,
    Remote,
}

pub struct CommandContext {
    request_config: Option<Value>,
    request_options: Option<RequestOptions>,
    trust: ConfigTrust,
}

/// Everything an action needs: a wired navigator and where it came from.
pub struct ResolvedContext {
    pub navigator: Navigator,
    pub source_name: String,
    pub profile_name: String,
    pub profile_path: Option<String>,
    pub hints: Vec<Hint>,
}

impl CommandContext {
    pub fn new(config: Option<Value>, options: Option<RequestOptions>) -> Self {
        Self::with_trust(config, options, ConfigTrust::Local)
    }

    pub fn with_trust(
        config: Option<Value>,
        options: Option<RequestOptions>,
        trust: ConfigTrust,
    ) -> Self {
        Self {
            request_config: config.filter(|v| !v.is_null()),
            request_options: options,
            trust,
        }
    }

    pub fn request_options(&self) -> RequestOptions {
        self.request_options.clone().unwrap_or_default()
    }

    pub fn path_filters(&self) -> PathFilters {
        let options = self.request_options();
        PathFilters::new(
            &options.include_paths,
            &options.exclude_paths,
            options.file_pattern.as_deref(),
        )
    }

    fn request_config(&self) -> Result<RequestConfig> {
        let config: RequestConfig = match &self.request_config {
            Some(raw) => serde_json::from_value(raw.clone()).context("Invalid request config")?,
            None => RequestConfig::default(),
        };
        if self.trust == ConfigTrust::Remote {
            let rejected = [
                ("api_url", config.api_url.is_some()),
                ("fixture", config.fixture.is_some()),
                ("profile", config.profile.is_some()),
            ];
            if let Some((field, _)) = rejected.iter().find(|(_, set)| *set) {
                return Err(ResolveError::InvalidRequest(format!(
                    "config.{field} is not accepted over HTTP; configure it on the server"
                ))
                .into());
            }
        }
        Ok(config)
    }

    pub fn resolve(&self) -> Result<ResolvedContext> {
        self.resolve_with(GitHubConfig::from_env())
    }

    /// `github` carries the server's own GitHub settings (env or flags).
    fn resolve_with(&self, github: GitHubConfig) -> Result<ResolvedContext> {
        let config = self.request_config()?;
        let mut hints = Vec::new();

        let (profile, profile_path) = load_profile(config.profile.as_deref())?;
        let overrides = self.request_options().limits;
        let profile = if overrides.is_empty() {
            profile
        } else {
            let limits = overrides.apply(*profile.limits());
            limits.validate()?;
            hints.push(Hint::new(
                HintKind::Info,
                "Request limits override the profile defaults.",
            ));
            profile.with_limits(limits)
        };

        let source = build_source(&config, github, &mut hints)?;
        let source_name = source.name().to_string();
        let profile_name = profile.name().to_string();

        Ok(ResolvedContext {
            navigator: Navigator::new(source, profile),
            source_name,
            profile_name,
            profile_path,
            hints,
        })
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn load_profile(requested: Option<&str>) -> Result<(ResolverProfile, Option<String>)> {
    let requested = requested
        .map(str::to_string)
        .or_else(|| env_value(PROFILE_ENV));
    match requested.as_deref() {
        None | Some(BUILTIN_PROFILE) => Ok((ResolverProfile::builtin()?, None)),
        Some(path) => {
            let path = PathBuf::from(path);
            let profile = ResolverProfile::from_file(&path)
                .map_err(|err| ResolveError::Profile(format!("{err:#}")))?;
            Ok((profile, Some(path.display().to_string())))
        }
    }
}

fn build_source(
    config: &RequestConfig,
    mut github: GitHubConfig,
    hints: &mut Vec<Hint>,
) -> Result<Arc<dyn RepositorySource>> {
    let fixture = config
        .fixture
        .clone()
        .or_else(|| env_value(FIXTURE_ENV).map(PathBuf::from));
    let kind = match config.source {
        Some(kind) => kind,
        None => match env_value(SOURCE_ENV) {
            Some(raw) => SourceKind::parse(&raw)?,
            None if fixture.is_some() => SourceKind::Fixture,
            None => SourceKind::Github,
        },
    };

    match kind {
        SourceKind::Fixture => {
            let path = fixture.ok_or_else(|| {
                ResolveError::InvalidRequest(format!(
                    "fixture source selected but no fixture file given (set {FIXTURE_ENV})"
                ))
            })?;
            let source = InMemorySource::from_fixture_file(&path)?;
            log::debug!("Using fixture source {}", path.display());
            Ok(Arc::new(source))
        }
        SourceKind::Github => {
            if let Some(api_url) = &config.api_url {
                // The server's token only ever goes to the host it was configured for.
                if !same_api_url(api_url, &github.api_url) && github.token.take().is_some() {
                    hints.push(Hint::new(
                        HintKind::Warn,
                        format!("GITHUB_TOKEN is not sent to the request api_url {api_url}."),
                    ));
                }
                github.api_url = api_url.clone();
            }
            let source = GitHubSource::new(github)?;
            if !source.has_token() {
                hints.push(Hint::new(
                    HintKind::Warn,
                    "No GITHUB_TOKEN set; unauthenticated requests have a low rate limit.",
                ));
            }
            Ok(Arc::new(source))
        }
    }
}

fn same_api_url(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('/').eq_ignore_ascii_case(b.trim().trim_end_matches('/'))
}
