use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::path;
use crate::source::RepositorySource;
use crate::suggest::Suggestions;
use crate::types::{EntryKind, Listing, RepositoryRef, TreeEntry};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists(Listing),
    NotFound,
}

impl ProbeOutcome {
    pub fn exists(&self) -> bool {
        matches!(self, ProbeOutcome::Exists(_))
    }

    pub fn into_listing(self) -> Option<Listing> {
        match self {
            ProbeOutcome::Exists(listing) => Some(listing),
            ProbeOutcome::NotFound => None,
        }
    }
}

/// Single existence lookup against a [`RepositorySource`].
///
/// `NotFound` becomes a value; every other source failure is returned as
/// [`crate::ResolveError::Source`] untouched.
#[derive(Clone)]
pub struct PathExistenceProbe {
    source: Arc<dyn RepositorySource>,
}

impl PathExistenceProbe {
    pub fn new(source: Arc<dyn RepositorySource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn RepositorySource> {
        &self.source
    }

    pub async fn probe(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<ProbeOutcome> {
        let path = path::normalize(path);
        log::debug!("probe {repo}:{}", path::display(&path));

        match cancel.run(self.source.list(repo, &path, git_ref)).await? {
            Ok(listing) => Ok(ProbeOutcome::Exists(listing)),
            Err(err) if err.is_not_found() => Ok(ProbeOutcome::NotFound),
            Err(err) => {
                log::warn!("probe {repo}:{} failed: {err}", path::display(&path));
                Err(err.into())
            }
        }
    }
}

/// Answer to a direct existence check.
#[derive(Debug, Clone, Serialize)]
pub struct ExistenceReport {
    pub repository: RepositoryRef,
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<TreeEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

impl ExistenceReport {
    pub fn found(repository: RepositoryRef, path: String, listing: &Listing) -> Self {
        Self {
            repository,
            path,
            exists: true,
            kind: Some(listing.kind()),
            entries: listing.is_directory().then(|| listing.entries().to_vec()),
            suggestions: None,
        }
    }

    pub fn missing(repository: RepositoryRef, path: String, suggestions: Suggestions) -> Self {
        Self {
            repository,
            path,
            exists: false,
            kind: None,
            entries: None,
            suggestions: Some(suggestions),
        }
    }
}
