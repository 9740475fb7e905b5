use crate::cancel::CancelSignal;
use crate::error::{ResolveError, Result, SourceError};
use crate::explorer::{ExplorationResult, FallbackPathExplorer};
use crate::finder::{FileFinder, FileMatches};
use crate::mapping::{DependencyList, MappedDependency, PackageMapping};
use crate::method::{MethodTrace, MethodTracer};
use crate::path::{self, PathFilters};
use crate::probe::{ExistenceReport, PathExistenceProbe, ProbeOutcome};
use crate::profile::ResolverProfile;
use crate::source::RepositorySource;
use crate::structure::{RepoStructure, StructureWalker};
use crate::suggest::{next_segment, OutcomeKind, SuggestionComposer};
use crate::tracer::{ChainResult, ChainTracer};
use crate::types::{FileContent, Listing, RepositoryRef, SearchHit, SearchScope};
use navigator_protocol::truncate_chars;
use std::sync::Arc;

/// Every resolver operation wired to one source and one profile.
#[derive(Clone)]
pub struct Navigator {
    source: Arc<dyn RepositorySource>,
    profile: Arc<ResolverProfile>,
    probe: PathExistenceProbe,
    composer: SuggestionComposer,
    explorer: FallbackPathExplorer,
    tracer: ChainTracer,
    methods: MethodTracer,
    walker: StructureWalker,
    finder: FileFinder,
}

impl Navigator {
    pub fn new(source: Arc<dyn RepositorySource>, profile: ResolverProfile) -> Self {
        let limits = *profile.limits();
        let mapping: Arc<PackageMapping> = Arc::new(profile.package_mapping().clone());
        Self {
            probe: PathExistenceProbe::new(source.clone()),
            composer: SuggestionComposer::new(limits.ranker()),
            explorer: FallbackPathExplorer::new(source.clone(), &limits),
            tracer: ChainTracer::new(
                source.clone(),
                mapping.clone(),
                profile.definition_queries(),
                &limits,
            ),
            methods: MethodTracer::new(source.clone(), mapping),
            walker: StructureWalker::new(source.clone(), limits.structure_max_entries),
            finder: FileFinder::new(
                source.clone(),
                limits.finder_max_depth,
                limits.structure_max_entries,
                limits.finder_limit,
            ),
            source,
            profile: Arc::new(profile),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn profile(&self) -> &ResolverProfile {
        &self.profile
    }

    pub async fn explore(
        &self,
        repo: &RepositoryRef,
        target_path: &str,
        branch: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<ExplorationResult> {
        self.explorer.explore(repo, target_path, branch, cancel).await
    }

    pub async fn trace(
        &self,
        repo: &RepositoryRef,
        entity: &str,
        cancel: &CancelSignal,
    ) -> Result<ChainResult> {
        self.tracer.trace(repo, entity, cancel).await
    }

    /// Existence check; a miss also lists the parent once for suggestions.
    pub async fn check_exists(
        &self,
        repo: &RepositoryRef,
        target_path: &str,
        branch: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<ExistenceReport> {
        let target = path::normalize(target_path);
        if let ProbeOutcome::Exists(listing) = self.probe.probe(repo, &target, branch, cancel).await? {
            return Ok(ExistenceReport::found(repo.clone(), target, &listing));
        }

        let parent = path::parent_of(&target);
        let parent_listing = match &parent {
            Some(parent) => self.probe.probe(repo, parent, branch, cancel).await?.into_listing(),
            None => None,
        };
        let suggestions = match (parent.as_deref(), parent_listing.as_ref()) {
            (Some(parent), Some(listing)) => self.composer.compose(
                repo,
                OutcomeKind::NotFound,
                Some((parent, listing)),
                next_segment(&target, parent),
            ),
            _ => self.composer.compose(repo, OutcomeKind::NotFound, None, None),
        };
        Ok(ExistenceReport::missing(repo.clone(), target, suggestions))
    }

    /// Plain listing; a missing path is an error here, not a value.
    pub async fn list_directory(
        &self,
        repo: &RepositoryRef,
        dir: &str,
        branch: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<Listing> {
        let dir = path::normalize(dir);
        let listing = cancel.run(self.source.list(repo, &dir, branch)).await??;
        Ok(listing)
    }

    pub async fn structure(
        &self,
        repo: &RepositoryRef,
        root: &str,
        branch: Option<&str>,
        max_depth: Option<usize>,
        cancel: &CancelSignal,
    ) -> Result<RepoStructure> {
        let max_depth = max_depth.unwrap_or(self.profile.limits().structure_max_depth);
        self.walker.walk(repo, root, branch, max_depth, cancel).await
    }

    pub async fn find_files(
        &self,
        repo: &RepositoryRef,
        pattern: &str,
        branch: Option<&str>,
        filters: &PathFilters,
        cancel: &CancelSignal,
    ) -> Result<FileMatches> {
        self.finder.find(repo, pattern, branch, filters, cancel).await
    }

    /// Decoded file text, cut to the profile's read budget.
    pub async fn read_file(
        &self,
        repo: &RepositoryRef,
        file_path: &str,
        branch: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<FileContent> {
        let target = path::normalize(file_path);
        if path::is_root(&target) {
            return Err(ResolveError::InvalidRequest(
                "path must name a file, not the repository root".to_string(),
            ));
        }
        let bytes = cancel.run(self.source.read_file(repo, &target, branch)).await??;
        let size = bytes.len() as u64;
        let text = String::from_utf8(bytes)
            .map_err(|_| SourceError::Decode(format!("{repo}:{target} is not UTF-8 text")))?;
        let (content, truncated) = truncate_chars(&text, self.profile.limits().read_max_chars);
        Ok(FileContent {
            repository: repo.clone(),
            name: path::file_name(&target).to_string(),
            path: target,
            size,
            content,
            truncated,
            branch: branch.map(str::to_string),
        })
    }

    /// Text search with snippets cut to the profile's snippet budget.
    pub async fn search_code(
        &self,
        repo: &RepositoryRef,
        query: &str,
        scope: &SearchScope,
        limit: Option<usize>,
        cancel: &CancelSignal,
    ) -> Result<Vec<SearchHit>> {
        let max_chars = self.profile.limits().snippet_max_chars;
        let limit = limit.unwrap_or(self.profile.limits().finder_limit);
        let hits = cancel.run(self.source.search_text(repo, query, scope)).await??;
        Ok(hits
            .into_iter()
            .filter(|hit| scope.allows(&hit.path))
            .take(limit)
            .map(|hit| SearchHit {
                snippet: truncate_chars(&hit.snippet, max_chars).0,
                ..hit
            })
            .collect())
    }

    pub async fn trace_method(
        &self,
        repo: &RepositoryRef,
        signature: &str,
        cancel: &CancelSignal,
    ) -> Result<MethodTrace> {
        self.methods.trace(repo, signature, cancel).await
    }

    pub fn map_dependencies(&self, list: &DependencyList) -> Vec<MappedDependency> {
        self.profile.package_mapping().map_dependencies(list)
    }
}
