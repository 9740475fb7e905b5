use crate::cancel::CancelSignal;
use crate::error::{ResolveError, Result};
use crate::imports::{parse_imports, ImportDecl};
use crate::mapping::PackageMapping;
use crate::profile::{ResolverLimits, NAME_PLACEHOLDER};
use crate::source::RepositorySource;
use crate::types::{RepositoryRef, SearchHit, SearchScope};
use navigator_protocol::truncate_chars;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// One resolved hop of a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainNode {
    pub repository: RepositoryRef,
    pub entity_name: String,
    pub depth: usize,
    pub definition_location: Option<String>,
    pub snippet: Option<String>,
    /// Import followed to reach the next hop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_import: Option<String>,
}

/// Why the chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStop {
    NoDefinition,
    NoUpstream,
    CycleDetected,
    DepthLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainResult {
    pub repository: RepositoryRef,
    pub entity_name: String,
    pub nodes: Vec<ChainNode>,
    /// Set only when the depth bound ended the walk.
    pub truncated: bool,
    pub stop: ChainStop,
    pub visited: usize,
}

struct Hop {
    repo: RepositoryRef,
    entity: String,
}

/// Follows an entity's definition into upstream repositories, one import at a time.
#[derive(Clone)]
pub struct ChainTracer {
    source: Arc<dyn RepositorySource>,
    mapping: Arc<PackageMapping>,
    definition_queries: Arc<[String]>,
    max_depth: usize,
    snippet_max_chars: usize,
}

impl ChainTracer {
    pub fn new(
        source: Arc<dyn RepositorySource>,
        mapping: Arc<PackageMapping>,
        definition_queries: &[String],
        limits: &ResolverLimits,
    ) -> Self {
        Self {
            source,
            mapping,
            definition_queries: definition_queries.into(),
            max_depth: limits.max_depth,
            snippet_max_chars: limits.snippet_max_chars,
        }
    }

    pub async fn trace(
        &self,
        repo: &RepositoryRef,
        entity: &str,
        cancel: &CancelSignal,
    ) -> Result<ChainResult> {
        let entity = entity.trim();
        if entity.is_empty() {
            return Err(ResolveError::InvalidRequest(
                "entity name must not be empty".to_string(),
            ));
        }
        let mut visited: HashSet<(RepositoryRef, String)> = HashSet::new();
        let mut nodes: Vec<ChainNode> = Vec::new();
        let mut hop = Hop {
            repo: repo.clone(),
            entity: entity.to_string(),
        };
        let mut depth = 1;

        let stop = loop {
            if depth > self.max_depth {
                break ChainStop::DepthLimit;
            }
            if !visited.insert((hop.repo.clone(), hop.entity.clone())) {
                break ChainStop::CycleDetected;
            }

            log::debug!("trace hop {depth}: {} in {}", hop.entity, hop.repo);
            let Some(hit) = self.find_definition(&hop.repo, &hop.entity, cancel).await? else {
                break ChainStop::NoDefinition;
            };
            let content = self.read_source(&hop.repo, &hit.path, cancel).await?;
            let text = content.as_deref().unwrap_or(&hit.snippet);
            let (snippet, _) = truncate_chars(text, self.snippet_max_chars);
            let next = self.next_hop(text);

            nodes.push(ChainNode {
                repository: hop.repo.clone(),
                entity_name: hop.entity.clone(),
                depth,
                definition_location: Some(hit.path),
                snippet: Some(snippet),
                next_import: next.as_ref().map(|(decl, _)| decl.path.clone()),
            });

            match next {
                Some((decl, upstream)) => {
                    hop = Hop {
                        repo: upstream,
                        entity: decl.simple_name().to_string(),
                    };
                    depth += 1;
                }
                None => break ChainStop::NoUpstream,
            }
        };

        log::info!(
            "trace {entity} in {repo}: {} node(s), stop {stop:?}",
            nodes.len()
        );
        Ok(ChainResult {
            repository: repo.clone(),
            entity_name: entity.to_string(),
            nodes,
            truncated: stop == ChainStop::DepthLimit,
            stop,
            visited: visited.len(),
        })
    }

    /// First hit of the first query template that yields any.
    async fn find_definition(
        &self,
        repo: &RepositoryRef,
        entity: &str,
        cancel: &CancelSignal,
    ) -> Result<Option<SearchHit>> {
        let scope = SearchScope::default();
        for template in self.definition_queries.iter() {
            let query = template.replace(NAME_PLACEHOLDER, entity);
            let hits = match cancel.run(self.source.search_text(repo, &query, &scope)).await? {
                Ok(hits) => hits,
                Err(err) if err.is_not_found() => Vec::new(),
                Err(err) => return Err(err.into()),
            };
            if let Some(hit) = hits.into_iter().next() {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    async fn read_source(
        &self,
        repo: &RepositoryRef,
        path: &str,
        cancel: &CancelSignal,
    ) -> Result<Option<String>> {
        match cancel.run(self.source.read_file(repo, path, None)).await? {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// First single-type import that maps to a known repository.
    fn next_hop(&self, text: &str) -> Option<(ImportDecl, RepositoryRef)> {
        parse_imports(text)
            .into_iter()
            .filter(ImportDecl::is_type_import)
            .find_map(|decl| {
                let repo = self.mapping.resolve(&decl.path)?.1.clone();
                Some((decl, repo))
            })
    }
}
