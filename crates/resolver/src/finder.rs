use crate::cancel::CancelSignal;
use crate::error::{ResolveError, Result};
use crate::path::PathFilters;
use crate::source::RepositorySource;
use crate::structure::StructureWalker;
use crate::types::RepositoryRef;
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32String};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMatch {
    pub path: String,
    pub name: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMatches {
    pub repository: RepositoryRef,
    pub pattern: String,
    pub scanned: usize,
    /// The structure walk hit its entry cap, so some files were never seen.
    pub truncated: bool,
    pub matches: Vec<FileMatch>,
}

/// Fuzzy file lookup over a bounded structure walk.
#[derive(Clone)]
pub struct FileFinder {
    walker: StructureWalker,
    max_depth: usize,
    limit: usize,
}

impl FileFinder {
    pub fn new(
        source: Arc<dyn RepositorySource>,
        max_depth: usize,
        max_entries: usize,
        limit: usize,
    ) -> Self {
        Self {
            walker: StructureWalker::new(source, max_entries),
            max_depth,
            limit,
        }
    }

    pub async fn find(
        &self,
        repo: &RepositoryRef,
        pattern: &str,
        branch: Option<&str>,
        filters: &PathFilters,
        cancel: &CancelSignal,
    ) -> Result<FileMatches> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(ResolveError::InvalidRequest("pattern must not be empty".to_string()));
        }

        let tree = self.walker.walk(repo, "", branch, self.max_depth, cancel).await?;
        let files: Vec<_> = tree
            .files()
            .into_iter()
            .filter(|f| filters.allows(&f.path))
            .collect();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

        let matches = fuzzy_rank(pattern, &paths, self.limit)
            .into_iter()
            .map(|(idx, score)| FileMatch {
                path: files[idx].path.clone(),
                name: files[idx].name.clone(),
                score,
            })
            .collect::<Vec<_>>();

        log::info!("find {pattern:?} in {repo}: {} of {} file(s)", matches.len(), files.len());
        Ok(FileMatches {
            repository: repo.clone(),
            pattern: pattern.to_string(),
            scanned: files.len(),
            truncated: tree.truncated,
            matches,
        })
    }
}

/// `(index, score)` pairs, best first, scores normalised to the best hit.
pub fn fuzzy_rank(pattern: &str, paths: &[&str], limit: usize) -> Vec<(usize, f32)> {
    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::parse(pattern, CaseMatching::Smart, Normalization::Smart);

    let mut scored: Vec<(usize, u32)> = paths
        .iter()
        .enumerate()
        .filter_map(|(idx, path)| {
            let haystack = Utf32String::from(*path);
            pattern
                .score(haystack.slice(..), &mut matcher)
                .map(|score| (idx, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(limit);

    let max_score = scored.first().map(|(_, s)| *s as f32).unwrap_or(1.0);
    scored
        .into_iter()
        .map(|(idx, score)| {
            let normalized = if max_score > 0.0 {
                score as f32 / max_score
            } else {
                0.0
            };
            (idx, normalized)
        })
        .collect()
}
