use crate::cancel::CancelSignal;
use crate::error::Result;
use crate::path;
use crate::probe::{PathExistenceProbe, ProbeOutcome};
use crate::profile::ResolverLimits;
use crate::similarity::{MatchKind, SimilarityRanker};
use crate::source::RepositorySource;
use crate::suggest::{next_segment, OutcomeKind, SuggestionComposer, Suggestions};
use crate::types::{Listing, RepositoryRef};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Walk bookkeeping owned by a single `explore` call.
///
/// `history` holds every probed path in order, so once the walk has begun
/// `fallback_count() == history.len() - 1`.
#[derive(Debug, Clone)]
pub struct ExplorationState {
    visited: HashSet<String>,
    history: Vec<String>,
}

/// What the walk does after the current path came back `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Probe(String),
    Exhausted,
    CycleDetected,
}

impl ExplorationState {
    pub fn begin(path: &str) -> Self {
        let mut state = Self {
            visited: HashSet::new(),
            history: Vec::new(),
        };
        state.record(path);
        state
    }

    fn record(&mut self, path: &str) {
        self.visited.insert(path.to_string());
        self.history.push(path.to_string());
    }

    pub fn current(&self) -> &str {
        self.history.last().map(String::as_str).unwrap_or_default()
    }

    pub fn fallback_count(&self) -> usize {
        self.history.len().saturating_sub(1)
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn has_visited(&self, path: &str) -> bool {
        self.visited.contains(path)
    }

    pub fn advance(&mut self, max_fallback: usize) -> Transition {
        let current = self.current();
        if self.fallback_count() >= max_fallback {
            return Transition::Exhausted;
        }
        let Some(parent) = path::parent_of(current) else {
            return Transition::Exhausted;
        };
        if self.visited.contains(&parent) {
            return Transition::CycleDetected;
        }
        self.record(&parent);
        Transition::Probe(parent)
    }

    pub fn into_history(self) -> Vec<String> {
        self.history
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExplorationOutcome {
    Resolved { path: String, listing: Listing },
    Exhausted,
    CycleDetected,
}

impl ExplorationOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ExplorationOutcome::Resolved { .. })
    }

    pub fn resolved_path(&self) -> Option<&str> {
        match self {
            ExplorationOutcome::Resolved { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn listing(&self) -> Option<&Listing> {
        match self {
            ExplorationOutcome::Resolved { listing, .. } => Some(listing),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ExplorationOutcome::Resolved { .. } => "resolved",
            ExplorationOutcome::Exhausted => "exhausted",
            ExplorationOutcome::CycleDetected => "cycle_detected",
        }
    }
}

/// One re-descent taken after the walk resolved at an ancestor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationStep {
    pub segment: String,
    pub chosen: String,
    pub path: String,
    pub score: f64,
    pub match_kind: MatchKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplorationResult {
    pub repository: RepositoryRef,
    pub requested_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub outcome: ExplorationOutcome,
    pub history: Vec<String>,
    pub fallback_count: usize,
    pub navigation: Vec<NavigationStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

/// Bounded upward walk from a requested path to its deepest existing
/// ancestor, followed by a similarity-guided re-descent.
#[derive(Clone)]
pub struct FallbackPathExplorer {
    probe: PathExistenceProbe,
    ranker: SimilarityRanker,
    composer: SuggestionComposer,
    max_fallback: usize,
}

impl FallbackPathExplorer {
    pub fn new(source: Arc<dyn RepositorySource>, limits: &ResolverLimits) -> Self {
        let ranker = limits.ranker();
        Self {
            probe: PathExistenceProbe::new(source),
            ranker,
            composer: SuggestionComposer::new(ranker),
            max_fallback: limits.max_fallback,
        }
    }

    pub async fn explore(
        &self,
        repo: &RepositoryRef,
        target_path: &str,
        branch: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<ExplorationResult> {
        let requested = path::normalize(target_path);
        let mut state = ExplorationState::begin(&requested);

        let (outcome, navigation, suggestions) = loop {
            let current = state.current().to_string();
            match self.probe.probe(repo, &current, branch, cancel).await? {
                ProbeOutcome::Exists(listing) => {
                    let resolved = self
                        .finish_resolved(repo, &requested, current, listing, &state, branch, cancel)
                        .await?;
                    break resolved;
                }
                ProbeOutcome::NotFound => match state.advance(self.max_fallback) {
                    Transition::Probe(parent) => {
                        log::debug!("fallback {} -> {}", path::display(&current), path::display(&parent));
                    }
                    Transition::Exhausted => {
                        let suggestions = self
                            .survey(repo, &requested, &state, OutcomeKind::Exhausted, branch, cancel)
                            .await?;
                        break (ExplorationOutcome::Exhausted, Vec::new(), Some(suggestions));
                    }
                    Transition::CycleDetected => {
                        let suggestions = self
                            .survey(repo, &requested, &state, OutcomeKind::CycleDetected, branch, cancel)
                            .await?;
                        break (ExplorationOutcome::CycleDetected, Vec::new(), Some(suggestions));
                    }
                },
            }
        };

        let fallback_count = state.fallback_count();
        log::info!(
            "explore {repo}:{} -> {} after {fallback_count} fallback(s)",
            path::display(&requested),
            outcome.as_str()
        );

        Ok(ExplorationResult {
            repository: repo.clone(),
            requested_path: requested,
            branch: branch.map(str::to_string),
            outcome,
            history: state.into_history(),
            fallback_count,
            navigation,
            suggestions,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish_resolved(
        &self,
        repo: &RepositoryRef,
        requested: &str,
        mut resolved: String,
        mut listing: Listing,
        state: &ExplorationState,
        branch: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<(ExplorationOutcome, Vec<NavigationStep>, Option<Suggestions>)> {
        let mut navigation = Vec::new();

        if state.fallback_count() > 0 && listing.is_directory() {
            let segments = path::segments(requested);
            let mut seen: HashSet<String> = HashSet::new();

            while navigation.len() < self.max_fallback {
                let depth = path::segments(&resolved).len();
                // The last segment is the target itself; only directories above it are re-entered.
                if depth + 1 >= segments.len() {
                    break;
                }
                let segment = segments[depth];
                let dirs: Vec<&str> = listing
                    .entries()
                    .iter()
                    .filter(|e| e.is_directory())
                    .map(|e| e.name.as_str())
                    .collect();
                let Some(best) = self.ranker.rank(segment, dirs).into_iter().next() else {
                    break;
                };
                let next = path::join(&resolved, &best.name);
                if state.has_visited(&next) || !seen.insert(next.clone()) {
                    break;
                }

                match self.probe.probe(repo, &next, branch, cancel).await? {
                    ProbeOutcome::Exists(next_listing) if next_listing.is_directory() => {
                        log::debug!("navigate {segment} -> {next} ({:.2})", best.score);
                        navigation.push(NavigationStep {
                            segment: segment.to_string(),
                            chosen: best.name,
                            path: next.clone(),
                            score: best.score,
                            match_kind: best.kind,
                        });
                        resolved = next;
                        listing = next_listing;
                    }
                    _ => break,
                }
            }
        }

        let suggestions = if resolved != requested && listing.is_directory() {
            Some(self.composer.compose(
                repo,
                OutcomeKind::Partial,
                Some((resolved.as_str(), &listing)),
                next_segment(requested, &resolved),
            ))
        } else {
            None
        };

        Ok((
            ExplorationOutcome::Resolved {
                path: resolved,
                listing,
            },
            navigation,
            suggestions,
        ))
    }

    /// Lists the parent of the last probed path once for sibling suggestions.
    async fn survey(
        &self,
        repo: &RepositoryRef,
        requested: &str,
        state: &ExplorationState,
        outcome: OutcomeKind,
        branch: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<Suggestions> {
        let ancestor = path::parent_of(state.current()).filter(|p| !state.has_visited(p));
        let listing = match &ancestor {
            Some(ancestor) => self
                .probe
                .probe(repo, ancestor, branch, cancel)
                .await?
                .into_listing(),
            None => None,
        };

        Ok(match (ancestor.as_deref(), listing.as_ref()) {
            (Some(ancestor), Some(listing)) => self.composer.compose(
                repo,
                outcome,
                Some((ancestor, listing)),
                next_segment(requested, ancestor),
            ),
            _ => self.composer.compose(repo, outcome, None, None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn walk_stops_at_budget() {
        let mut state = ExplorationState::begin("a/b/c/d/e");
        assert_eq!(state.advance(2), Transition::Probe("a/b/c/d".to_string()));
        assert_eq!(state.advance(2), Transition::Probe("a/b/c".to_string()));
        assert_eq!(state.advance(2), Transition::Exhausted);
        assert_eq!(state.fallback_count(), 2);
        assert_eq!(state.history().len(), 3);
    }

    #[test]
    fn walk_stops_at_root() {
        let mut state = ExplorationState::begin("a");
        assert_eq!(state.advance(3), Transition::Probe(String::new()));
        assert_eq!(state.advance(3), Transition::Exhausted);
        assert_eq!(state.history(), &["a".to_string(), String::new()]);
    }

    #[test]
    fn revisiting_a_parent_is_a_cycle() {
        let mut state = ExplorationState::begin("a/b/c");
        state.visited.insert("a/b".to_string());
        assert_eq!(state.advance(3), Transition::CycleDetected);
        assert_eq!(state.fallback_count(), 0);
        assert_eq!(state.history(), &["a/b/c".to_string()]);
    }
}
