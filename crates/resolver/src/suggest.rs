use crate::path;
use crate::similarity::{MatchKind, SimilarityRanker};
use crate::types::{EntryKind, Listing, RepositoryRef};
use navigator_protocol::ToolNextAction;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    NotFound,
    Exhausted,
    CycleDetected,
    /// Resolved at a directory that is not the requested path.
    Partial,
}

impl OutcomeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::NotFound => "not_found",
            OutcomeKind::Exhausted => "exhausted",
            OutcomeKind::CycleDetected => "cycle_detected",
            OutcomeKind::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedPath {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub score: f64,
    pub match_kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestions {
    pub outcome: OutcomeKind,
    /// Deepest ancestor known to exist, `None` when not even the survey found one.
    pub existing_ancestor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_segment: Option<String>,
    pub candidates: Vec<SuggestedPath>,
    pub next_steps: Vec<ToolNextAction>,
}

struct StepReasons {
    list: &'static str,
    structure: &'static str,
    search: &'static str,
}

const fn reasons(kind: OutcomeKind) -> StepReasons {
    match kind {
        OutcomeKind::NotFound => StepReasons {
            list: "List the parent directory to see what exists there",
            structure: "Fetch the repository structure to locate the path",
            search: "Search the repository for the missing name",
        },
        OutcomeKind::Exhausted => StepReasons {
            list: "List the deepest existing ancestor",
            structure: "Fallback budget exhausted; fetch the repository structure instead",
            search: "Search the repository for the requested name",
        },
        OutcomeKind::CycleDetected => StepReasons {
            list: "List the ancestor reached before the walk repeated itself",
            structure: "Fetch the repository structure to break out of the cycle",
            search: "Search the repository for the requested name",
        },
        OutcomeKind::Partial => StepReasons {
            list: "List the directory the walk resolved to",
            structure: "Fetch the structure below the resolved directory",
            search: "Search the repository for the remaining name",
        },
    }
}

/// Builds ranked, structured suggestions from a listing. Pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuggestionComposer {
    ranker: SimilarityRanker,
}

impl SuggestionComposer {
    pub fn new(ranker: SimilarityRanker) -> Self {
        Self { ranker }
    }

    pub fn compose(
        &self,
        repo: &RepositoryRef,
        outcome: OutcomeKind,
        ancestor: Option<(&str, &Listing)>,
        segment: Option<&str>,
    ) -> Suggestions {
        let candidates = match (ancestor, segment) {
            (Some((_, listing)), Some(segment)) => {
                let entries = listing.entries();
                self.ranker
                    .rank(segment, entries.iter().map(|e| e.name.as_str()))
                    .into_iter()
                    .map(|c| {
                        let entry = &entries[c.index];
                        SuggestedPath {
                            name: c.name,
                            path: entry.path.clone(),
                            kind: entry.kind,
                            score: c.score,
                            match_kind: c.kind,
                        }
                    })
                    .collect()
            }
            _ => Vec::new(),
        };

        let existing_ancestor = ancestor.map(|(p, _)| p.to_string());
        Suggestions {
            outcome,
            next_steps: next_steps(repo, outcome, existing_ancestor.as_deref(), segment),
            existing_ancestor,
            target_segment: segment.map(str::to_string),
            candidates,
        }
    }
}

fn next_steps(
    repo: &RepositoryRef,
    outcome: OutcomeKind,
    ancestor: Option<&str>,
    segment: Option<&str>,
) -> Vec<ToolNextAction> {
    let reasons = reasons(outcome);
    let repo = repo.full_name();
    let mut steps = Vec::with_capacity(3);

    if let Some(ancestor) = ancestor {
        steps.push(ToolNextAction {
            tool: "list_directory".to_string(),
            args: json!({ "repo": repo, "path": ancestor }),
            reason: reasons.list.to_string(),
        });
    }
    let structure_root = match outcome {
        OutcomeKind::Partial => ancestor.unwrap_or_default(),
        _ => "",
    };
    steps.push(ToolNextAction {
        tool: "structure".to_string(),
        args: json!({ "repo": repo, "path": structure_root }),
        reason: reasons.structure.to_string(),
    });
    if let Some(segment) = segment {
        let query = segment.split('.').next().unwrap_or(segment);
        steps.push(ToolNextAction {
            tool: "search_code".to_string(),
            args: json!({ "repo": repo, "query": query }),
            reason: reasons.search.to_string(),
        });
    }
    steps
}

/// Segment of `requested` right below `ancestor` (by position).
pub fn next_segment<'a>(requested: &'a str, ancestor: &str) -> Option<&'a str> {
    let depth = path::segments(ancestor).len();
    path::segments(requested).get(depth).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TreeEntry;
    use pretty_assertions::assert_eq;

    fn repo() -> RepositoryRef {
        "o/r".parse().unwrap()
    }

    #[test]
    fn ranks_listing_against_segment() {
        let listing = Listing::Directory(vec![
            TreeEntry::file("src/filters/AuthFilters.java", None),
            TreeEntry::file("src/filters/AuthFilter.java", None),
            TreeEntry::file("src/filters/Other.txt", None),
        ]);
        let out = SuggestionComposer::default().compose(
            &repo(),
            OutcomeKind::Partial,
            Some(("src/filters", &listing)),
            Some("AuthFilter.java"),
        );

        let names: Vec<_> = out.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["AuthFilter.java", "AuthFilters.java"]);
        assert_eq!(out.candidates[0].path, "src/filters/AuthFilter.java");
        assert_eq!(out.existing_ancestor.as_deref(), Some("src/filters"));
        let tools: Vec<_> = out.next_steps.iter().map(|s| s.tool.as_str()).collect();
        assert_eq!(tools, vec!["list_directory", "structure", "search_code"]);
        assert_eq!(out.next_steps[2].args["query"], "AuthFilter");
    }

    #[test]
    fn missing_ancestor_still_offers_structure() {
        let out = SuggestionComposer::default().compose(&repo(), OutcomeKind::Exhausted, None, None);
        assert!(out.candidates.is_empty());
        assert_eq!(out.existing_ancestor, None);
        assert_eq!(out.next_steps.len(), 1);
        assert_eq!(out.next_steps[0].tool, "structure");
    }

    #[test]
    fn hints_are_keyed_by_outcome() {
        let listing = Listing::Directory(Vec::new());
        let composer = SuggestionComposer::default();
        let a = composer.compose(&repo(), OutcomeKind::Exhausted, Some(("", &listing)), Some("a"));
        let b = composer.compose(&repo(), OutcomeKind::CycleDetected, Some(("", &listing)), Some("a"));
        assert_ne!(a.next_steps[1].reason, b.next_steps[1].reason);
        assert_eq!(a.next_steps[0].args, b.next_steps[0].args);
    }

    #[test]
    fn next_segment_is_positional() {
        assert_eq!(next_segment("src/filter/A.java", "src/filters"), Some("A.java"));
        assert_eq!(next_segment("a/b/c/d", ""), Some("a"));
        assert_eq!(next_segment("a", "a"), None);
    }
}
