use navigator_resolver::{
    CancelSignal, ExplorationOutcome, FallbackPathExplorer, InMemorySource, Listing, MatchKind,
    OutcomeKind, RepositoryRef, RepositorySource, ResolveError, ResolverLimits, SourceError,
    SourceOp,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn repo() -> RepositoryRef {
    "acme/web".parse().unwrap()
}

fn plural_dir_source() -> InMemorySource {
    InMemorySource::new()
        .with_file(&repo(), "src/filters/AuthFilter.java", "public class AuthFilter {}")
        .with_file(&repo(), "src/filters/AuthFilters.java", "public class AuthFilters {}")
        .with_file(&repo(), "src/Main.java", "public class Main {}")
        .with_file(&repo(), "pom.xml", "<project/>")
}

fn explorer(source: &Arc<InMemorySource>) -> FallbackPathExplorer {
    FallbackPathExplorer::new(source.clone(), &ResolverLimits::default())
}

fn assert_no_repeats(paths: &[String]) {
    let unique: HashSet<_> = paths.iter().collect();
    assert_eq!(unique.len(), paths.len(), "repeated probe in {paths:?}");
}

#[tokio::test]
async fn plural_directory_is_found_after_two_parent_transitions() {
    let source = Arc::new(plural_dir_source());
    let result = explorer(&source)
        .explore(&repo(), "src/filter/AuthFilter.java", None, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(result.outcome.resolved_path(), Some("src/filters"));
    assert_eq!(
        result.history,
        vec!["src/filter/AuthFilter.java", "src/filter", "src"]
    );
    // Two parent transitions (`src/filter`, then `src`) happen before the
    // re-descent into `src/filters`; the re-descent itself is not counted.
    assert_eq!(result.fallback_count, 2);
    assert_eq!(result.fallback_count, result.history.len() - 1);

    assert_eq!(result.navigation.len(), 1);
    assert_eq!(result.navigation[0].segment, "filter");
    assert_eq!(result.navigation[0].chosen, "filters");
    assert_eq!(result.navigation[0].match_kind, MatchKind::Containment);

    let suggestions = result.suggestions.expect("partial resolution carries suggestions");
    assert_eq!(suggestions.outcome, OutcomeKind::Partial);
    let ranked: Vec<_> = suggestions
        .candidates
        .iter()
        .map(|c| (c.name.as_str(), c.score))
        .collect();
    assert_eq!(
        ranked,
        vec![("AuthFilter.java", 1.0), ("AuthFilters.java", 0.85)]
    );
    assert_eq!(suggestions.candidates[0].path, "src/filters/AuthFilter.java");
    assert_no_repeats(&source.listed_paths());
}

#[tokio::test]
async fn missing_chain_exhausts_after_three_fallbacks() {
    let source = Arc::new(
        InMemorySource::new()
            .with_file(&repo(), "ab/readme.md", "x")
            .with_file(&repo(), "zz.txt", "y"),
    );
    let result = explorer(&source)
        .explore(&repo(), "a/b/c/d", None, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(result.outcome, ExplorationOutcome::Exhausted);
    assert_eq!(result.history, vec!["a/b/c/d", "a/b/c", "a/b", "a"]);
    assert_eq!(result.fallback_count, 3);

    // The root survey is one extra listing, outside the history.
    assert_eq!(source.listed_paths(), vec!["a/b/c/d", "a/b/c", "a/b", "a", ""]);
    let suggestions = result.suggestions.unwrap();
    assert_eq!(suggestions.outcome, OutcomeKind::Exhausted);
    assert_eq!(suggestions.existing_ancestor.as_deref(), Some(""));
    assert_eq!(suggestions.target_segment.as_deref(), Some("a"));
    let names: Vec<_> = suggestions.candidates.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["ab"]);
}

#[tokio::test]
async fn walk_ends_at_root_of_unknown_repository() {
    let source = Arc::new(InMemorySource::new());
    let result = explorer(&source)
        .explore(&repo(), "a", None, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(result.outcome, ExplorationOutcome::Exhausted);
    assert_eq!(result.history, vec!["a".to_string(), String::new()]);
    let suggestions = result.suggestions.unwrap();
    assert_eq!(suggestions.existing_ancestor, None);
    assert!(suggestions.candidates.is_empty());
    assert_eq!(suggestions.next_steps[0].tool, "structure");
}

#[tokio::test]
async fn existing_path_is_a_no_op_wrapper() {
    let source = Arc::new(plural_dir_source());
    let cancel = CancelSignal::never();

    for target in ["src/filters", "src/filters/AuthFilter.java", ""] {
        let direct = source.list(&repo(), target, None).await.unwrap();
        let result = explorer(&source)
            .explore(&repo(), target, None, &cancel)
            .await
            .unwrap();

        assert_eq!(result.fallback_count, 0);
        assert_eq!(result.history, vec![target.to_string()]);
        assert_eq!(result.outcome.listing(), Some(&direct));
        assert!(result.navigation.is_empty());
        assert!(result.suggestions.is_none());
    }
}

#[tokio::test]
async fn requested_path_is_normalised() {
    let source = Arc::new(plural_dir_source());
    let result = explorer(&source)
        .explore(&repo(), "/src//filters/./", None, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(result.requested_path, "src/filters");
    assert!(matches!(
        result.outcome,
        ExplorationOutcome::Resolved { listing: Listing::Directory(_), .. }
    ));
}

#[tokio::test]
async fn navigation_stops_when_nothing_is_similar() {
    let source = Arc::new(plural_dir_source());
    let result = explorer(&source)
        .explore(&repo(), "src/zzz/Foo.java", None, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(result.outcome.resolved_path(), Some("src"));
    assert!(result.navigation.is_empty());
    let suggestions = result.suggestions.unwrap();
    assert_eq!(suggestions.target_segment.as_deref(), Some("zzz"));
    assert!(suggestions.candidates.is_empty());
}

#[tokio::test]
async fn fallback_budget_is_configurable() {
    let source = Arc::new(plural_dir_source());
    let limits = ResolverLimits {
        max_fallback: 1,
        ..ResolverLimits::default()
    };
    let result = FallbackPathExplorer::new(source.clone(), &limits)
        .explore(&repo(), "src/filter/AuthFilter.java", None, &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(result.outcome, ExplorationOutcome::Exhausted);
    assert_eq!(result.history, vec!["src/filter/AuthFilter.java", "src/filter"]);
    // Survey of `src` still offers the plural directory.
    let suggestions = result.suggestions.unwrap();
    assert_eq!(suggestions.existing_ancestor.as_deref(), Some("src"));
    assert_eq!(suggestions.candidates[0].name, "filters");
}

#[tokio::test]
async fn transient_failure_aborts_the_walk() {
    let source = Arc::new(plural_dir_source().with_failure(
        SourceOp::List,
        "src/filter",
        SourceError::RateLimited("quota".to_string()),
    ));
    let err = explorer(&source)
        .explore(&repo(), "src/filter/AuthFilter.java", None, &CancelSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResolveError::Source(SourceError::RateLimited(_))
    ));
    // Nothing above the failing path was tried.
    assert_eq!(
        source.listed_paths(),
        vec!["src/filter/AuthFilter.java", "src/filter"]
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_discards_the_walk() {
    let source = Arc::new(plural_dir_source().with_latency(Duration::from_secs(30)));
    let explorer = explorer(&source);
    let (handle, signal) = CancelSignal::pair();

    let task = tokio::spawn(async move {
        explorer
            .explore(&repo(), "src/filter/AuthFilter.java", None, &signal)
            .await
    });
    tokio::task::yield_now().await;
    handle.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(ResolveError::Cancelled)));
    assert_eq!(source.call_count(SourceOp::List), 1);
}
