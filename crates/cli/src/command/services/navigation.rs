use crate::command::context::{CommandContext, ResolvedContext};
use crate::command::domain::{
    parse_payload, CommandAction, CommandOutcome, ExplorePathPayload, FindFilesPayload, Hint,
    HintKind, ReadFilePayload, SearchCodePayload, StructurePayload,
};
use anyhow::{Context as AnyhowContext, Result};
use navigator_protocol::ToolNextAction;
use navigator_resolver::{
    CancelSignal, EntryKind, ExplorationOutcome, RepositoryRef, SearchHit, SearchScope, TreeEntry,
};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct DirectoryOutput {
    pub repository: RepositoryRef,
    pub path: String,
    pub kind: EntryKind,
    pub entries: Vec<TreeEntry>,
}

#[derive(Debug, Serialize)]
pub struct SearchCodeOutput {
    pub repository: RepositoryRef,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_filter: Option<String>,
    pub hits: Vec<SearchHit>,
}

pub(crate) struct NavigationService;

impl NavigationService {
    pub async fn explore(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: ExplorePathPayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;

        let result = resolved
            .navigator
            .explore(&repo, &payload.path, payload.branch.as_deref(), cancel)
            .await
            .with_context(|| format!("explore_path {repo}:{}", payload.path))?;

        let mut hints = Vec::new();
        match &result.outcome {
            ExplorationOutcome::Resolved { path, .. } if result.fallback_count > 0 => {
                hints.push(Hint::new(
                    HintKind::Info,
                    format!(
                        "'{}' does not exist; resolved to '{}' after {} fallback step(s).",
                        result.requested_path, path, result.fallback_count
                    ),
                ));
            }
            ExplorationOutcome::Resolved { .. } => {}
            ExplorationOutcome::Exhausted => hints.push(Hint::new(
                HintKind::Warn,
                format!(
                    "No existing ancestor within {} fallback step(s); see the suggested next steps.",
                    result.fallback_count
                ),
            )),
            ExplorationOutcome::CycleDetected => hints.push(Hint::new(
                HintKind::Warn,
                "The fallback walk revisited a path and stopped.",
            )),
        }
        for step in &result.navigation {
            hints.push(Hint::new(
                HintKind::Info,
                format!("Navigated '{}' -> '{}'.", step.segment, step.chosen),
            ));
        }

        let next_actions = result
            .suggestions
            .as_ref()
            .map(|s| s.next_steps.clone())
            .unwrap_or_default();
        finish(result, resolved, hints, next_actions, None)
    }

    pub async fn check_exists(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: ExplorePathPayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;

        let report = resolved
            .navigator
            .check_exists(&repo, &payload.path, payload.branch.as_deref(), cancel)
            .await
            .with_context(|| format!("check_exists {repo}:{}", payload.path))?;

        let next_actions = report
            .suggestions
            .as_ref()
            .map(|s| s.next_steps.clone())
            .unwrap_or_default();
        finish(report, resolved, Vec::new(), next_actions, None)
    }

    pub async fn list(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: ExplorePathPayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;

        let listing = resolved
            .navigator
            .list_directory(&repo, &payload.path, payload.branch.as_deref(), cancel)
            .await
            .with_context(|| format!("list_directory {repo}:{}", payload.path))?;

        let output = DirectoryOutput {
            repository: repo,
            path: navigator_resolver::path::normalize(&payload.path),
            kind: listing.kind(),
            entries: listing.entries().to_vec(),
        };
        finish(output, resolved, Vec::new(), Vec::new(), None)
    }

    pub async fn read_file(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: ReadFilePayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;

        let file = resolved
            .navigator
            .read_file(&repo, &payload.path, payload.branch.as_deref(), cancel)
            .await
            .with_context(|| format!("read_file {repo}:{}", payload.path))?;

        let mut hints = Vec::new();
        if file.truncated {
            hints.push(Hint::new(
                HintKind::Warn,
                format!(
                    "Content cut to {} characters of a {}-byte file; raise limits.read_max_chars to see more.",
                    file.content.chars().count(),
                    file.size
                ),
            ));
        }
        let truncated = Some(file.truncated);
        finish(file, resolved, hints, Vec::new(), truncated)
    }

    pub async fn structure(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: StructurePayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;

        let tree = resolved
            .navigator
            .structure(
                &repo,
                &payload.path,
                payload.branch.as_deref(),
                payload.max_depth,
                cancel,
            )
            .await
            .with_context(|| format!("structure {repo}:{}", payload.path))?;

        let mut hints = Vec::new();
        let mut next_actions = Vec::new();
        if tree.truncated {
            hints.push(Hint::new(
                HintKind::Warn,
                format!(
                    "Entry cap reached after {} entries; narrow the path or lower max_depth.",
                    tree.entry_count
                ),
            ));
        }
        if !tree.exists {
            hints.push(Hint::new(
                HintKind::Action,
                format!("'{}' does not exist in {repo}.", tree.root),
            ));
            next_actions.push(ToolNextAction {
                tool: CommandAction::ExplorePath.as_str().to_string(),
                args: json!({ "repo": repo.full_name(), "path": tree.root }),
                reason: "Find the closest existing directory.".to_string(),
            });
        }
        let truncated = Some(tree.truncated);
        finish(tree, resolved, hints, next_actions, truncated)
    }

    pub async fn find_files(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: FindFilesPayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;
        let filters = ctx.path_filters();

        let found = resolved
            .navigator
            .find_files(
                &repo,
                &payload.pattern,
                payload.branch.as_deref(),
                &filters,
                cancel,
            )
            .await
            .with_context(|| format!("find_files {repo} '{}'", payload.pattern))?;

        let mut hints = Vec::new();
        let mut next_actions = Vec::new();
        if found.matches.is_empty() {
            hints.push(Hint::new(
                HintKind::Action,
                format!(
                    "No file among {} scanned matched '{}'.",
                    found.scanned, found.pattern
                ),
            ));
            next_actions.push(ToolNextAction {
                tool: CommandAction::SearchCode.as_str().to_string(),
                args: json!({ "repo": repo.full_name(), "query": found.pattern }),
                reason: "Search file contents instead of paths.".to_string(),
            });
        }
        let truncated = Some(found.truncated);
        finish(found, resolved, hints, next_actions, truncated)
    }

    pub async fn search_code(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: SearchCodePayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;

        let scope = SearchScope::new(
            payload.file_extension.as_deref(),
            payload.path_filter.as_deref(),
        );

        let hits = resolved
            .navigator
            .search_code(&repo, &payload.query, &scope, payload.limit, cancel)
            .await
            .with_context(|| format!("search_code {repo} '{}'", payload.query))?;

        let output = SearchCodeOutput {
            repository: repo,
            query: payload.query,
            file_extension: scope.extension().map(str::to_string),
            path_filter: scope.path().map(str::to_string),
            hits,
        };
        finish(output, resolved, Vec::new(), Vec::new(), None)
    }
}

/// Wraps an action result with the hints and meta every response carries.
pub(super) fn finish<T: Serialize>(
    data: T,
    resolved: ResolvedContext,
    mut hints: Vec<Hint>,
    next_actions: Vec<ToolNextAction>,
    truncated: Option<bool>,
) -> Result<CommandOutcome> {
    let mut outcome = CommandOutcome::from_value(data)?;
    hints.extend(resolved.hints);
    outcome.hints = hints;
    outcome.next_actions = next_actions;
    outcome.meta.source = Some(resolved.source_name);
    outcome.meta.profile = Some(resolved.profile_name);
    outcome.meta.profile_path = resolved.profile_path;
    outcome.meta.truncated = truncated;
    Ok(outcome)
}
