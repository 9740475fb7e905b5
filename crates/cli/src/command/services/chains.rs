use super::navigation::finish;
use crate::command::context::CommandContext;
use crate::command::domain::{
    parse_payload, CommandAction, CommandOutcome, Hint, HintKind, MapDependenciesPayload,
    TraceChainPayload, TraceMethodPayload,
};
use anyhow::{Context as AnyhowContext, Result};
use navigator_protocol::ToolNextAction;
use navigator_resolver::{
    CancelSignal, ChainStop, DependencyList, MappedDependency, RepositoryRef,
};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct MapDependenciesOutput {
    pub mapped: usize,
    pub unmapped: usize,
    pub dependencies: Vec<MappedDependency>,
}

pub(crate) struct ChainService;

impl ChainService {
    pub async fn trace_chain(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: TraceChainPayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;

        let chain = resolved
            .navigator
            .trace(&repo, &payload.entity, cancel)
            .await
            .with_context(|| format!("trace_chain {repo} {}", payload.entity))?;

        let mut hints = Vec::new();
        let mut next_actions = Vec::new();
        match chain.stop {
            ChainStop::NoDefinition => {
                hints.push(Hint::new(
                    HintKind::Action,
                    format!("No definition of '{}' found in {repo}.", payload.entity),
                ));
                next_actions.push(ToolNextAction {
                    tool: CommandAction::FindFiles.as_str().to_string(),
                    args: json!({ "repo": repo.full_name(), "pattern": payload.entity }),
                    reason: "Look for a file named after the entity.".to_string(),
                });
            }
            ChainStop::NoUpstream => hints.push(Hint::new(
                HintKind::Info,
                "The last definition imports nothing with a known upstream repository.",
            )),
            ChainStop::CycleDetected => hints.push(Hint::new(
                HintKind::Warn,
                "The import chain leads back to an entity already visited.",
            )),
            ChainStop::DepthLimit => hints.push(Hint::new(
                HintKind::Warn,
                format!(
                    "Chain truncated at depth {}; raise limits.max_depth to follow further.",
                    chain.nodes.len()
                ),
            )),
        }
        let truncated = Some(chain.truncated);
        finish(chain, resolved, hints, next_actions, truncated)
    }

    pub async fn trace_method(
        &self,
        payload: Value,
        ctx: &CommandContext,
        cancel: &CancelSignal,
    ) -> Result<CommandOutcome> {
        let payload: TraceMethodPayload = parse_payload(payload)?;
        let repo: RepositoryRef = payload.repo.parse()?;
        let resolved = ctx.resolve()?;

        let trace = resolved
            .navigator
            .trace_method(&repo, &payload.method, cancel)
            .await
            .with_context(|| format!("trace_method {repo} {}", payload.method))?;

        let mut hints = Vec::new();
        if trace.usages.is_empty() {
            hints.push(Hint::new(
                HintKind::Info,
                format!("No usage of '{}' found in {repo}.", trace.method_name),
            ));
        }
        match (&trace.source_package, &trace.upstream) {
            (Some(package), None) => hints.push(Hint::new(
                HintKind::Action,
                format!("Package '{package}' has no upstream mapping; add one to the profile."),
            )),
            (None, _) if !trace.usages.is_empty() => hints.push(Hint::new(
                HintKind::Info,
                format!("No import of '{}' found next to the usages.", trace.class_name),
            )),
            _ => {}
        }
        finish(trace, resolved, hints, Vec::new(), None)
    }

    pub async fn map_dependencies(
        &self,
        payload: Value,
        ctx: &CommandContext,
    ) -> Result<CommandOutcome> {
        let payload: MapDependenciesPayload = parse_payload(payload)?;
        let resolved = ctx.resolve()?;

        let list = DependencyList {
            dependencies: payload.dependencies,
        };
        let dependencies = resolved.navigator.map_dependencies(&list);
        let mapped = dependencies
            .iter()
            .filter(|d| d.repository.is_some())
            .count();
        let output = MapDependenciesOutput {
            mapped,
            unmapped: dependencies.len() - mapped,
            dependencies,
        };
        finish(output, resolved, Vec::new(), Vec::new(), None)
    }
}
