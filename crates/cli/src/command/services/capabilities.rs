use crate::command::context::CommandContext;
use crate::command::domain::{parse_payload, CapabilitiesPayload, CommandAction, CommandOutcome};
use anyhow::Result;
use navigator_protocol::{
    capabilities_schema, Capabilities, CapabilitiesServer, DefaultLimits, ToolNextAction,
    CAPABILITIES_SCHEMA_VERSION,
};
use navigator_resolver::ResolverLimits;
use serde_json::{json, Value};

pub(crate) struct CapabilitiesService;

impl CapabilitiesService {
    pub async fn run(&self, payload: Value, ctx: &CommandContext) -> Result<CommandOutcome> {
        let payload: CapabilitiesPayload = if payload.is_null() {
            CapabilitiesPayload::default()
        } else {
            parse_payload(payload)?
        };

        // An unusable source still leaves the API itself describable.
        let resolved = ctx.resolve().ok();
        let (source, limits) = match &resolved {
            Some(r) => (r.source_name.clone(), *r.navigator.profile().limits()),
            None => ("unconfigured".to_string(), ResolverLimits::default()),
        };

        let output = Capabilities {
            schema_version: CAPABILITIES_SCHEMA_VERSION,
            server: CapabilitiesServer {
                name: "repo-navigator".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            command_api: "v1".to_string(),
            source,
            actions: CommandAction::ALL
                .iter()
                .map(|a| a.as_str().to_string())
                .collect(),
            default_limits: DefaultLimits {
                max_fallback: limits.max_fallback,
                max_depth: limits.max_depth,
                max_suggestions: limits.max_suggestions,
                snippet_max_chars: limits.snippet_max_chars,
                structure_max_depth: limits.structure_max_depth,
                finder_max_depth: limits.finder_max_depth,
                read_max_chars: limits.read_max_chars,
                finder_limit: limits.finder_limit,
            },
            start_route: ToolNextAction {
                tool: CommandAction::ExplorePath.as_str().to_string(),
                args: json!({ "repo": "owner/name", "path": "" }),
                reason: "Resolve a path; missing segments come back with ranked suggestions."
                    .to_string(),
            },
        };

        let mut outcome = CommandOutcome::from_value(output)?;
        if payload.schema {
            if let Value::Object(map) = &mut outcome.data {
                map.insert("schema".to_string(), capabilities_schema()?);
            }
        }
        if let Some(resolved) = resolved {
            outcome.meta.source = Some(resolved.source_name);
            outcome.meta.profile = Some(resolved.profile_name);
            outcome.meta.profile_path = resolved.profile_path;
        }
        Ok(outcome)
    }
}
