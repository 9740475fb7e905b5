use anyhow::Result;
use navigator_protocol::ToolNextAction;
use navigator_resolver::{Dependency, ResolveError, ResolverLimits, SourceError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub action: CommandAction,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    #[serde(default)]
    pub options: Option<RequestOptions>,
    #[serde(default)]
    pub config: Option<Value>,
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Capabilities,
    ExplorePath,
    TraceChain,
    CheckExists,
    ListDirectory,
    ReadFile,
    Structure,
    FindFiles,
    SearchCode,
    TraceMethod,
    MapDependencies,
}

impl CommandAction {
    pub const ALL: [CommandAction; 11] = [
        CommandAction::Capabilities,
        CommandAction::ExplorePath,
        CommandAction::TraceChain,
        CommandAction::CheckExists,
        CommandAction::ListDirectory,
        CommandAction::ReadFile,
        CommandAction::Structure,
        CommandAction::FindFiles,
        CommandAction::SearchCode,
        CommandAction::TraceMethod,
        CommandAction::MapDependencies,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            CommandAction::Capabilities => "capabilities",
            CommandAction::ExplorePath => "explore_path",
            CommandAction::TraceChain => "trace_chain",
            CommandAction::CheckExists => "check_exists",
            CommandAction::ListDirectory => "list_directory",
            CommandAction::ReadFile => "read_file",
            CommandAction::Structure => "structure",
            CommandAction::FindFiles => "find_files",
            CommandAction::SearchCode => "search_code",
            CommandAction::TraceMethod => "trace_method",
            CommandAction::MapDependencies => "map_dependencies",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<navigator_protocol::ErrorEnvelope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<ToolNextAction>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub meta: ResponseMeta,
}

impl CommandResponse {
    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Clone)]
pub struct Hint {
    #[serde(rename = "type")]
    pub kind: HintKind,
    pub text: String,
}

impl Hint {
    pub fn new(kind: HintKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Info,
    Action,
    Warn,
}

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub code: String,
    pub hint: Option<String>,
    pub hints: Vec<Hint>,
    pub next_actions: Vec<ToolNextAction>,
}

/// Per-request knobs: limit overrides and finder filters.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct RequestOptions {
    #[serde(default)]
    pub limits: LimitOverrides,
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub file_pattern: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
#[serde(deny_unknown_fields)]
pub struct LimitOverrides {
    pub max_fallback: Option<usize>,
    pub max_depth: Option<usize>,
    pub max_suggestions: Option<usize>,
    pub ratio_threshold: Option<f64>,
    pub snippet_max_chars: Option<usize>,
    pub structure_max_depth: Option<usize>,
    pub structure_max_entries: Option<usize>,
    pub finder_max_depth: Option<usize>,
    pub finder_limit: Option<usize>,
    pub read_max_chars: Option<usize>,
}

impl LimitOverrides {
    pub fn is_empty(&self) -> bool {
        self.max_fallback.is_none()
            && self.max_depth.is_none()
            && self.max_suggestions.is_none()
            && self.ratio_threshold.is_none()
            && self.snippet_max_chars.is_none()
            && self.structure_max_depth.is_none()
            && self.structure_max_entries.is_none()
            && self.finder_max_depth.is_none()
            && self.finder_limit.is_none()
            && self.read_max_chars.is_none()
    }

    pub fn apply(&self, base: ResolverLimits) -> ResolverLimits {
        ResolverLimits {
            max_fallback: self.max_fallback.unwrap_or(base.max_fallback),
            max_depth: self.max_depth.unwrap_or(base.max_depth),
            max_suggestions: self.max_suggestions.unwrap_or(base.max_suggestions),
            ratio_threshold: self.ratio_threshold.unwrap_or(base.ratio_threshold),
            snippet_max_chars: self.snippet_max_chars.unwrap_or(base.snippet_max_chars),
            structure_max_depth: self.structure_max_depth.unwrap_or(base.structure_max_depth),
            structure_max_entries: self
                .structure_max_entries
                .unwrap_or(base.structure_max_entries),
            finder_max_depth: self.finder_max_depth.unwrap_or(base.finder_max_depth),
            finder_limit: self.finder_limit.unwrap_or(base.finder_limit),
            read_max_chars: self.read_max_chars.unwrap_or(base.read_max_chars),
        }
    }
}

#[derive(Debug, Serialize, Default, Clone)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
}

pub struct CommandOutcome {
    pub data: Value,
    pub hints: Vec<Hint>,
    pub meta: ResponseMeta,
    pub next_actions: Vec<ToolNextAction>,
}

impl CommandOutcome {
    pub fn from_value<T: Serialize>(value: T) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(value)?,
            hints: Vec::new(),
            meta: ResponseMeta::default(),
            next_actions: Vec::new(),
        })
    }
}

pub fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(Into::into)
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorePathPayload {
    pub repo: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFilePayload {
    pub repo: String,
    pub path: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TraceChainPayload {
    pub repo: String,
    pub entity: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StructurePayload {
    pub repo: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FindFilesPayload {
    pub repo: String,
    pub pattern: String,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchCodePayload {
    pub repo: String,
    pub query: String,
    /// With or without the leading dot.
    #[serde(default)]
    pub file_extension: Option<String>,
    /// Only hits at or below this directory.
    #[serde(default)]
    pub path_filter: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TraceMethodPayload {
    pub repo: String,
    pub method: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MapDependenciesPayload {
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CapabilitiesPayload {
    #[serde(default)]
    pub schema: bool,
}

/// Maps a failed action to a stable error code plus recovery hints.
///
/// Typed resolver errors are found anywhere in the `anyhow` chain; payload
/// decoding failures count as invalid requests.
pub fn classify_error(
    err: &anyhow::Error,
    action: Option<CommandAction>,
    payload: Option<&Value>,
) -> ErrorClassification {
    let mut hints = Vec::new();
    let mut next_actions = Vec::new();
    let mut code = "internal";

    let resolve = err.chain().find_map(|e| e.downcast_ref::<ResolveError>());
    let source = err.chain().find_map(|e| e.downcast_ref::<SourceError>());
    let decode = err.chain().any(|e| e.is::<serde_json::Error>());

    match (resolve, source) {
        (Some(ResolveError::InvalidReference(_)), _) => {
            code = "invalid_reference";
            hints.push(Hint::new(
                HintKind::Action,
                "Pass the repository as owner/name or https://github.com/owner/name.",
            ));
        }
        (Some(ResolveError::InvalidRequest(_) | ResolveError::Profile(_)), _) => {
            code = "invalid_request";
            hints.push(Hint::new(
                HintKind::Action,
                "Check the payload fields and limit overrides for this action.",
            ));
        }
        (Some(ResolveError::Cancelled), _) => {
            code = "cancelled";
            hints.push(Hint::new(
                HintKind::Info,
                "The operation was cancelled; no partial result is reported.",
            ));
        }
        (_, Some(SourceError::NotFound(_))) => {
            code = "not_found";
            hints.push(Hint::new(
                HintKind::Action,
                "The path does not exist; explore_path walks up to the closest existing directory.",
            ));
            if let Some(args) = explore_args(payload) {
                if action != Some(CommandAction::ExplorePath) {
                    next_actions.push(ToolNextAction {
                        tool: CommandAction::ExplorePath.as_str().to_string(),
                        args,
                        reason: "Resolve the closest existing path and get suggestions."
                            .to_string(),
                    });
                }
            }
        }
        (_, Some(SourceError::RateLimited(_))) => {
            code = "rate_limited";
            hints.push(Hint::new(
                HintKind::Warn,
                "Remote quota exhausted; set GITHUB_TOKEN or retry after the quota window resets.",
            ));
        }
        (_, Some(SourceError::Unauthorized(_))) => {
            code = "unauthorized";
            hints.push(Hint::new(
                HintKind::Action,
                "Check GITHUB_TOKEN; the remote refused the credentials or the repository is private.",
            ));
        }
        (_, Some(SourceError::Network(_))) => {
            code = "network";
            hints.push(Hint::new(
                HintKind::Warn,
                "Transient network failure; retrying the same request is safe.",
            ));
        }
        _ if decode => {
            code = "invalid_request";
            hints.push(Hint::new(
                HintKind::Action,
                "Payload does not match the action's schema; see the capabilities action.",
            ));
        }
        _ => {}
    }

    ErrorClassification {
        code: code.to_string(),
        hint: hints.first().map(|h| h.text.clone()),
        hints,
        next_actions,
    }
}

fn explore_args(payload: Option<&Value>) -> Option<Value> {
    let payload = payload?;
    let repo = payload.get("repo").and_then(Value::as_str)?;
    let path = payload.get("path").and_then(Value::as_str).unwrap_or_default();
    let mut args = json!({ "repo": repo, "path": path });
    if let Some(branch) = payload.get("branch").and_then(Value::as_str) {
        args["branch"] = Value::String(branch.to_string());
    }
    Some(args)
}
