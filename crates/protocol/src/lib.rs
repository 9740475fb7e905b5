use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const CAPABILITIES_SCHEMA_VERSION: u32 = 1;

/// A follow-up call the client can issue verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ToolNextAction {
    pub tool: String,
    pub args: serde_json::Value,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub hint: Option<String>,
    #[serde(default)]
    pub next_actions: Vec<ToolNextAction>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct DefaultLimits {
    pub max_fallback: usize,
    pub max_depth: usize,
    pub max_suggestions: usize,
    pub snippet_max_chars: usize,
    pub structure_max_depth: usize,
    pub finder_max_depth: usize,
    pub finder_limit: usize,
    pub read_max_chars: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct CapabilitiesServer {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct Capabilities {
    pub schema_version: u32,
    pub server: CapabilitiesServer,
    pub command_api: String,
    pub source: String,
    pub actions: Vec<String>,
    pub default_limits: DefaultLimits,
    pub start_route: ToolNextAction,
}

/// Cuts `text` to at most `max_chars` characters, never splitting a code point.
///
/// Returns the kept prefix and whether anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

/// JSON Schema of the [`Capabilities`] document.
pub fn capabilities_schema() -> Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(Capabilities)).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        let (text, truncated) = truncate_chars("hello", 10);
        assert_eq!(text, "hello");
        assert!(!truncated);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let (text, truncated) = truncate_chars("héllo wörld", 4);
        assert_eq!(text, "héll");
        assert!(truncated);
    }

    #[test]
    fn truncate_exact_length_is_not_truncated() {
        let (text, truncated) = truncate_chars("abc", 3);
        assert_eq!(text, "abc");
        assert!(!truncated);
    }

    #[test]
    fn capabilities_schema_describes_start_route() {
        let schema = capabilities_schema().unwrap();
        assert_eq!(schema["title"], "Capabilities");
        assert!(schema["properties"]["start_route"].is_object());
        assert!(schema["properties"]["default_limits"].is_object());
    }

    #[test]
    fn next_action_serializes_flat() {
        let action = ToolNextAction {
            tool: "structure".to_string(),
            args: serde_json::json!({ "repo": "o/r" }),
            reason: "why".to_string(),
        };
        let raw = serialize_json(&action).unwrap();
        assert_eq!(
            raw,
            r#"{"tool":"structure","args":{"repo":"o/r"},"reason":"why"}"#
        );
    }
}
