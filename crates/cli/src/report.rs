use crate::command::{CommandAction, CommandResponse};
use anyhow::Result;
use serde_json::Value;

const SNIPPET_PREVIEW_CHARS: usize = 120;

/// Markdown report of a successful response; actions without a dedicated
/// layout fall back to pretty JSON.
pub fn render(action: CommandAction, response: &CommandResponse) -> Result<String> {
    let data = &response.data;
    let mut md = match action {
        CommandAction::ExplorePath => render_exploration(data),
        CommandAction::TraceChain => render_chain(data),
        CommandAction::CheckExists => render_existence(data),
        CommandAction::ReadFile => render_file(data),
        CommandAction::SearchCode => render_search(data),
        CommandAction::Structure => render_structure(data),
        CommandAction::FindFiles => render_matches(data),
        CommandAction::TraceMethod => render_method(data),
        CommandAction::MapDependencies => render_dependencies(data),
        _ => serde_json::to_string_pretty(data)?,
    };

    if !response.hints.is_empty() {
        md.push('\n');
        for hint in &response.hints {
            md.push_str(&format!("> {}\n", hint.text));
        }
    }
    if !response.next_actions.is_empty() {
        md.push_str("\n## Next steps\n\n");
        for next in &response.next_actions {
            md.push_str(&format!("- `{}` {} ({})\n", next.tool, next.args, next.reason));
        }
    }
    Ok(md)
}

fn str_of<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn shown_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn render_exploration(data: &Value) -> String {
    let mut md = format!(
        "# explore {}:{}\n\n",
        str_of(data, "repository"),
        shown_path(str_of(data, "requested_path"))
    );
    let outcome = &data["outcome"];
    match str_of(outcome, "status") {
        "resolved" => md.push_str(&format!(
            "- Outcome: `resolved` at `{}`\n",
            shown_path(str_of(outcome, "path"))
        )),
        other => md.push_str(&format!("- Outcome: `{other}`\n")),
    }
    let history: Vec<&str> = items(data, "history")
        .iter()
        .filter_map(Value::as_str)
        .map(shown_path)
        .collect();
    md.push_str(&format!(
        "- Fallback steps: {} ({})\n",
        data["fallback_count"],
        history.join(" -> ")
    ));
    for step in items(data, "navigation") {
        md.push_str(&format!(
            "- Navigated: `{}` -> `{}` ({} {:.2})\n",
            str_of(step, "segment"),
            str_of(step, "chosen"),
            str_of(step, "match_kind"),
            step["score"].as_f64().unwrap_or_default()
        ));
    }
    if let Some(entries) = outcome.get("listing").and_then(|l| l.get("entries")) {
        let entries = match entries {
            Value::Array(list) => list.clone(),
            single => vec![single.clone()],
        };
        md.push_str("\n## Listing\n\n");
        for entry in &entries {
            md.push_str(&format!("- {} ({})\n", str_of(entry, "path"), str_of(entry, "kind")));
        }
    }
    if let Some(suggestions) = data.get("suggestions") {
        render_suggestions(&mut md, suggestions);
    }
    md
}

fn render_suggestions(md: &mut String, suggestions: &Value) {
    let candidates = items(suggestions, "candidates");
    if candidates.is_empty() {
        return;
    }
    md.push_str(&format!(
        "\n## Did you mean (for `{}`)\n\n| name | path | kind | score |\n|---|---|---|---:|\n",
        str_of(suggestions, "target_segment")
    ));
    for candidate in candidates {
        md.push_str(&format!(
            "| `{}` | `{}` | {} | {:.2} |\n",
            str_of(candidate, "name"),
            str_of(candidate, "path"),
            str_of(candidate, "kind"),
            candidate["score"].as_f64().unwrap_or_default()
        ));
    }
}

fn render_chain(data: &Value) -> String {
    let mut md = format!(
        "# trace {} in {}\n\n| depth | repository | entity | location |\n|---:|---|---|---|\n",
        str_of(data, "entity_name"),
        str_of(data, "repository")
    );
    for node in items(data, "nodes") {
        md.push_str(&format!(
            "| {} | `{}` | `{}` | `{}` |\n",
            node["depth"],
            str_of(node, "repository"),
            str_of(node, "entity_name"),
            str_of(node, "definition_location")
        ));
    }
    md.push_str(&format!(
        "\n- Stop: `{}`{}\n",
        str_of(data, "stop"),
        if data["truncated"].as_bool().unwrap_or(false) {
            " (truncated)"
        } else {
            ""
        }
    ));
    md
}

fn render_existence(data: &Value) -> String {
    let path = shown_path(str_of(data, "path"));
    if data["exists"].as_bool().unwrap_or(false) {
        let mut md = format!("`{path}` exists ({})\n", str_of(data, "kind"));
        for entry in items(data, "entries") {
            md.push_str(&format!("- {}\n", str_of(entry, "name")));
        }
        md
    } else {
        let mut md = format!("`{path}` does not exist\n");
        if let Some(suggestions) = data.get("suggestions") {
            render_suggestions(&mut md, suggestions);
        }
        md
    }
}

fn render_file(data: &Value) -> String {
    let content = str_of(data, "content");
    let mut md = format!(
        "# {}:{} ({} bytes)\n\n```\n{content}",
        str_of(data, "repository"),
        str_of(data, "path"),
        data["size"]
    );
    if !content.ends_with('\n') {
        md.push('\n');
    }
    md.push_str("```\n");
    md
}

fn render_search(data: &Value) -> String {
    let mut md = format!(
        "# search '{}' in {}\n\n",
        str_of(data, "query"),
        str_of(data, "repository")
    );
    let hits = items(data, "hits");
    if hits.is_empty() {
        md.push_str("No hits.\n");
    }
    for hit in hits {
        md.push_str(&format!(
            "- `{}`: {}\n",
            str_of(hit, "path"),
            one_line(str_of(hit, "snippet"))
        ));
    }
    md
}

fn render_structure(data: &Value) -> String {
    let mut md = format!(
        "# {}:{} (depth {}, {} entries)\n\n",
        str_of(data, "repository"),
        shown_path(str_of(data, "root")),
        data["max_depth"],
        data["entry_count"]
    );
    // Explicit stack keeps deep trees off the call stack.
    let mut stack: Vec<(&Value, usize)> = items(data, "entries").iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        let suffix = if str_of(node, "kind") == "directory" { "/" } else { "" };
        md.push_str(&format!("{}{}{suffix}\n", "  ".repeat(depth), str_of(node, "name")));
        stack.extend(items(node, "children").iter().rev().map(|c| (c, depth + 1)));
    }
    md
}

fn render_matches(data: &Value) -> String {
    let mut md = format!(
        "# find '{}' in {} ({} files scanned)\n\n",
        str_of(data, "pattern"),
        str_of(data, "repository"),
        data["scanned"]
    );
    for (i, m) in items(data, "matches").iter().enumerate() {
        md.push_str(&format!(
            "{}. {} (score: {:.3})\n",
            i + 1,
            str_of(m, "path"),
            m["score"].as_f64().unwrap_or_default()
        ));
    }
    md
}

fn render_method(data: &Value) -> String {
    let mut md = format!(
        "# {} in {}\n\n## Usages\n\n",
        str_of(data, "method"),
        str_of(data, "repository")
    );
    for usage in items(data, "usages") {
        md.push_str(&format!(
            "- `{}`: {}\n",
            str_of(usage, "path"),
            one_line(str_of(usage, "snippet"))
        ));
    }
    if let Some(package) = data.get("source_package").and_then(Value::as_str) {
        md.push_str(&format!("\n- Package: `{package}`\n"));
    }
    if let Some(upstream) = data.get("upstream").and_then(Value::as_str) {
        md.push_str(&format!("- Upstream: `{upstream}`\n"));
    }
    if let Some(implementation) = data.get("implementation").filter(|v| !v.is_null()) {
        md.push_str(&format!(
            "\n## Implementation\n\n`{}`:\n\n```\n{}\n```\n",
            str_of(implementation, "path"),
            str_of(implementation, "snippet")
        ));
    }
    md
}

fn render_dependencies(data: &Value) -> String {
    let mut md = String::from("| group | artifact | repository |\n|---|---|---|\n");
    for dep in items(data, "dependencies") {
        md.push_str(&format!(
            "| `{}` | `{}` | {} |\n",
            str_of(dep, "group_id"),
            str_of(dep, "artifact_id"),
            dep.get("repository")
                .and_then(Value::as_str)
                .map_or("n/a".to_string(), |r| format!("`{r}`"))
        ));
    }
    md.push_str(&format!(
        "\n- Mapped: {}, unmapped: {}\n",
        data["mapped"], data["unmapped"]
    ));
    md
}

fn one_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    let mut out: String = line.chars().take(SNIPPET_PREVIEW_CHARS).collect();
    if line.chars().count() > SNIPPET_PREVIEW_CHARS {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandStatus, Hint, HintKind, ResponseMeta};
    use serde_json::json;

    fn ok(data: Value, hints: Vec<Hint>) -> CommandResponse {
        CommandResponse {
            status: CommandStatus::Ok,
            message: None,
            error: None,
            hints,
            next_actions: Vec::new(),
            data,
            meta: ResponseMeta::default(),
        }
    }

    #[test]
    fn exploration_report_shows_walk_and_suggestions() {
        let data = json!({
            "repository": "acme/web",
            "requested_path": "src/filter/AuthFilter.java",
            "outcome": {
                "status": "resolved",
                "path": "src/filters",
                "listing": { "type": "directory", "entries": [
                    { "name": "AuthFilter.java", "path": "src/filters/AuthFilter.java", "kind": "file" }
                ]}
            },
            "history": ["src/filter/AuthFilter.java", "src/filter", "src"],
            "fallback_count": 2,
            "navigation": [
                { "segment": "filter", "chosen": "filters", "path": "src/filters", "score": 0.85, "match_kind": "containment" }
            ],
            "suggestions": {
                "outcome": "partial",
                "existing_ancestor": "src/filters",
                "target_segment": "AuthFilter.java",
                "candidates": [
                    { "name": "AuthFilter.java", "path": "src/filters/AuthFilter.java", "kind": "file", "score": 1.0, "match_kind": "exact" }
                ],
                "next_steps": []
            }
        });
        let hint = Hint {
            kind: HintKind::Info,
            text: "resolved after 2 steps".to_string(),
        };
        let md = render(CommandAction::ExplorePath, &ok(data, vec![hint])).unwrap();

        assert!(md.contains("# explore acme/web:src/filter/AuthFilter.java"));
        assert!(md.contains("resolved` at `src/filters`"));
        assert!(md.contains("src/filter/AuthFilter.java -> src/filter -> src"));
        assert!(md.contains("`filter` -> `filters` (containment 0.85)"));
        assert!(md.contains("| `AuthFilter.java` | `src/filters/AuthFilter.java` | file | 1.00 |"));
        assert!(md.contains("> resolved after 2 steps"));
    }

    #[test]
    fn structure_report_indents_children() {
        let data = json!({
            "repository": "acme/web",
            "root": "",
            "max_depth": 2,
            "entry_count": 3,
            "entries": [
                { "name": "src", "path": "src", "kind": "directory", "children": [
                    { "name": "Main.java", "path": "src/Main.java", "kind": "file" }
                ]},
                { "name": "pom.xml", "path": "pom.xml", "kind": "file" }
            ]
        });
        let md = render(CommandAction::Structure, &ok(data, Vec::new())).unwrap();
        assert!(md.contains("src/\n  Main.java\npom.xml\n"));
    }

    #[test]
    fn file_report_fences_content() {
        let data = json!({
            "repository": "acme/web",
            "path": "pom.xml",
            "name": "pom.xml",
            "size": 9,
            "content": "<project>",
            "truncated": false
        });
        let md = render(CommandAction::ReadFile, &ok(data, Vec::new())).unwrap();
        assert_eq!(md, "# acme/web:pom.xml (9 bytes)\n\n```\n<project>\n```\n");
    }

    #[test]
    fn search_report_lists_hits() {
        let data = json!({
            "repository": "acme/web",
            "query": "AuthFilter",
            "hits": [{ "path": "src/filters/AuthFilter.java", "snippet": "public class AuthFilter {", "score": 1.0 }]
        });
        let md = render(CommandAction::SearchCode, &ok(data, Vec::new())).unwrap();
        assert!(md.contains("- `src/filters/AuthFilter.java`: public class AuthFilter {"));
    }

    #[test]
    fn unknown_layout_falls_back_to_json() {
        let md = render(CommandAction::Capabilities, &ok(json!({ "a": 1 }), Vec::new())).unwrap();
        assert_eq!(md, "{\n  \"a\": 1\n}");
    }

    #[test]
    fn one_line_truncates_long_snippets() {
        let long = "x".repeat(200);
        assert_eq!(one_line(&long).chars().count(), SNIPPET_PREVIEW_CHARS + 1);
        assert_eq!(one_line("a\nb"), "a");
    }
}
