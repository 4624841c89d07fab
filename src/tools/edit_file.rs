use super::Tool;
use crate::safety::safe_resolve;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

pub struct EditFile;

#[derive(Deserialize)]
struct Edit {
    search: String,
    replace: String,
}

#[derive(Deserialize)]
struct Args {
    path: String,
    edits: Vec<Edit>,
}

#[async_trait]
impl Tool for EditFile {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Apply one or more search/replace edits to an existing file. The whole call aborts \
         if any search text is not found — no partial edits are applied."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "edits": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "search": {"type": "string"},
                            "replace": {"type": "string"}
                        },
                        "required": ["search", "replace"]
                    }
                }
            },
            "required": ["path", "edits"]
        })
    }

    async fn execute(&self, workspace_root: &Path, input: &Value) -> (String, bool) {
        let args: Args = match serde_json::from_value(input.clone()) {
            Ok(a) => a,
            Err(e) => return (format!("Invalid arguments: {e}"), true),
        };

        if args.edits.is_empty() {
            return ("'edits' must be a non-empty list".to_string(), true);
        }

        let resolved = match safe_resolve(&args.path, workspace_root) {
            Ok(p) => p,
            Err(e) => return (e.to_string(), true),
        };

        let original = match std::fs::read_to_string(&resolved) {
            Ok(c) => c,
            Err(e) => return (format!("Failed to read {}: {e}", args.path), true),
        };

        let mut updated = original.clone();
        for (i, edit) in args.edits.iter().enumerate() {
            match updated.find(&edit.search) {
                Some(pos) => {
                    updated.replace_range(pos..pos + edit.search.len(), &edit.replace);
                }
                None => {
                    let context = surrounding_context(&updated, &edit.search);
                    return (
                        format!(
                            "Edit {} of {} failed: search text not found in {}.\n\
                             Searched for:\n{}\n\nNearby content for reference:\n{}",
                            i + 1,
                            args.edits.len(),
                            args.path,
                            edit.search,
                            context
                        ),
                        true,
                    );
                }
            }
        }

        if let Err(e) = std::fs::write(&resolved, &updated) {
            return (format!("Failed to write {}: {e}", args.path), true);
        }

        let diff = similar::TextDiff::from_lines(&original, &updated)
            .unified_diff()
            .header(&args.path, &args.path)
            .to_string();

        (format!("Applied {} edit(s) to {}\n\n{diff}", args.edits.len(), args.path), false)
    }
}

fn surrounding_context(haystack: &str, needle_start: &str) -> String {
    let first_line = needle_start.lines().next().unwrap_or("");
    if first_line.is_empty() {
        return "(no context available)".to_string();
    }
    let approx_token = first_line.split_whitespace().next().unwrap_or(first_line);
    haystack
        .lines()
        .filter(|l| l.contains(approx_token))
        .take(5)
        .collect::<Vec<_>>()
        .join("\n")
}
