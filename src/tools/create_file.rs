use super::Tool;
use crate::safety::safe_resolve;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

pub struct CreateFile;

#[derive(Deserialize)]
struct Args {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for CreateFile {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a new file with the given content. Fails if the file already exists — use \
         edit_file to modify an existing file instead."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, workspace_root: &Path, input: &Value) -> (String, bool) {
        let args: Args = match serde_json::from_value(input.clone()) {
            Ok(a) => a,
            Err(e) => return (format!("Invalid arguments: {e}"), true),
        };

        let resolved = match safe_resolve(&args.path, workspace_root) {
            Ok(p) => p,
            Err(e) => return (e.to_string(), true),
        };

        if resolved.exists() {
            return (
                format!(
                    "File already exists: {}. Use edit_file to modify it instead.",
                    args.path
                ),
                true,
            );
        }

        if let Some(parent) = resolved.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return (format!("Failed to create parent directories: {e}"), true);
            }
        }

        if let Err(e) = std::fs::write(&resolved, &args.content) {
            return (format!("Failed to write {}: {e}", args.path), true);
        }

        (format!("Created {} ({} bytes)", args.path, args.content.len()), false)
    }
}
