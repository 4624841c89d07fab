use super::Tool;
use crate::safety::safe_resolve;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const DEFAULT_MAX_DEPTH: u64 = 3;

const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git", "__pycache__", "node_modules", ".venv", "venv", "target", ".codeframe", ".pytest_cache",
    ".mypy_cache", ".ruff_cache", "dist", "build", ".tox",
];

pub struct ListFiles;

#[derive(Deserialize)]
struct Args {
    #[serde(default = "default_path")]
    path: String,
    pattern: Option<String>,
    #[serde(default = "default_max_depth")]
    max_depth: u64,
}

fn default_path() -> String {
    ".".to_string()
}
fn default_max_depth() -> u64 {
    DEFAULT_MAX_DEPTH
}

#[async_trait]
impl Tool for ListFiles {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files under a directory, ignoring VCS/build noise, with an optional glob filter."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "default": "."},
                "pattern": {"type": "string", "description": "Glob applied to each entry's basename"},
                "max_depth": {"type": "integer", "default": DEFAULT_MAX_DEPTH}
            }
        })
    }

    async fn execute(&self, workspace_root: &Path, input: &Value) -> (String, bool) {
        let args: Args = match serde_json::from_value(input.clone()) {
            Ok(a) => a,
            Err(e) => return (format!("Invalid arguments: {e}"), true),
        };

        let target = match safe_resolve(&args.path, workspace_root) {
            Ok(p) => p,
            Err(e) => return (e.to_string(), true),
        };

        if !target.is_dir() {
            return (format!("Not a directory: {}", args.path), true);
        }

        let glob_pattern = match &args.pattern {
            Some(p) => match glob::Pattern::new(p) {
                Ok(g) => Some(g),
                Err(e) => return (format!("Invalid pattern: {e}"), true),
            },
            None => None,
        };

        let mut rows = Vec::new();
        let walker = walkdir::WalkDir::new(&target)
            .max_depth(args.max_depth as usize)
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| !DEFAULT_IGNORE_PATTERNS.contains(&name))
                    .unwrap_or(true)
            });

        for entry in walker.filter_map(Result::ok) {
            if entry.path() == target {
                continue;
            }
            let rel = entry.path().strip_prefix(&target).unwrap_or(entry.path());
            if let Some(pattern) = &glob_pattern {
                let basename = entry.file_name().to_string_lossy();
                if !pattern.matches(&basename) {
                    continue;
                }
            }
            let kind = if entry.file_type().is_dir() { "dir" } else { "file" };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            rows.push((rel.to_string_lossy().to_string(), kind, size));
        }

        rows.sort_by(|a, b| a.0.cmp(&b.0));

        if rows.is_empty() {
            return (format!("No entries found under {}", args.path), false);
        }

        let mut out = format!("{:<50} {:>6} {:>10}\n", "PATH", "TYPE", "SIZE");
        for (path, kind, size) in &rows {
            out.push_str(&format!("{path:<50} {kind:>6} {size:>10}\n"));
        }
        out.push_str(&format!("\n{} entries", rows.len()));

        (out, false)
    }
}
