use super::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAX_SEARCH_FILE_SIZE: u64 = 1_000_000;
const DEFAULT_MAX_RESULTS: usize = 20;

const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git", "__pycache__", "node_modules", ".venv", "venv", "target", ".codeframe", ".pytest_cache",
    ".mypy_cache", ".ruff_cache", "dist", "build", ".tox",
];

pub struct SearchCodebase;

#[derive(Deserialize)]
struct Args {
    pattern: String,
    file_glob: Option<String>,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[async_trait]
impl Tool for SearchCodebase {
    fn name(&self) -> &str {
        "search_codebase"
    }

    fn description(&self) -> &str {
        "Regex-search text files under the workspace, skipping binaries, large files, and VCS/build noise."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {"type": "string", "description": "Regex pattern"},
                "file_glob": {"type": "string", "description": "Glob applied to each file's basename"},
                "max_results": {"type": "integer", "default": DEFAULT_MAX_RESULTS}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, workspace_root: &Path, input: &Value) -> (String, bool) {
        let args: Args = match serde_json::from_value(input.clone()) {
            Ok(a) => a,
            Err(e) => return (format!("Invalid arguments: {e}"), true),
        };

        let regex = match regex::Regex::new(&args.pattern) {
            Ok(r) => r,
            Err(e) => return (format!("Invalid regex pattern: {e}"), true),
        };

        let glob_pattern = match &args.file_glob {
            Some(p) => match glob::Pattern::new(p) {
                Ok(g) => Some(g),
                Err(e) => return (format!("Invalid file_glob: {e}"), true),
            },
            None => None,
        };

        let mut matches = Vec::new();
        let mut truncated = false;

        let walker = walkdir::WalkDir::new(workspace_root)
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| !DEFAULT_IGNORE_PATTERNS.contains(&name))
                    .unwrap_or(true)
            });

        'walk: for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                if meta.len() > MAX_SEARCH_FILE_SIZE {
                    continue;
                }
            }
            let rel = entry
                .path()
                .strip_prefix(workspace_root)
                .unwrap_or(entry.path());

            if let Some(pattern) = &glob_pattern {
                let basename = entry.file_name().to_string_lossy();
                if !pattern.matches(&basename) {
                    continue;
                }
            }

            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue; // skip non-UTF-8 files
            };

            for (line_num, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(format!(
                        "{}:{}: {}",
                        rel.to_string_lossy(),
                        line_num + 1,
                        line.trim_end()
                    ));
                    if matches.len() >= args.max_results {
                        truncated = true;
                        break 'walk;
                    }
                }
            }
        }

        if matches.is_empty() {
            return (format!("No matches for pattern: {}", args.pattern), false);
        }

        let mut out = matches.join("\n");
        if truncated {
            out.push_str(&format!(
                "\n... [truncated at {} results]",
                args.max_results
            ));
        }
        (out, false)
    }
}
