use super::Tool;
use crate::safety::safe_resolve;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAX_FILE_LINES: usize = 500;
const TRUNCATE_HEAD: usize = 200;
const TRUNCATE_TAIL: usize = 50;

pub struct ReadFile;

#[derive(Deserialize)]
struct Args {
    path: String,
    start_line: Option<u64>,
    end_line: Option<u64>,
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file's contents, optionally restricted to a 1-indexed line range. \
         Files over 500 lines are auto-truncated to the first 200 and last 50 lines."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Path relative to the workspace root"},
                "start_line": {"type": "integer", "description": "1-indexed start line (inclusive)"},
                "end_line": {"type": "integer", "description": "1-indexed end line (inclusive)"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, workspace_root: &Path, input: &Value) -> (String, bool) {
        let args: Args = match serde_json::from_value(input.clone()) {
            Ok(a) => a,
            Err(e) => return (format!("Invalid arguments: {e}"), true),
        };

        if let (Some(s), Some(e)) = (args.start_line, args.end_line) {
            if s > e {
                return (format!("Invalid range: start_line ({s}) > end_line ({e})"), true);
            }
        }

        let resolved = match safe_resolve(&args.path, workspace_root) {
            Ok(p) => p,
            Err(e) => return (e.to_string(), true),
        };

        let content = match std::fs::read_to_string(&resolved) {
            Ok(c) => c,
            Err(e) => return (format!("Failed to read {}: {e}", args.path), true),
        };

        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();

        if args.start_line.is_some() || args.end_line.is_some() {
            let start = args.start_line.unwrap_or(1).max(1) as usize;
            let end = args.end_line.unwrap_or(total as u64) as usize;
            let start_idx = (start - 1).min(total);
            let end_idx = end.min(total);
            let slice = if start_idx < end_idx {
                &lines[start_idx..end_idx]
            } else {
                &[]
            };
            return (format_lines(slice, start), false);
        }

        if total > MAX_FILE_LINES {
            let head = format_lines(&lines[..TRUNCATE_HEAD], 1);
            let tail_start = total - TRUNCATE_TAIL;
            let tail = format_lines(&lines[tail_start..], tail_start + 1);
            let banner = format!(
                "\n... [truncated: {total} total lines, showing first {TRUNCATE_HEAD} and last {TRUNCATE_TAIL}] ...\n\n"
            );
            return (format!("{head}{banner}{tail}"), false);
        }

        (format_lines(&lines, 1), false)
    }
}

fn format_lines(lines: &[&str], start_at: usize) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:4} | {}", start_at + i, line.trim_end()))
        .collect::<Vec<_>>()
        .join("\n")
}
