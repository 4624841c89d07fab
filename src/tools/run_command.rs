use super::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const TRUNCATE_CHARS: usize = 4000;

/// Verbatim substrings that cause a command to be refused outright.
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf ~",
    "> /dev/",
    "mkfs",
    ":(){",
    "dd if=",
    "| sh",
];

pub struct RunCommand;

#[derive(Deserialize)]
struct Args {
    command: String,
    #[serde(default = "default_timeout")]
    timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[async_trait]
impl Tool for RunCommand {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace. A small set of destructive command patterns \
         is refused outright. Output is truncated if large."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "timeout_secs": {"type": "integer", "default": DEFAULT_TIMEOUT_SECS, "minimum": MIN_TIMEOUT_SECS, "maximum": MAX_TIMEOUT_SECS}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, workspace_root: &Path, input: &Value) -> (String, bool) {
        let args: Args = match serde_json::from_value(input.clone()) {
            Ok(a) => a,
            Err(e) => return (format!("Invalid arguments: {e}"), true),
        };

        if let Some(pattern) = DANGEROUS_PATTERNS.iter().find(|p| args.command.contains(**p)) {
            return (
                format!("Refused to execute: command matches dangerous pattern '{pattern}'"),
                true,
            );
        }

        let timeout = args.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

        let (shell, flag) = default_shell();
        let mut cmd = Command::new(shell);
        cmd.arg(flag).arg(&args.command).current_dir(workspace_root);

        let venv_bin = workspace_root.join(".venv").join("bin");
        if venv_bin.is_dir() {
            let existing_path = std::env::var("PATH").unwrap_or_default();
            let new_path = format!("{}:{}", venv_bin.display(), existing_path);
            cmd.env("PATH", new_path);
            cmd.env("VIRTUAL_ENV", workspace_root.join(".venv"));
        }

        let output = match tokio::time::timeout(
            std::time::Duration::from_secs(timeout),
            cmd.output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return (format!("Failed to spawn command: {e}"), true),
            Err(_) => return (format!("Command timed out after {timeout}s"), true),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}{stderr}");
        let truncated = truncate_middle(&combined, TRUNCATE_CHARS);
        let success = output.status.success();

        let summary = format!(
            "Exit code: {}\n\n{}",
            output.status.code().unwrap_or(-1),
            truncated
        );

        (summary, !success)
    }
}

fn default_shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

fn truncate_middle(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let half = max_chars / 2;
    let chars: Vec<char> = text.chars().collect();
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{head}\n... [truncated] ...\n{tail}")
}
