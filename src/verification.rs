//! Verification gate: auto-detected checks (pytest, ruff, mypy, npm test,
//! npm lint) run after the agent believes a task is complete.
//!
//! Grounded exactly on the Python predecessor's gates module: detection
//! fingerprints, per-check timeouts, and non-verbose output summarization.

use crate::config::GateConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCheck {
    pub name: String,
    pub status: GateStatus,
    pub exit_code: Option<i32>,
    pub output: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    pub checks: Vec<GateCheck>,
}

impl GateResult {
    pub fn summary(&self) -> String {
        if self.checks.is_empty() {
            return "no checks run".to_string();
        }
        let passed = self.checks.iter().filter(|c| c.status == GateStatus::Passed).count();
        let failed = self.checks.iter().filter(|c| c.status == GateStatus::Failed).count();
        let skipped = self.checks.iter().filter(|c| c.status == GateStatus::Skipped).count();
        let mut parts = Vec::new();
        if passed > 0 {
            parts.push(format!("{passed} passed"));
        }
        if failed > 0 {
            parts.push(format!("{failed} failed"));
        }
        if skipped > 0 {
            parts.push(format!("{skipped} skipped"));
        }
        if parts.is_empty() {
            "no checks run".to_string()
        } else {
            parts.join(", ")
        }
    }

    pub fn error_summary(&self) -> String {
        self.checks
            .iter()
            .filter(|c| c.status == GateStatus::Failed)
            .map(|c| format!("[{}]\n{}", c.name, c.output))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

const ONE_FILE_TRUNCATE: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub code: String,
    pub message: String,
}

/// Parses ruff/eslint-style `path:line:col: CODE message` lines.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    static PATTERN: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
        regex::Regex::new(r"^(?P<file>[^:\n]+):(?P<line>\d+):(?P<col>\d+): (?P<code>[A-Z]+[0-9]+) (?P<message>.+)$").unwrap()
    });
    output
        .lines()
        .filter_map(|line| {
            PATTERN.captures(line).map(|c| Diagnostic {
                file: c["file"].to_string(),
                line: c["line"].parse().unwrap_or(0),
                column: c["col"].parse().unwrap_or(0),
                code: c["code"].to_string(),
                message: c["message"].to_string(),
            })
        })
        .collect()
}

const LINT_BANNER: &str = "LINT ERRORS (must fix before continuing)";

/// Runs a single-file linter chosen by extension after a successful
/// `edit_file`/`create_file`. Returns `None` when the file is clean, its
/// extension has no linter, or the linter binary is missing — all three are
/// silent skips, never failures.
pub async fn run_single_file_lint(repo: &Path, relative_path: &str, timeout_secs: u64) -> Option<String> {
    let ext = Path::new(relative_path).extension().and_then(|e| e.to_str())?;
    let (program, args): (&str, Vec<&str>) = match ext {
        "py" | "pyi" => ("ruff", vec!["check", relative_path]),
        "js" | "jsx" | "ts" | "tsx" => ("eslint", vec![relative_path]),
        _ => return None,
    };

    if which(program).is_none() {
        return None;
    }

    let mut cmd = Command::new(program);
    cmd.args(&args).current_dir(repo);
    let output = run_with_timeout(cmd, timeout_secs).await.ok()?;
    if output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{stdout}{stderr}");
    if combined.trim().is_empty() {
        return None;
    }

    Some(format!("{LINT_BANNER}\n{}", truncate(&combined, ONE_FILE_TRUNCATE)))
}

/// Runs every gate detected in `repo`, or exactly the gates named in
/// `gates` when provided. A gate's own binary missing does not fail the
/// whole run; it records `GateStatus::Error` on that single check.
pub async fn run(repo: &Path, gates: Option<&[&str]>, verbose: bool, config: &GateConfig) -> GateResult {
    let selected: Vec<String> = match gates {
        Some(names) => names.iter().map(|s| s.to_string()).collect(),
        None => detect_available_gates(repo),
    };

    let mut checks = Vec::new();
    for name in &selected {
        let check = match name.as_str() {
            "pytest" => run_pytest(repo, verbose, config.pytest_timeout_secs).await,
            "ruff" => run_ruff(repo, verbose, config.ruff_timeout_secs).await,
            "mypy" => run_mypy(repo, verbose, config.mypy_timeout_secs).await,
            "npm-test" => run_npm_test(repo, verbose, config.npm_test_timeout_secs).await,
            "npm-lint" => run_npm_lint(repo, verbose, config.npm_lint_timeout_secs).await,
            other => GateCheck {
                name: other.to_string(),
                status: GateStatus::Skipped,
                exit_code: None,
                output: format!("Unknown gate: {other}"),
                duration_ms: 0,
            },
        };
        checks.push(check);
    }

    let passed = checks
        .iter()
        .all(|c| matches!(c.status, GateStatus::Passed | GateStatus::Skipped));

    GateResult { passed, checks }
}

fn detect_available_gates(repo: &Path) -> Vec<String> {
    let mut gates = Vec::new();

    let has_python_project = repo.join("pytest.ini").exists()
        || repo.join("pyproject.toml").exists()
        || repo.join("setup.py").exists()
        || repo.join("tests").is_dir();
    if has_python_project {
        gates.push("pytest".to_string());
    }

    let has_py_files = repo.join("pyproject.toml").exists()
        || repo.join("ruff.toml").exists()
        || has_any_py_file(repo);
    if has_py_files && (which("ruff").is_some() || which("uv").is_some()) {
        gates.push("ruff".to_string());
    }

    if let Ok(pkg) = std::fs::read_to_string(repo.join("package.json")) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&pkg) {
            if let Some(scripts) = json.get("scripts") {
                if scripts.get("test").is_some() {
                    gates.push("npm-test".to_string());
                }
                if scripts.get("lint").is_some() {
                    gates.push("npm-lint".to_string());
                }
            }
        }
    }

    gates
}

fn has_any_py_file(repo: &Path) -> bool {
    walkdir::WalkDir::new(repo)
        .max_depth(3)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.path().extension().is_some_and(|ext| ext == "py"))
}

fn which(binary: &str) -> Option<()> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .find(|p| p.join(binary).exists())
            .map(|_| ())
    })
}

async fn run_with_timeout(
    mut cmd: Command,
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    match tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(format!("Failed to run: {e}")),
        Err(_) => Err(format!("Timed out after {timeout_secs}s")),
    }
}

async fn run_pytest(repo: &Path, verbose: bool, timeout_secs: u64) -> GateCheck {
    let start = std::time::Instant::now();
    let use_uv = repo.join("uv.lock").exists();
    let mut cmd = if use_uv {
        let mut c = Command::new("uv");
        c.args(["run", "pytest", "-v", "--tb=short"]);
        c
    } else {
        let mut c = Command::new("pytest");
        c.args(["-v", "--tb=short"]);
        c
    };
    cmd.current_dir(repo);

    run_check(cmd, timeout_secs, start, "pytest", verbose, summarize_pytest_output).await
}

async fn run_ruff(repo: &Path, verbose: bool, timeout_secs: u64) -> GateCheck {
    let start = std::time::Instant::now();
    let use_uv = repo.join("uv.lock").exists();
    let mut cmd = if use_uv {
        let mut c = Command::new("uv");
        c.args(["run", "ruff", "check", "."]);
        c
    } else {
        let mut c = Command::new("ruff");
        c.args(["check", "."]);
        c
    };
    cmd.current_dir(repo);

    run_check(cmd, timeout_secs, start, "ruff", verbose, summarize_ruff_output).await
}

async fn run_mypy(repo: &Path, verbose: bool, timeout_secs: u64) -> GateCheck {
    let start = std::time::Instant::now();
    let mut cmd = Command::new("mypy");
    cmd.arg(".").current_dir(repo);

    run_check(cmd, timeout_secs, start, "mypy", verbose, |out| {
        truncate(out, ONE_FILE_TRUNCATE)
    })
    .await
}

async fn run_npm_test(repo: &Path, verbose: bool, timeout_secs: u64) -> GateCheck {
    let start = std::time::Instant::now();
    let mut cmd = Command::new("npm");
    cmd.arg("test").current_dir(repo);
    run_check(cmd, timeout_secs, start, "npm-test", verbose, |out| {
        truncate(out, 5000)
    })
    .await
}

async fn run_npm_lint(repo: &Path, verbose: bool, timeout_secs: u64) -> GateCheck {
    let start = std::time::Instant::now();
    let mut cmd = Command::new("npm");
    cmd.args(["run", "lint"]).current_dir(repo);
    run_check(cmd, timeout_secs, start, "npm-lint", verbose, |out| {
        truncate(out, ONE_FILE_TRUNCATE)
    })
    .await
}

async fn run_check(
    cmd: Command,
    timeout_secs: u64,
    start: std::time::Instant,
    name: &str,
    verbose: bool,
    summarize: impl Fn(&str) -> String,
) -> GateCheck {
    let duration_ms = || start.elapsed().as_millis() as u64;
    match run_with_timeout(cmd, timeout_secs).await {
        Err(message) if message.starts_with("Failed to run") => GateCheck {
            name: name.to_string(),
            status: GateStatus::Error,
            exit_code: None,
            output: message,
            duration_ms: duration_ms(),
        },
        Err(message) => GateCheck {
            name: name.to_string(),
            status: GateStatus::Error,
            exit_code: None,
            output: message,
            duration_ms: duration_ms(),
        },
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let combined = format!("{stdout}{stderr}");
            let passed = output.status.success();
            let rendered = if verbose { combined.clone() } else { summarize(&combined) };
            GateCheck {
                name: name.to_string(),
                status: if passed { GateStatus::Passed } else { GateStatus::Failed },
                exit_code: output.status.code(),
                output: rendered,
                duration_ms: duration_ms(),
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars / 2).collect();
        let tail: String = text
            .chars()
            .rev()
            .take(max_chars / 2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{head}\n...[truncated]...\n{tail}")
    }
}

fn summarize_pytest_output(output: &str) -> String {
    let summary_line = output
        .lines()
        .rev()
        .find(|l| l.contains('=') && (l.contains("passed") || l.contains("failed") || l.contains("error")));
    if let Some(line) = summary_line {
        return line.to_string();
    }
    let tail: Vec<&str> = output.lines().rev().take(3).filter(|l| !l.trim().is_empty()).collect();
    if !tail.is_empty() {
        return tail.into_iter().rev().collect::<Vec<_>>().join("\n");
    }
    output.chars().take(500).collect()
}

fn summarize_ruff_output(output: &str) -> String {
    if output.trim().is_empty() {
        return "No issues found".to_string();
    }
    if let Some(line) = output.lines().find(|l| l.starts_with("Found")) {
        return line.to_string();
    }
    let count = output.lines().filter(|l| !l.starts_with("Found")).count();
    format!("{count} issue(s) reported")
}
