//! Tracks fix attempts across a single run, so the ReAct loop can decide
//! when to stop retrying and escalate to a human.
//!
//! Grounded exactly on the Python predecessor's fix-tracker module:
//! normalization, hashing, per-error/per-file/total escalation rules.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub const MAX_SAME_ERROR_ATTEMPTS: u32 = 3;
pub const MAX_SAME_FILE_ATTEMPTS: u32 = 3;
pub const MAX_TOTAL_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixAttempt {
    pub error_hash: String,
    pub error_type: String,
    pub file: Option<String>,
    pub fix_description: String,
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub reason: String,
    pub attempted_fixes: Vec<String>,
}

/// Collapses incidental differences (line numbers, paths, addresses,
/// timestamps, long string literals) so repeat occurrences of "the same"
/// error hash identically.
pub fn normalize_error(error: &str) -> String {
    let mut text = error.to_lowercase();

    text = replace_regex(&text, r"(?i):\d+:", ":N:");
    text = replace_regex(&text, r"line \d+", "line N");
    text = replace_regex(&text, r"0x[0-9a-f]+", "0xADDR");
    text = replace_regex(
        &text,
        r"\d{4}-\d{2}-\d{2}[t ]\d{2}:\d{2}:\d{2}(\.\d+)?",
        "<timestamp>",
    );
    text = replace_regex(&text, r"/[\w./\-]+/([\w.\-]+)", "$1");
    text = replace_regex(&text, r#""[^"]{21,}""#, "\"...\"");
    text = replace_regex(&text, r"\s+", " ");

    text.trim().to_string()
}

fn replace_regex(text: &str, pattern: &str, replacement: &str) -> String {
    regex::Regex::new(pattern)
        .map(|re| re.replace_all(text, replacement).into_owned())
        .unwrap_or_else(|_| text.to_string())
}

/// SHA-256 of the normalized error, truncated to the first 12 hex chars.
pub fn hash_error(error: &str) -> String {
    let normalized = normalize_error(error);
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)[..12].to_string()
}

/// Extracts a coarse error-type label (e.g. "SyntaxError", "AssertionError")
/// from the first recognizable `XError`/`XException` token, else "Unknown".
pub fn extract_error_type(error: &str) -> String {
    regex::Regex::new(r"\b([A-Z][A-Za-z]*(?:Error|Exception))\b")
        .ok()
        .and_then(|re| re.captures(error))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[derive(Debug, Default)]
pub struct FixAttemptTracker {
    attempts: Vec<FixAttempt>,
}

impl FixAttemptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new pending attempt (outcome not yet known).
    pub fn record_attempt(&mut self, error: &str, file: Option<&str>, fix_description: &str) {
        self.attempts.push(FixAttempt {
            error_hash: hash_error(error),
            error_type: extract_error_type(error),
            file: file.map(|s| s.to_string()),
            fix_description: fix_description.to_string(),
            outcome: None,
        });
    }

    /// Sets the outcome on the most recent pending attempt matching both
    /// `error` and `fix_description` (case-insensitive), scanning from the
    /// end. No-op if none is pending.
    pub fn record_outcome(&mut self, error: &str, fix_description: &str, outcome: Outcome) {
        let hash = hash_error(error);
        if let Some(attempt) = self.attempts.iter_mut().rev().find(|a| {
            a.error_hash == hash
                && a.outcome.is_none()
                && a.fix_description.eq_ignore_ascii_case(fix_description)
        }) {
            attempt.outcome = Some(outcome);
        }
    }

    /// Whether this normalized error + fix-description pair has been
    /// attempted before (case-insensitive), regardless of outcome.
    pub fn was_attempted(&self, error: &str, fix_description: &str) -> bool {
        let hash = hash_error(error);
        self.attempts
            .iter()
            .any(|a| a.error_hash == hash && a.fix_description.eq_ignore_ascii_case(fix_description))
    }

    fn failed_count_by_hash(&self, hash: &str) -> u32 {
        self.attempts
            .iter()
            .filter(|a| a.error_hash == hash && a.outcome == Some(Outcome::Failed))
            .count() as u32
    }

    fn failed_count_by_file(&self, file: &str) -> u32 {
        self.attempts
            .iter()
            .filter(|a| a.file.as_deref() == Some(file) && a.outcome == Some(Outcome::Failed))
            .count() as u32
    }

    fn total_failures(&self) -> u32 {
        self.attempts
            .iter()
            .filter(|a| a.outcome == Some(Outcome::Failed))
            .count() as u32
    }

    /// Decides whether the run should stop retrying and escalate, applying
    /// three rules: the same normalized error failing at least
    /// `MAX_SAME_ERROR_ATTEMPTS` times, the same file accumulating at least
    /// `MAX_SAME_FILE_ATTEMPTS` failures, or `MAX_TOTAL_FAILURES` failures
    /// total across the run.
    pub fn should_escalate(&self, error: &str) -> Option<Escalation> {
        let hash = hash_error(error);
        let same_error = self.failed_count_by_hash(&hash);
        if same_error >= MAX_SAME_ERROR_ATTEMPTS {
            return Some(Escalation {
                reason: format!(
                    "Same error failed {same_error} times: {}",
                    extract_error_type(error)
                ),
                attempted_fixes: self.fix_descriptions_for_hash(&hash),
            });
        }

        if let Some(file) = self.attempts.iter().rev().find_map(|a| {
            if a.error_hash == hash {
                a.file.clone()
            } else {
                None
            }
        }) {
            let same_file = self.failed_count_by_file(&file);
            if same_file >= MAX_SAME_FILE_ATTEMPTS {
                return Some(Escalation {
                    reason: format!("File '{file}' failed {same_file} times"),
                    attempted_fixes: self.fix_descriptions_for_file(&file),
                });
            }
        }

        let total = self.total_failures();
        if total >= MAX_TOTAL_FAILURES {
            return Some(Escalation {
                reason: format!("{total} total failures this run"),
                attempted_fixes: self
                    .attempts
                    .iter()
                    .map(|a| a.fix_description.clone())
                    .collect(),
            });
        }

        None
    }

    fn fix_descriptions_for_hash(&self, hash: &str) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| a.error_hash == hash)
            .map(|a| a.fix_description.clone())
            .collect()
    }

    fn fix_descriptions_for_file(&self, file: &str) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| a.file.as_deref() == Some(file))
            .map(|a| a.fix_description.clone())
            .collect()
    }

    /// Diagnostic context for building an escalation blocker's question.
    pub fn get_blocker_context(&self) -> HashMap<String, serde_json::Value> {
        let mut ctx = HashMap::new();
        ctx.insert(
            "total_run_failures".to_string(),
            serde_json::json!(self.total_failures()),
        );
        ctx.insert(
            "total_attempts".to_string(),
            serde_json::json!(self.attempts.len()),
        );
        ctx
    }

    pub fn reset(&mut self) {
        self.attempts.clear();
    }

    pub fn to_snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            attempts: self.attempts.clone(),
        }
    }

    pub fn from_snapshot(snapshot: TrackerSnapshot) -> Self {
        Self {
            attempts: snapshot.attempts,
        }
    }
}

/// Serializable snapshot of tracker state, for diagnostics or logging.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerSnapshot {
    pub attempts: Vec<FixAttempt>,
}
