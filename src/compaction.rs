//! Deterministic conversation compaction: a 3-tier cascade that keeps the
//! ReAct loop's message history under the model's context window without an
//! extra LLM call. Purely mechanical — no summarization model in the loop.
//!
//! Grounded on the conversation-compaction behavior exercised against the
//! Python predecessor's `ReactAgent` (tool-result compaction, intermediate
//! step removal, then a final textual summary of whatever is left).

use crate::api::types::Message;
use crate::config::CompactionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionStats {
    pub compacted: bool,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub tokens_saved: usize,
    pub tiers_used: Vec<String>,
    pub compaction_number: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStats {
    pub total_tokens: usize,
    pub percentage_used: f64,
    pub compaction_count: usize,
    pub context_window_size: usize,
}

/// Estimates a message's token footprint as `chars / 4` over its content,
/// its tool calls' JSON input, and its tool results' content.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let mut chars = message.content.len();
    if let Some(calls) = &message.tool_calls {
        for call in calls {
            chars += call.input.to_string().len();
        }
    }
    if let Some(results) = &message.tool_results {
        for result in results {
            chars += result.content.len();
        }
    }
    chars / 4
}

pub fn total_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

pub struct ConversationCompactor {
    config: CompactionConfig,
    compaction_count: usize,
}

impl ConversationCompactor {
    pub fn new(config: CompactionConfig) -> Self {
        Self { config, compaction_count: 0 }
    }

    pub fn compaction_count(&self) -> usize {
        self.compaction_count
    }

    pub fn get_token_stats(&self, messages: &[Message]) -> TokenStats {
        let total = total_tokens(messages);
        TokenStats {
            total_tokens: total,
            percentage_used: total as f64 / self.config.context_window_tokens as f64,
            compaction_count: self.compaction_count,
            context_window_size: self.config.context_window_tokens,
        }
    }

    /// Runs the cascade if usage is at or above the configured threshold.
    /// Never mutates the caller's slice; always returns a fresh `Vec`.
    pub fn compact_conversation(&mut self, messages: &[Message]) -> (Vec<Message>, CompactionStats) {
        let tokens_before = total_tokens(messages);
        let ratio = tokens_before as f64 / self.config.context_window_tokens as f64;

        if ratio < self.config.threshold {
            return (
                messages.to_vec(),
                CompactionStats {
                    compacted: false,
                    tokens_before,
                    tokens_after: tokens_before,
                    tokens_saved: 0,
                    tiers_used: Vec::new(),
                    compaction_number: self.compaction_count,
                },
            );
        }

        let mut current = messages.to_vec();
        let mut tiers_used = Vec::new();
        let threshold_tokens =
            (self.config.context_window_tokens as f64 * self.config.threshold) as usize;

        let (after_tier1, saved1) = self.compact_tool_results(&current);
        if saved1 > 0 {
            current = after_tier1;
            tiers_used.push("tier1_tool_results".to_string());
        }

        if total_tokens(&current) > threshold_tokens {
            let (after_tier2, saved2) = self.remove_intermediate_steps(&current);
            if saved2 > 0 {
                current = after_tier2;
                tiers_used.push("tier2_intermediate_steps".to_string());
            }
        }

        if total_tokens(&current) > threshold_tokens {
            let target_tokens = threshold_tokens / 2;
            let (after_tier3, saved3) = self.summarize_old_messages(&current, target_tokens);
            if saved3 > 0 {
                current = after_tier3;
                tiers_used.push("tier3_summary".to_string());
            }
        }

        self.compaction_count += 1;
        let tokens_after = total_tokens(&current);

        (
            current,
            CompactionStats {
                compacted: true,
                tokens_before,
                tokens_after,
                tokens_saved: tokens_before.saturating_sub(tokens_after),
                tiers_used,
                compaction_number: self.compaction_count,
            },
        )
    }

    fn preserve_from(&self, len: usize) -> usize {
        len.saturating_sub(self.config.preserve_recent_pairs * 2)
    }

    /// Tier 1: replace non-error tool result content outside the preserve
    /// zone with a short `[Compacted] <tool>: N chars omitted` placeholder.
    fn compact_tool_results(&self, messages: &[Message]) -> (Vec<Message>, usize) {
        let preserve_from = self.preserve_from(messages.len());
        let mut result = messages.to_vec();
        let mut saved = 0usize;

        // The first pair is never a compaction candidate, however old the
        // conversation gets.
        let mut i = 2;
        while i + 1 < preserve_from {
            let tool_names = tool_call_names(&result[i]);
            if let Some(user_msg) = result.get_mut(i + 1) {
                if let Some(results) = user_msg.tool_results.as_mut() {
                    for tr in results.iter_mut() {
                        if tr.is_error {
                            continue;
                        }
                        if tr.content.starts_with("[Compacted]") {
                            continue;
                        }
                        let original_len = tr.content.len();
                        let tool_name = tool_names
                            .get(&tr.tool_call_id)
                            .cloned()
                            .unwrap_or_else(|| "tool".to_string());
                        let placeholder =
                            format!("[Compacted] {tool_name}: {original_len} chars omitted");
                        if placeholder.len() < original_len {
                            saved += original_len - placeholder.len();
                            tr.content = placeholder;
                        }
                    }
                }
            }
            i += 2;
        }

        (result, saved)
    }

    /// Tier 2: drop whole assistant/user pairs outside the preserve zone
    /// when they are redundant: a `read_file` superseded by a later read of
    /// the same path with no intervening write, or a passing (not failing)
    /// `run_tests`/`run_command` result.
    fn remove_intermediate_steps(&self, messages: &[Message]) -> (Vec<Message>, usize) {
        let preserve_from = self.preserve_from(messages.len());
        let mut drop = vec![false; messages.len()];

        let mut last_read_index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        let mut written_since_read: HashSet<String> = HashSet::new();

        let mut i = 0;
        while i + 1 < preserve_from {
            let assistant = &messages[i];
            let user = &messages[i + 1];
            if assistant.role != "assistant" || user.role != "user" {
                i += 2;
                continue;
            }
            let Some(calls) = &assistant.tool_calls else {
                i += 2;
                continue;
            };
            let Some(call) = calls.first() else {
                i += 2;
                continue;
            };

            match call.name.as_str() {
                "read_file" => {
                    if let Some(path) = call.path_hint() {
                        let path = path.to_string();
                        if !written_since_read.contains(&path) {
                            if let Some(&prev) = last_read_index.get(&path) {
                                drop[prev] = true;
                                drop[prev + 1] = true;
                            }
                        }
                        written_since_read.remove(&path);
                        last_read_index.insert(path, i);
                    }
                }
                "edit_file" | "create_file" => {
                    if let Some(path) = call.path_hint() {
                        written_since_read.insert(path.to_string());
                        last_read_index.remove(path);
                    }
                }
                "run_tests" | "run_command" => {
                    if let Some(result) = user.tool_results.as_ref().and_then(|r| r.first()) {
                        if result.content.contains("passed")
                            && !result.content.contains("failed")
                            && !result.content.contains("error")
                        {
                            drop[i] = true;
                            drop[i + 1] = true;
                        }
                    }
                }
                _ => {}
            }
            i += 2;
        }

        // The first pair is never a compaction candidate, however it was
        // classified above.
        drop[0] = false;
        if drop.len() > 1 {
            drop[1] = false;
        }

        let saved_count = drop.iter().filter(|d| **d).count();
        if saved_count == 0 {
            return (messages.to_vec(), 0);
        }

        let kept: Vec<Message> = messages
            .iter()
            .zip(drop.iter())
            .filter(|(_, d)| !**d)
            .map(|(m, _)| m.clone())
            .collect();

        let saved = total_tokens(messages) - total_tokens(&kept);
        (kept, saved)
    }

    /// Tier 3: collapse everything outside the preserve zone into a single
    /// `[Summary]` message naming touched files and any errors encountered.
    /// Prior `[Summary]` messages being folded over are quoted verbatim.
    fn summarize_old_messages(&self, messages: &[Message], _target_tokens: usize) -> (Vec<Message>, usize) {
        let preserve_from = self.preserve_from(messages.len());
        if preserve_from == 0 {
            return (messages.to_vec(), 0);
        }

        let old = &messages[..preserve_from];
        let recent = &messages[preserve_from..];

        let mut files: Vec<String> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut prior_summary: Option<String> = None;

        for msg in old {
            if msg.role == "user" && msg.content.starts_with("[Summary]") {
                prior_summary = Some(msg.content.clone());
                continue;
            }
            if let Some(calls) = &msg.tool_calls {
                for call in calls {
                    if let Some(path) = call.path_hint() {
                        if !files.contains(&path.to_string()) {
                            files.push(path.to_string());
                        }
                    }
                }
            }
            if let Some(results) = &msg.tool_results {
                for tr in results {
                    if tr.is_error {
                        let first_line = tr.content.lines().next().unwrap_or(&tr.content);
                        errors.push(first_line.to_string());
                    }
                }
            }
        }

        let mut summary = String::from("[Summary] ");
        if let Some(prior) = &prior_summary {
            summary.push_str("Folded from prior summaries: ");
            summary.push_str(prior.trim_start_matches("[Summary]").trim());
            summary.push_str(". ");
        }
        if !files.is_empty() {
            summary.push_str(&format!("Touched files: {}. ", files.join(", ")));
        }
        if !errors.is_empty() {
            summary.push_str(&format!("Errors encountered: {}. ", errors.join("; ")));
        }
        if files.is_empty() && errors.is_empty() {
            summary.push_str(&format!("{} earlier step(s) omitted.", old.len() / 2));
        }

        let summary_msg = Message::user(summary);
        let mut result = vec![summary_msg];
        result.extend(recent.iter().cloned());

        let saved = total_tokens(messages) - total_tokens(&result);
        (result, saved)
    }
}

fn tool_call_names(assistant: &Message) -> std::collections::HashMap<String, String> {
    assistant
        .tool_calls
        .as_ref()
        .map(|calls| calls.iter().map(|c| (c.id.clone(), c.name.clone())).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ToolCall, ToolResult};
    use serde_json::json;

    fn make_pair(tool_name: &str, path: Option<&str>, content: &str, is_error: bool, id: &str) -> (Message, Message) {
        let mut input = json!({});
        if let Some(p) = path {
            input = json!({"path": p});
        }
        let call = ToolCall { id: id.to_string(), name: tool_name.to_string(), input };
        let assistant = Message::assistant_with_tool_calls("", vec![call]);
        let result = if is_error {
            ToolResult::error(id, content)
        } else {
            ToolResult::ok(id, content)
        };
        let user = Message::user_with_tool_results(vec![result]);
        (assistant, user)
    }

    #[test]
    fn test_below_threshold_is_noop() {
        let mut compactor = ConversationCompactor::new(CompactionConfig::default());
        let messages = vec![Message::assistant("hi")];
        let (result, stats) = compactor.compact_conversation(&messages);
        assert!(!stats.compacted);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_tier1_compacts_old_tool_results_preserving_recent() {
        let mut config = CompactionConfig::default();
        config.context_window_tokens = 100;
        config.threshold = 0.1;
        config.preserve_recent_pairs = 2;
        let mut compactor = ConversationCompactor::new(config);

        let mut messages = Vec::new();
        for i in 0..5 {
            let (a, u) = make_pair("read_file", Some(&format!("f{i}.py")), &"x".repeat(200), false, &format!("tc{i}"));
            messages.push(a);
            messages.push(u);
        }

        let (result, stats) = compactor.compact_conversation(&messages);
        assert!(stats.compacted);
        assert!(stats.tokens_saved > 0);
        assert_eq!(compactor.compaction_count(), 1);
        let _ = result;
    }

    #[test]
    fn test_tier1_preserves_error_results() {
        let config = CompactionConfig::default();
        let compactor = ConversationCompactor::new(config);
        let mut messages = Vec::new();
        let (a, u) = make_pair("run_command", None, "ImportError: no module", true, "tc-err");
        messages.push(a);
        messages.push(u);
        for i in 0..5 {
            let (a, u) = make_pair("read_file", Some("same.py"), "c", false, &format!("tc{i}"));
            messages.push(a);
            messages.push(u);
        }
        let (result, _) = compactor.compact_tool_results(&messages);
        let first_user = &result[1];
        assert_eq!(
            first_user.tool_results.as_ref().unwrap()[0].content,
            "ImportError: no module"
        );
    }

    #[test]
    fn test_tier2_removes_redundant_reads_of_same_file() {
        let config = CompactionConfig { preserve_recent_pairs: 2, ..CompactionConfig::default() };
        let compactor = ConversationCompactor::new(config);
        let mut messages = Vec::new();
        // A padding pair at index 0 keeps the redundant-read pair below out
        // of the protected first-pair slot.
        let (a, u) = make_pair("read_file", Some("pad.py"), "c", false, "tc-pad");
        messages.push(a);
        messages.push(u);
        let (a, u) = make_pair("read_file", Some("main.py"), "old", false, "tc-old");
        messages.push(a);
        messages.push(u);
        let (a, u) = make_pair("read_file", Some("main.py"), "new", false, "tc-new");
        messages.push(a);
        messages.push(u);
        for i in 0..2 {
            let (a, u) = make_pair("read_file", Some("x.py"), "c", false, &format!("tc{i}"));
            messages.push(a);
            messages.push(u);
        }

        let (result, saved) = compactor.remove_intermediate_steps(&messages);
        assert!(saved > 0);
        assert!(result.len() < messages.len());
    }

    #[test]
    fn test_tier2_keeps_passing_result_with_unrelated_error_text() {
        let config = CompactionConfig { preserve_recent_pairs: 0, ..CompactionConfig::default() };
        let compactor = ConversationCompactor::new(config);
        let mut messages = Vec::new();
        // A padding pair occupies index 0 so it doesn't benefit from the
        // separate "first pair is never removed" guard below.
        let (a, u) = make_pair("read_file", Some("pad.py"), "c", false, "tc-pad");
        messages.push(a);
        messages.push(u);
        let (a, u) = make_pair("run_tests", None, "3 passed, 0 failed, 1 error captured in log", false, "tc-1");
        messages.push(a);
        messages.push(u);
        let (a, u) = make_pair("run_tests", None, "3 passed, 0 failed", false, "tc-2");
        messages.push(a);
        messages.push(u);

        let (result, _) = compactor.remove_intermediate_steps(&messages);
        assert_eq!(result.len(), messages.len() - 2);
        assert!(result.iter().any(|m| m
            .tool_results
            .as_ref()
            .is_some_and(|rs| rs.iter().any(|r| r.content.contains("error")))));
    }

    #[test]
    fn test_tier1_never_compacts_first_pair() {
        let mut config = CompactionConfig::default();
        config.preserve_recent_pairs = 0;
        let compactor = ConversationCompactor::new(config);
        let mut messages = Vec::new();
        let (a, u) = make_pair("read_file", Some("first.py"), &"x".repeat(200), false, "tc-first");
        messages.push(a);
        messages.push(u);

        let (result, saved) = compactor.compact_tool_results(&messages);
        assert_eq!(saved, 0);
        assert_eq!(result[1].tool_results.as_ref().unwrap()[0].content, "x".repeat(200));
    }

    #[test]
    fn test_tier2_never_drops_first_pair_even_when_superseded() {
        let config = CompactionConfig { preserve_recent_pairs: 0, ..CompactionConfig::default() };
        let compactor = ConversationCompactor::new(config);
        let mut messages = Vec::new();
        let (a, u) = make_pair("read_file", Some("main.py"), "old", false, "tc-old");
        messages.push(a);
        messages.push(u);
        let (a, u) = make_pair("read_file", Some("main.py"), "new", false, "tc-new");
        messages.push(a);
        messages.push(u);

        let (result, _) = compactor.remove_intermediate_steps(&messages);
        assert_eq!(result.len(), messages.len());
    }

    #[test]
    fn test_tier2_keeps_reads_separated_by_edit() {
        let config = CompactionConfig { preserve_recent_pairs: 2, ..CompactionConfig::default() };
        let compactor = ConversationCompactor::new(config);
        let mut messages = Vec::new();
        let (a, u) = make_pair("read_file", Some("main.py"), "before", false, "tc-r1");
        messages.push(a);
        messages.push(u);
        let (a, u) = make_pair("edit_file", Some("main.py"), "applied", false, "tc-edit");
        messages.push(a);
        messages.push(u);
        let (a, u) = make_pair("read_file", Some("main.py"), "after", false, "tc-r2");
        messages.push(a);
        messages.push(u);
        for i in 0..2 {
            let (a, u) = make_pair("read_file", Some("x.py"), "c", false, &format!("tc{i}"));
            messages.push(a);
            messages.push(u);
        }

        let (_, saved) = compactor.remove_intermediate_steps(&messages);
        assert_eq!(saved, 0);
    }

    #[test]
    fn test_tier3_creates_summary_message_with_file_paths() {
        let config = CompactionConfig { preserve_recent_pairs: 2, ..CompactionConfig::default() };
        let compactor = ConversationCompactor::new(config);
        let mut messages = Vec::new();
        let (a, u) = make_pair("read_file", Some("important.py"), &"x".repeat(100), false, "tc-imp");
        messages.push(a);
        messages.push(u);
        for i in 0..2 {
            let (a, u) = make_pair("read_file", Some("x.py"), "c", false, &format!("tc{i}"));
            messages.push(a);
            messages.push(u);
        }

        let (result, saved) = compactor.summarize_old_messages(&messages, 10);
        assert!(saved > 0);
        assert_eq!(result[0].role, "user");
        assert!(result[0].content.starts_with("[Summary]"));
        assert!(result[0].content.contains("important.py"));
    }

    #[test]
    fn test_does_not_mutate_caller_slice() {
        let config = CompactionConfig { context_window_tokens: 50, threshold: 0.1, ..CompactionConfig::default() };
        let mut compactor = ConversationCompactor::new(config);
        let mut messages = Vec::new();
        for i in 0..6 {
            let (a, u) = make_pair("read_file", Some("f.py"), &"x".repeat(100), false, &format!("tc{i}"));
            messages.push(a);
            messages.push(u);
        }
        let original_len = messages.len();
        compactor.compact_conversation(&messages);
        assert_eq!(messages.len(), original_len);
    }

    #[test]
    fn test_get_token_stats_calculates_percentage() {
        let config = CompactionConfig { context_window_tokens: 1000, ..CompactionConfig::default() };
        let compactor = ConversationCompactor::new(config);
        let messages = vec![Message::assistant("a".repeat(400))];
        let stats = compactor.get_token_stats(&messages);
        assert_eq!(stats.total_tokens, 100);
        assert!((stats.percentage_used - 0.1).abs() < 1e-9);
    }
}
