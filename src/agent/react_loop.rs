//! The ReAct main loop and final-verification retry pipeline.
//!
//! Grounded on the Python predecessor's `_react_loop`/`_run_final_verification`:
//! iterate LLM calls up to `max_iterations`, dispatch tool calls, check for
//! blockers both per-tool-call and at turn end, compact the transcript, then
//! run verification gates with a bounded quick-fix/mini-correction retry
//! before escalating to a human.

use super::{AgentStatus, ReactAgent};
use crate::api::types::{Message, Purpose, ToolResult};
use crate::fix_tracker::Outcome;
use crate::quick_fixes::{apply_quick_fix, find_quick_fix};
use crate::verification;

/// Maps a tool name to the progress phase the loop reports while it runs.
fn tool_phase(tool_name: &str) -> &'static str {
    match tool_name {
        "read_file" | "list_files" | "search_codebase" => "exploring",
        "create_file" => "creating",
        "edit_file" => "editing",
        "run_tests" | "run_command" => "testing",
        _ => "executing",
    }
}

impl ReactAgent {
    /// Runs the iterate-act-observe loop until the model stops requesting
    /// tools, a blocker is found, or `max_iterations` is exhausted.
    pub(super) async fn react_loop(&self, task_id: &str, system_prompt: &str) -> AgentStatus {
        let mut messages: Vec<Message> = Vec::new();
        let mut external_service_attempts: u32 = 0;

        for iteration in 0..self.agent_config.max_iterations {
            let response = match self.complete_llm(&messages, Purpose::Execution, system_prompt).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(task_id, error = %e, "llm completion failed");
                    return AgentStatus::Failed;
                }
            };

            if !response.has_tool_calls() {
                let text = response.message.content.clone();
                if let Some(reason) = self.classify_completion_text(&text) {
                    self.create_text_blocker(task_id, reason).await;
                    return AgentStatus::Blocked;
                }
                return AgentStatus::Completed;
            }

            let tool_calls = response.message.tool_calls.clone().unwrap_or_default();
            let mut results: Vec<ToolResult> = Vec::with_capacity(tool_calls.len());
            let mut blocked_reason: Option<String> = None;

            for call in &tool_calls {
                let phase = tool_phase(&call.name);
                let detail = call
                    .path_hint()
                    .map(|p| format!("{} {p}", call.name))
                    .unwrap_or_else(|| call.name.clone());
                self.emit_progress(task_id, phase, iteration + 1, self.agent_config.max_iterations, &detail)
                    .await;

                let result = self.tools.execute(self.workspace.repo_path(), call).await;

                if result.is_error {
                    let (category, _) = crate::classifier::classify_error_for_blocker(&result.content);
                    if category == crate::classifier::BlockerCategory::ExternalService {
                        external_service_attempts += 1;
                    }
                    let (should_block, reason) =
                        crate::classifier::should_create_blocker(&result.content, external_service_attempts);
                    if should_block {
                        blocked_reason = Some(reason);
                    }
                }

                results.push(result);
            }

            messages.push(Message::assistant_with_tool_calls(
                response.message.content.clone(),
                tool_calls,
            ));
            messages.push(Message::user_with_tool_results(results));

            if let Some(reason) = blocked_reason {
                self.create_text_blocker(task_id, reason).await;
                return AgentStatus::Blocked;
            }

            let (compacted, stats) = self.compactor.lock().unwrap().compact_conversation(&messages);
            messages = compacted;
            if stats.compacted {
                tracing::info!(
                    task_id,
                    tiers = ?stats.tiers_used,
                    tokens_saved = stats.tokens_saved,
                    "compacted conversation"
                );
            }
        }

        tracing::warn!(task_id, "react loop exhausted max_iterations without completing");
        AgentStatus::Failed
    }

    /// Runs verification gates with a bounded retry: quick fix first (no
    /// LLM), then escalation check, then a short mini-ReAct correction loop,
    /// re-running gates each outer attempt up to `max_verification_retries`.
    ///
    /// Returns `(passed, reason)`; `reason` is `Some("escalated_to_blocker")`
    /// when the fix tracker decided to stop retrying and ask a human.
    pub(super) async fn run_final_verification(
        &self,
        task_id: &str,
        system_prompt: &str,
    ) -> (bool, Option<String>) {
        let mut messages: Vec<Message> = Vec::new();

        for attempt in 0..self.agent_config.max_verification_retries {
            self.emit_progress(task_id, "testing", attempt + 1, self.agent_config.max_verification_retries, "Running verification gates")
                .await;

            let result = verification::run(self.workspace.repo_path(), None, false, &self.gate_config).await;
            if result.passed {
                return (true, None);
            }

            let error_summary = result.error_summary();
            let quick_fix = find_quick_fix(&error_summary, self.workspace.repo_path());
            let fix_description = quick_fix
                .as_ref()
                .map(|f| f.description.clone())
                .unwrap_or_else(|| "LLM correction attempt".to_string());
            self.fix_tracker
                .lock()
                .unwrap()
                .record_attempt(&error_summary, None, &fix_description);

            if let Some(escalation) = self.fix_tracker.lock().unwrap().should_escalate(&error_summary) {
                self.create_text_blocker(
                    task_id,
                    format!(
                        "Verification kept failing: {}. Attempted fixes: {}",
                        escalation.reason,
                        escalation.attempted_fixes.join(", ")
                    ),
                )
                .await;
                return (false, Some("escalated_to_blocker".to_string()));
            }

            let fixed = match &quick_fix {
                Some(fix) => self.apply_quick_fix_to_workspace(fix).await,
                None => {
                    self.run_mini_correction_loop(task_id, system_prompt, &error_summary, &mut messages)
                        .await;
                    false
                }
            };

            let outcome = if fixed { Outcome::Success } else { Outcome::Failed };
            self.fix_tracker
                .lock()
                .unwrap()
                .record_outcome(&error_summary, &fix_description, outcome);
        }

        (false, None)
    }

    /// Applies an already-found deterministic fix: package installs go
    /// through `run_command` so they're subject to the same dangerous-command
    /// checks as any other shell invocation; in-file edits go straight to
    /// disk via `apply_quick_fix`.
    async fn apply_quick_fix_to_workspace(&self, fix: &crate::quick_fixes::QuickFix) -> bool {
        if let Some(command) = &fix.command {
            let call = crate::api::types::ToolCall {
                id: "quick-fix".to_string(),
                name: "run_command".to_string(),
                input: serde_json::json!({ "command": command }),
            };
            let result = self.tools.execute(self.workspace.repo_path(), &call).await;
            return !result.is_error;
        }

        apply_quick_fix(fix, self.workspace.repo_path())
    }

    /// A short, bounded ReAct loop dedicated to fixing one verification
    /// failure, isolated from the main loop's iteration budget.
    async fn run_mini_correction_loop(
        &self,
        task_id: &str,
        system_prompt: &str,
        error_summary: &str,
        messages: &mut Vec<Message>,
    ) {
        let correction_prompt = format!(
            "{system_prompt}\n\n## Verification Failed\nFix the following before continuing:\n{error_summary}"
        );

        messages.push(Message::user(format!("Verification failed:\n{error_summary}\n\nFix it.")));

        for turn in 0..self.agent_config.max_fix_turns {
            self.emit_progress(task_id, "fixing", turn + 1, self.agent_config.max_fix_turns, "Attempting correction")
                .await;

            let response = match self.complete_llm(messages, Purpose::Correction, &correction_prompt).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(task_id, error = %e, "correction completion failed");
                    return;
                }
            };

            if !response.has_tool_calls() {
                messages.push(response.message);
                return;
            }

            let tool_calls = response.message.tool_calls.clone().unwrap_or_default();
            let mut results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                let result = self.tools.execute(self.workspace.repo_path(), call).await;
                results.push(result);
            }

            messages.push(Message::assistant_with_tool_calls(response.message.content.clone(), tool_calls));
            messages.push(Message::user_with_tool_results(results));
        }
    }
}
