//! The ReAct agent: the top-level `run(task_id)` entry point, system-prompt
//! assembly, and the public [`AgentStatus`] state machine.
//!
//! Grounded exactly on the Python predecessor's `ReactAgent.run`/
//! `_build_system_prompt`, and on the teacher's split between orchestration
//! (this file) and loop mechanics ([`react_loop`]).

pub mod react_loop;

use crate::api::types::{Message, Purpose};
use crate::api::LlmProvider;
use crate::classifier::should_create_blocker;
use crate::compaction::ConversationCompactor;
use crate::config::{AgentConfig, GateConfig};
use crate::events::{EventPublisher, ExecutionEvent};
use crate::fix_tracker::FixAttemptTracker;
use crate::store::TaskStore;
use crate::tools::ToolRegistry;
use crate::workspace::Workspace;
use std::sync::Arc;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Completed,
    Blocked,
    Failed,
}

const LAYER_1_RULES: &str = "\
You are CodeFRAME, an autonomous software engineering agent.

## Rules

- ALWAYS read a file before editing it. Never assume file contents.
- Make small, targeted edits. Do not rewrite entire files.
- For NEW files use create_file. For EXISTING files use edit_file with search/replace.
- Run tests after implementing each major feature, not after every line change.
- Keep solutions simple. Do not add features beyond what was asked.

## When You're Done

Respond with a brief summary. Do not call any more tools.

## When You're Stuck

If you encounter a genuine blocker (conflicting requirements, missing credentials,
unclear business logic), explain clearly. Do NOT stop for trivial decisions.
";

/// Minimal task framing the loop needs for its system prompt. A real
/// `TaskContext` (file tree, PRD, preferences) is assembled by an external
/// loader; this is the subset the core itself consumes.
#[derive(Debug, Clone, Default)]
pub struct TaskBrief {
    pub title: String,
    pub description: String,
    pub tech_stack: Option<String>,
    pub answered_blockers: Vec<(String, String)>,
}

pub struct ReactAgent {
    pub(crate) workspace: Workspace,
    pub(crate) llm_provider: Arc<dyn LlmProvider>,
    pub(crate) tools: ToolRegistry,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) event_publisher: Option<Arc<EventPublisher>>,
    pub(crate) agent_config: AgentConfig,
    pub(crate) gate_config: GateConfig,
    pub(crate) compactor: Mutex<ConversationCompactor>,
    pub(crate) fix_tracker: Mutex<FixAttemptTracker>,
    pub(crate) blocker_id: Mutex<Option<String>>,
}

impl ReactAgent {
    pub fn new(
        workspace: Workspace,
        llm_provider: Arc<dyn LlmProvider>,
        store: Arc<dyn TaskStore>,
        agent_config: AgentConfig,
        compaction_config: crate::config::CompactionConfig,
        gate_config: GateConfig,
    ) -> Self {
        Self {
            workspace,
            llm_provider,
            tools: ToolRegistry::new(),
            store,
            event_publisher: None,
            agent_config,
            gate_config,
            compactor: Mutex::new(ConversationCompactor::new(compaction_config)),
            fix_tracker: Mutex::new(FixAttemptTracker::new()),
            blocker_id: Mutex::new(None),
        }
    }

    pub fn with_event_publisher(mut self, publisher: Arc<EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    pub fn blocker_id(&self) -> Option<String> {
        self.blocker_id.lock().unwrap().clone()
    }

    /// Runs the full workflow for `task_id`: load the task, build the system
    /// prompt, run the ReAct loop, then final verification with retry.
    /// Every unhandled failure inside this method is caught and reported as
    /// `AgentStatus::Failed` — it never propagates as an error to the caller.
    pub async fn run(&self, task_id: &str, brief: &TaskBrief) -> AgentStatus {
        self.emit_progress(task_id, "exploring", 0, 0, "Loading task context").await;

        let task = match self.store.get(task_id).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(task_id, error = %e, "failed to load task");
                self.complete(task_id, false, "task_load_failed").await;
                return AgentStatus::Failed;
            }
        };

        let system_prompt = self.build_system_prompt(&task, brief);

        let status = self.react_loop(task_id, &system_prompt).await;
        match status {
            AgentStatus::Failed => {
                self.complete(task_id, false, "max_iterations_reached").await;
                return status;
            }
            AgentStatus::Blocked => {
                self.complete(task_id, false, "blocked").await;
                return status;
            }
            AgentStatus::Completed => {}
        }

        let (passed, reason) = self.run_final_verification(task_id, &system_prompt).await;
        if passed {
            self.complete(task_id, true, "completed").await;
            return AgentStatus::Completed;
        }

        if reason.as_deref() == Some("escalated_to_blocker") {
            self.complete(task_id, false, "blocked").await;
            return AgentStatus::Blocked;
        }

        self.complete(task_id, false, "verification_failed").await;
        AgentStatus::Failed
    }

    fn build_system_prompt(&self, task: &crate::store::Task, brief: &TaskBrief) -> String {
        let mut sections = vec![LAYER_1_RULES.to_string()];

        if let Some(stack) = &brief.tech_stack {
            sections.push(format!("## Project Tech Stack\n{stack}"));
        }

        sections.push(format!(
            "## Current Task\n**Title:** {}\n**Description:** {}",
            if brief.title.is_empty() { &task.title } else { &brief.title },
            if brief.description.is_empty() { &task.description } else { &brief.description },
        ));

        if !brief.answered_blockers.is_empty() {
            let mut lines = vec!["## Previous Clarifications".to_string()];
            for (q, a) in &brief.answered_blockers {
                lines.push(format!("**Q:** {q}"));
                lines.push(format!("**A:** {a}"));
            }
            sections.push(lines.join("\n"));
        }

        sections.join("\n\n")
    }

    pub(crate) async fn emit_progress(
        &self,
        task_id: &str,
        phase: &str,
        step: usize,
        total_steps: usize,
        message: &str,
    ) {
        tracing::info!(task_id, phase, message, "agent progress");
        if let Some(publisher) = &self.event_publisher {
            publisher
                .publish(
                    task_id,
                    ExecutionEvent::Progress {
                        task_id: task_id.to_string(),
                        phase: phase.to_string(),
                        step,
                        total_steps,
                    },
                )
                .await;
        }
    }

    async fn complete(&self, task_id: &str, success: bool, summary: &str) {
        if let Some(publisher) = &self.event_publisher {
            publisher.complete_task(task_id, success, summary).await;
        }
    }

    pub(crate) async fn create_text_blocker(&self, task_id: &str, question: String) {
        match self.store.create(self.workspace.id(), &question, Some(task_id)).await {
            Ok(blocker) => {
                *self.blocker_id.lock().unwrap() = Some(blocker.id);
            }
            Err(e) => {
                tracing::warn!(task_id, error = %e, "failed to create blocker, continuing as blocked anyway");
            }
        }
    }

    pub(crate) fn classify_completion_text(&self, text: &str) -> Option<String> {
        let (should_block, reason) = should_create_blocker(text, 0);
        if should_block {
            Some(reason)
        } else {
            None
        }
    }

    pub(crate) async fn complete_llm(
        &self,
        messages: &[Message],
        purpose: Purpose,
        system: &str,
    ) -> Result<crate::api::types::CompletionResponse, crate::errors::CodeframeError> {
        let tools = self.tools.definitions();
        self.llm_provider.complete(messages, purpose, &tools, 4096, 0.0, system).await
    }
}
