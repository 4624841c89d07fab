//! Tool registry and dispatcher: the seven tools the agent loop can call.

pub mod create_file;
pub mod edit_file;
pub mod list_files;
pub mod read_file;
pub mod run_command;
pub mod search_codebase;

use crate::api::types::{ToolCall, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// A single tool the model can call. Implementations must never panic or
/// propagate an error out of `execute` for expected failure modes (missing
/// file, bad regex, non-zero exit code) — those become `ToolResult { is_error: true, .. }`.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, workspace_root: &Path, input: &Value) -> (String, bool);
}

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };
        registry.register(Box::new(read_file::ReadFile));
        registry.register(Box::new(list_files::ListFiles));
        registry.register(Box::new(search_codebase::SearchCodebase));
        registry.register(Box::new(edit_file::EditFile));
        registry.register(Box::new(create_file::CreateFile));
        registry.register(Box::new(run_command::RunCommand));
        registry.register(Box::new(run_tests::RunTests));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Dispatches a tool call, never propagating an error: an unknown tool
    /// name or a handler-internal failure both become an error `ToolResult`.
    pub async fn execute(&self, workspace_root: &Path, call: &ToolCall) -> ToolResult {
        match self.tools.get(&call.name) {
            None => ToolResult::error(&call.id, format!("Unknown tool: {}", call.name)),
            Some(tool) => {
                let (content, is_error) = tool.execute(workspace_root, &call.input).await;
                ToolResult {
                    tool_call_id: call.id.clone(),
                    content,
                    is_error,
                }
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
