use thiserror::Error;

/// The central error type for the CodeFRAME agent core.
///
/// Tool-level failures are almost never propagated as this error — they are
/// captured as `ToolResult { is_error: true, .. }` so the model can observe
/// and react to them. This type exists for failures that must end the run
/// itself: malformed input to a tool before dispatch, a workspace-safety
/// violation, a subprocess that could not even be spawned, a broken model
/// transport, or a programming-bug invariant violation.
#[derive(Error, Debug)]
pub enum CodeframeError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Workspace safety error: {0}")]
    WorkspaceSafety(#[from] WorkspaceSafetyError),

    #[error("Subprocess error: {0}")]
    Subprocess(#[from] SubprocessError),

    #[error("Model provider error: {0}")]
    Model(#[from] ModelError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field '{field}' for tool '{tool}'")]
    MissingField { tool: String, field: String },

    #[error("Invalid range: start_line ({start}) > end_line ({end})")]
    InvalidRange { start: u64, end: u64 },

    #[error("Invalid line number: {0} (lines are 1-indexed)")]
    InvalidLineNumber(u64),

    #[error("'{field}' must be a non-empty list")]
    EmptyList { field: String },

    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),
}

#[derive(Error, Debug)]
pub enum WorkspaceSafetyError {
    #[error("Path escapes workspace: {path}")]
    PathEscapesWorkspace { path: String },

    #[error("Absolute paths are not allowed: {path}")]
    AbsolutePath { path: String },

    #[error("Symlink target escapes workspace: {path}")]
    SymlinkEscape { path: String },

    #[error("Path resolution error for '{path}': {message}")]
    ResolutionFailed { path: String, message: String },

    #[error("Refused to execute dangerous command (matched pattern '{pattern}')")]
    DangerousCommand { pattern: String },
}

#[derive(Error, Debug)]
pub enum SubprocessError {
    #[error("Command timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Failed to spawn subprocess: {0}")]
    SpawnFailed(String),

    #[error("Tool binary not found: {0}")]
    BinaryMissing(String),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("LLM transport error: {0}")]
    Transport(String),

    #[error("LLM call timed out")]
    Timeout,

    #[error("Model returned an unparseable response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, CodeframeError>;

impl From<std::io::Error> for CodeframeError {
    fn from(e: std::io::Error) -> Self {
        CodeframeError::Subprocess(SubprocessError::SpawnFailed(e.to_string()))
    }
}

impl From<regex::Error> for CodeframeError {
    fn from(e: regex::Error) -> Self {
        CodeframeError::Validation(ValidationError::InvalidRegex(e.to_string()))
    }
}

impl From<serde_json::Error> for CodeframeError {
    fn from(e: serde_json::Error) -> Self {
        CodeframeError::Model(ModelError::MalformedResponse(e.to_string()))
    }
}

impl From<tokio::time::error::Elapsed> for CodeframeError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CodeframeError::Subprocess(SubprocessError::Timeout { seconds: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_chains_through_from() {
        let err: CodeframeError = WorkspaceSafetyError::AbsolutePath {
            path: "/etc/passwd".to_string(),
        }
        .into();
        assert!(err.to_string().contains("/etc/passwd"));
    }

    #[test]
    fn test_validation_error_message() {
        let err = ValidationError::InvalidRange { start: 10, end: 5 };
        assert_eq!(
            err.to_string(),
            "Invalid range: start_line (10) > end_line (5)"
        );
    }

    #[test]
    fn test_regex_error_converts_to_validation() {
        let re_err = regex::Regex::new("[").unwrap_err();
        let err: CodeframeError = re_err.into();
        assert!(matches!(err, CodeframeError::Validation(_)));
    }
}
