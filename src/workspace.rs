//! Workspace identity: the repository directory an agent run operates on.

use std::path::{Path, PathBuf};

/// An immutable handle to the repository directory a task executes against.
///
/// Every tool call and gate run is rooted at `repo_path`; `state_dir` is
/// where run logs and other run-scoped artifacts live
/// (`<repo_path>/.codeframe`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    id: String,
    repo_path: PathBuf,
    state_dir: PathBuf,
}

impl Workspace {
    pub fn new(id: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        let repo_path = repo_path.into();
        let state_dir = repo_path.join(".codeframe");
        Self {
            id: id.into(),
            repo_path,
            state_dir,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Path to the append-only output log for a given run id.
    pub fn run_log_path(&self, run_id: &str) -> PathBuf {
        self.state_dir.join("runs").join(run_id).join("output.log")
    }
}
