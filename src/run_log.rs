//! File-based output logging for `cf work follow`-style tailing.
//! Headless — writes land at `<repo>/.codeframe/runs/<run_id>/output.log`.
//!
//! Grounded on the Python predecessor's `RunOutputLogger`/`tail_run_output`/
//! `get_latest_lines`: every write is immediately flushed so a concurrent
//! tail sees it without buffering surprises.

use crate::workspace::Workspace;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

pub struct RunOutputLogger {
    file: File,
}

impl RunOutputLogger {
    pub fn new(workspace: &Workspace, run_id: &str) -> std::io::Result<Self> {
        let path = workspace.run_log_path(run_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn write(&mut self, message: &str) -> std::io::Result<()> {
        self.file.write_all(message.as_bytes())?;
        self.file.flush()
    }

    pub fn write_timestamped(&mut self, message: &str) -> std::io::Result<()> {
        let timestamp = Utc::now().format("%H:%M:%S");
        self.write(&format!("[{timestamp}] {message}\n"))
    }
}

fn run_output_path(workspace: &Workspace, run_id: &str) -> PathBuf {
    workspace.run_log_path(run_id)
}

pub fn run_output_exists(workspace: &Workspace, run_id: &str) -> bool {
    run_output_path(workspace, run_id).exists()
}

/// Returns the last `count` lines and the total line count.
pub fn get_latest_lines_with_count(
    workspace: &Workspace,
    run_id: &str,
    count: usize,
) -> (Vec<String>, usize) {
    let path = run_output_path(workspace, run_id);
    let Ok(file) = File::open(&path) else {
        return (Vec::new(), 0);
    };
    let lines: Vec<String> = BufReader::new(file).lines().map_while(Result::ok).collect();
    let total = lines.len();
    if count >= total {
        return (lines, total);
    }
    (lines[total - count..].to_vec(), total)
}

pub fn get_latest_lines(workspace: &Workspace, run_id: &str, count: usize) -> Vec<String> {
    get_latest_lines_with_count(workspace, run_id, count).0
}
