//! Per-run diagnostic log holding the captured output of every external command.
//!
//! This is a product artifact the user is pointed at when a task fails; it is
//! unaffected by `RUST_LOG` (see [`crate::logging`] for developer tracing).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::core::types::Mode;
use crate::io::process::{ToolOutput, ToolRequest};

/// Append-only log file for one run.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `cursor-acp-installer-<mode>-<timestamp>.log` in `dir`.
    pub fn in_dir(dir: &Path, mode: Mode) -> Self {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        Self::new(dir.join(format!(
            "cursor-acp-installer-{}-{stamp}.log",
            mode.as_str()
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a free-form line.
    pub fn note(&self, line: &str) {
        self.append(&format!("{line}\n"));
    }

    /// Append the command line, exit status, and captured output of one invocation.
    pub fn command(&self, request: &ToolRequest, output: &ToolOutput) {
        let mut buf = format!(
            "=== {} (in {}) ===\n",
            request.command_line(),
            request.workdir.display()
        );
        buf.push_str(&output.combined());
        if !buf.ends_with('\n') {
            buf.push('\n');
        }
        if output.timed_out {
            buf.push_str("[timed out]\n");
        } else {
            buf.push_str(&format!("[exit code {:?}]\n", output.exit_code));
        }
        self.append(&buf);
    }

    // Logging must never fail a task; problems are reported through tracing instead.
    fn append(&self, contents: &str) {
        if let Some(parent) = self.path.parent()
            && let Err(err) = fs::create_dir_all(parent)
        {
            warn!(err = %err, path = %parent.display(), "failed to create run log dir");
            return;
        }
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(contents.as_bytes()));
        if let Err(err) = result {
            warn!(err = %err, path = %self.path.display(), "failed to write run log");
        }
    }
}
