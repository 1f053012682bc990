//! Shared deterministic types for the installer pipeline.
//!
//! These carry no I/O and describe the observable state of a run: which mode
//! it is, where each task stands, and what went wrong.

use std::path::PathBuf;

use crate::error::{ErrorKind, InstallError};

/// Whether a run installs or removes the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Install,
    Uninstall,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Install => "install",
            Mode::Uninstall => "uninstall",
        }
    }
}

/// Lifecycle of a single task. Only the pipeline driver moves a task between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }
}

/// User-facing description of a failed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub kind: ErrorKind,
    /// Run log holding the captured output of the commands the task ran.
    pub log_reference: Option<PathBuf>,
}

impl ErrorInfo {
    pub fn from_error(err: &InstallError, log_reference: Option<PathBuf>) -> Self {
        Self {
            message: err.to_string(),
            kind: err.kind(),
            log_reference,
        }
    }
}

/// Outcome of one task execution, consumed exactly once by the driver.
#[derive(Debug)]
pub struct TaskResult {
    pub task_index: usize,
    pub outcome: Result<(), InstallError>,
}

/// What happened to the backup store when a required task failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// No rollback was attempted (success, uninstall, optional failure, or nothing backed up).
    NotAttempted,
    RolledBack,
    Failed(String),
}

/// Overall state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NotStarted,
    Running,
    /// Reached regardless of task outcomes; success is read from the error list.
    Complete,
}
