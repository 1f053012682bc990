//! Typed failures raised by installer tasks.
//!
//! The pipeline driver never branches on these kinds; they exist so the
//! user-facing message and the log line say what went wrong.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Failure of a single installer task.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A required external tool is not on `PATH`.
    #[error("{tool} not found - install with: {hint}")]
    PrerequisiteMissing { tool: String, hint: String },

    /// An external command exited non-zero.
    #[error("{command} failed: {detail}")]
    ProcessFailure { command: String, detail: String },

    /// An external command exceeded its time budget and was killed.
    #[error("{command} timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("{context}: {source}")]
    Io { context: String, source: io::Error },

    /// A message-only I/O class failure (e.g. a missing build artifact).
    #[error("{0}")]
    Missing(String),

    #[error("{context}: {source}")]
    Parse {
        context: String,
        source: serde_json::Error,
    },

    #[error("{0}")]
    Link(String),

    #[error("{0}")]
    Validation(String),
}

/// Coarse classification of [`InstallError`], used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PrerequisiteMissing,
    ProcessFailure,
    Io,
    Parse,
    Link,
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::PrerequisiteMissing => "prerequisite-missing",
            ErrorKind::ProcessFailure => "process-failure",
            ErrorKind::Io => "io",
            ErrorKind::Parse => "parse",
            ErrorKind::Link => "link",
            ErrorKind::Validation => "validation",
        };
        f.write_str(label)
    }
}

impl InstallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InstallError::PrerequisiteMissing { .. } => ErrorKind::PrerequisiteMissing,
            InstallError::ProcessFailure { .. } | InstallError::Timeout { .. } => {
                ErrorKind::ProcessFailure
            }
            InstallError::Io { .. } | InstallError::Missing(_) => ErrorKind::Io,
            InstallError::Parse { .. } => ErrorKind::Parse,
            InstallError::Link(_) => ErrorKind::Link,
            InstallError::Validation(_) => ErrorKind::Validation,
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        InstallError::Io {
            context: context.into(),
            source,
        }
    }

    /// I/O failure on `path`, described as `"<action> <path>"`.
    pub fn io_at(action: &str, path: &Path, source: io::Error) -> Self {
        InstallError::io(format!("{action} {}", path.display()), source)
    }

    pub fn parse_at(path: &Path, source: serde_json::Error) -> Self {
        InstallError::Parse {
            context: format!("parse {}", path.display()),
            source,
        }
    }
}

/// Aggregate of per-path failures from a best-effort restore.
#[derive(Debug, Error)]
#[error("{}", describe_failures(.failures))]
pub struct RestoreError {
    pub failures: Vec<(PathBuf, io::Error)>,
}

fn describe_failures(failures: &[(PathBuf, io::Error)]) -> String {
    failures
        .iter()
        .map(|(path, err)| format!("restore {}: {err}", path.display()))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_a_process_failure() {
        let err = InstallError::Timeout {
            command: "opencode models".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.kind(), ErrorKind::ProcessFailure);
        assert_eq!(err.to_string(), "opencode models timed out after 5s");
    }

    #[test]
    fn restore_error_lists_every_path() {
        let err = RestoreError {
            failures: vec![
                (
                    PathBuf::from("/a"),
                    io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                ),
                (
                    PathBuf::from("/b"),
                    io::Error::new(io::ErrorKind::Other, "boom"),
                ),
            ],
        };
        assert_eq!(err.to_string(), "restore /a: denied; restore /b: boom");
    }
}
