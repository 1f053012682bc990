//! External tool invocation with optional timeouts and bounded output.
//!
//! The [`ToolRunner`] trait decouples installer tasks from real processes
//! (`bun`, `opencode`, `cursor-agent`). Tests use a scripted runner that
//! answers with predetermined outputs without spawning anything.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::InstallError;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    /// Kill the process and report a timeout once this elapses.
    pub timeout: Option<Duration>,
}

impl ToolRequest {
    pub fn new<I, S>(program: &str, args: I, workdir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            workdir: workdir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `program arg1 arg2 ...`, for messages and logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for ToolRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Captured result of a finished (or killed) process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub timed_out: bool,
    pub truncated_bytes: usize,
}

impl ToolOutput {
    /// stdout followed by stderr, lossily decoded.
    pub fn combined(&self) -> String {
        let mut buf = String::from_utf8_lossy(&self.stdout).into_owned();
        if !self.stderr.is_empty() {
            if !buf.is_empty() && !buf.ends_with('\n') {
                buf.push('\n');
            }
            buf.push_str(&String::from_utf8_lossy(&self.stderr));
        }
        if self.truncated_bytes > 0 {
            buf.push_str(&format!("\n[output truncated {} bytes]\n", self.truncated_bytes));
        }
        buf
    }
}

/// Abstraction over launching external tools.
pub trait ToolRunner {
    /// Resolve `program` on `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run the request to completion. Errors only when the process could not be
    /// started or waited on; non-zero exits and timeouts are reported in the output.
    fn run(&self, request: &ToolRequest) -> Result<ToolOutput, InstallError>;
}

/// Runs real processes.
#[derive(Debug, Clone)]
pub struct SystemToolRunner {
    output_limit_bytes: usize,
}

impl SystemToolRunner {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self { output_limit_bytes }
    }
}

impl ToolRunner for SystemToolRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    #[instrument(skip_all, fields(command = %request, workdir = %request.workdir.display()))]
    fn run(&self, request: &ToolRequest) -> Result<ToolOutput, InstallError> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args).current_dir(&request.workdir);
        run_command(cmd, request.timeout, self.output_limit_bytes)
            .map_err(|err| InstallError::io(format!("run {request}"), err))
    }
}

/// Run a command, capturing stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
pub fn run_command(
    mut cmd: Command,
    timeout: Option<Duration>,
    output_limit_bytes: usize,
) -> std::io::Result<ToolOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e);
        }
    };

    let stdout = child.stdout.take().ok_or_else(|| pipe_missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| pipe_missing("stderr"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait()?,
        Some(timeout) => match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                child.kill()?;
                child.wait()?
            }
        },
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle)?;
    let (stderr, stderr_truncated) = join_output(stderr_handle)?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(ToolOutput {
        stdout,
        stderr,
        exit_code: status.code(),
        success: status.success() && !timed_out,
        timed_out,
        truncated_bytes: stdout_truncated + stderr_truncated,
    })
}

fn pipe_missing(stream: &str) -> std::io::Error {
    std::io::Error::other(format!("{stream} was not piped"))
}

fn join_output(
    handle: thread::JoinHandle<std::io::Result<(Vec<u8>, usize)>>,
) -> std::io::Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::other("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> std::io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_args() {
        let request = ToolRequest::new("bun", ["run", "build"], "/tmp");
        assert_eq!(request.command_line(), "bun run build");
        assert_eq!(request.timeout, None);
    }

    #[test]
    fn combined_appends_stderr_on_new_line() {
        let output = ToolOutput {
            stdout: b"installed".to_vec(),
            stderr: b"warning".to_vec(),
            ..ToolOutput::default()
        };
        assert_eq!(output.combined(), "installed\nwarning");
    }

    #[test]
    fn read_stream_limited_counts_discarded_bytes() {
        let (buf, truncated) = read_stream_limited(&b"abcdefgh"[..], 3).expect("read");
        assert_eq!(buf, b"abc");
        assert_eq!(truncated, 5);
    }

    #[cfg(unix)]
    #[test]
    fn run_command_captures_output_and_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let output = run_command(cmd, None, 1024).expect("run");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success);
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn run_command_kills_on_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exec sleep 5"]);
        let output = run_command(cmd, Some(Duration::from_millis(100)), 1024).expect("run");
        assert!(output.timed_out);
        assert!(!output.success);
    }
}
