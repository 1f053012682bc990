//! Test-only fakes: a scripted tool runner and a throwaway install environment.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tempfile::TempDir;

use crate::error::InstallError;
use crate::io::config_file;
use crate::io::paths::InstallPaths;
use crate::io::process::{ToolOutput, ToolRequest, ToolRunner};
use crate::io::run_log::RunLog;
use crate::io::settings::InstallerSettings;
use crate::pipeline::RunContext;

/// Canned answer for one invocation of a command line.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub output: String,
    pub exit_code: i32,
    pub timed_out: bool,
    /// Files the command leaves behind, written before it "exits".
    pub writes: Vec<(PathBuf, String)>,
}

impl ScriptedResponse {
    pub fn success(output: &str) -> Self {
        Self {
            output: output.to_string(),
            exit_code: 0,
            timed_out: false,
            writes: Vec::new(),
        }
    }

    pub fn failure(exit_code: i32, output: &str) -> Self {
        Self {
            output: output.to_string(),
            exit_code,
            timed_out: false,
            writes: Vec::new(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            output: String::new(),
            exit_code: -1,
            timed_out: true,
            writes: Vec::new(),
        }
    }

    /// Also create `path` holding `contents` when the command runs.
    pub fn writing(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.writes.push((path.into(), contents.to_string()));
        self
    }

    fn apply_writes(&self) -> Result<(), InstallError> {
        for (path, contents) in &self.writes {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| InstallError::io_at("create directory", parent, err))?;
            }
            fs::write(path, contents).map_err(|err| InstallError::io_at("write", path, err))?;
        }
        Ok(())
    }

    fn to_output(&self) -> ToolOutput {
        ToolOutput {
            stdout: self.output.clone().into_bytes(),
            exit_code: (!self.timed_out).then_some(self.exit_code),
            success: !self.timed_out && self.exit_code == 0,
            timed_out: self.timed_out,
            ..ToolOutput::default()
        }
    }
}

/// [`ToolRunner`] that never spawns processes.
///
/// Responses are queued per command line (`"bun run build"`) and consumed in
/// order; a command with no queued response succeeds with empty output. Every
/// program is found on `PATH` unless removed with [`without_program`](Self::without_program).
#[derive(Debug, Default)]
pub struct ScriptedToolRunner {
    missing: BTreeSet<String>,
    responses: RefCell<BTreeMap<String, VecDeque<ScriptedResponse>>>,
    requests: RefCell<Vec<ToolRequest>>,
}

impl ScriptedToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_program(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    pub fn respond(self, command_line: &str, response: ScriptedResponse) -> Self {
        self.responses
            .borrow_mut()
            .entry(command_line.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ToolRequest> {
        self.requests.borrow().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(ToolRequest::command_line)
            .collect()
    }

    /// Fail if any queued response was never consumed.
    pub fn assert_drained(&self) -> Result<()> {
        let responses = self.responses.borrow();
        let pending: Vec<&String> = responses
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(line, _)| line)
            .collect();
        if !pending.is_empty() {
            bail!("unconsumed scripted responses for {pending:?}");
        }
        Ok(())
    }
}

impl ToolRunner for ScriptedToolRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        if self.missing.contains(program) {
            return None;
        }
        Some(Path::new("/usr/bin").join(program))
    }

    fn run(&self, request: &ToolRequest) -> Result<ToolOutput, InstallError> {
        self.requests.borrow_mut().push(request.clone());
        let response = self
            .responses
            .borrow_mut()
            .get_mut(&request.command_line())
            .and_then(VecDeque::pop_front);
        let response = response.unwrap_or_else(|| ScriptedResponse::success(""));
        response.apply_writes()?;
        Ok(response.to_output())
    }
}

/// Temporary project checkout, host config dir, cache, and run log.
pub struct TestEnv {
    temp: TempDir,
    paths: InstallPaths,
    settings: InstallerSettings,
    log: RunLog,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let root = temp.path();
        let project_dir = root.join("project");
        fs::create_dir_all(&project_dir).context("create project dir")?;
        let paths = InstallPaths::new(
            project_dir,
            root.join("config").join("opencode"),
            root.join("cache").join("opencode").join("node_modules"),
        );
        let log = RunLog::new(root.join("logs").join("run.log"));
        Ok(Self {
            temp,
            paths,
            settings: InstallerSettings::default(),
            log,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }

    pub fn log_path(&self) -> PathBuf {
        self.log.path().to_path_buf()
    }

    /// Fresh run context over this environment.
    pub fn context<'a, R: ToolRunner>(&self, tools: &'a R) -> RunContext<'a, R> {
        RunContext::new(
            self.paths.clone(),
            self.settings.clone(),
            tools,
            self.log.clone(),
        )
    }

    /// Write the build output the symlink points at.
    pub fn write_artifact(&self, contents: &str) -> Result<()> {
        let artifact = &self.paths.build_artifact;
        if let Some(parent) = artifact.parent() {
            fs::create_dir_all(parent).context("create dist dir")?;
        }
        fs::write(artifact, contents).context("write build artifact")
    }

    pub fn write_config(&self, doc: &Value) -> Result<()> {
        config_file::save(doc, &self.paths.config_path)?;
        Ok(())
    }

    pub fn read_config(&self) -> Result<Value> {
        Ok(config_file::load(&self.paths.config_path)?)
    }
}
