//! Orchestration for one install or uninstall run.
//!
//! A [`Pipeline`] owns the ordered task list and the [`RunContext`] the tasks
//! mutate. Tasks run strictly one after another; a required failure during
//! install restores every backed-up file and ends the run.

use std::path::PathBuf;

use tracing::{error, info, instrument, warn};

use crate::core::types::{ErrorInfo, Mode, Rollback, RunStatus, TaskResult, TaskStatus};
use crate::io::backup::BackupStore;
use crate::io::paths::InstallPaths;
use crate::io::process::ToolRunner;
use crate::io::run_log::RunLog;
use crate::io::settings::InstallerSettings;
use crate::tasks::{INSTALL_TASKS, TaskKind, UNINSTALL_TASKS};

/// State shared by every task of a run. Owned by the pipeline; tasks get `&mut` access.
pub struct RunContext<'a, R: ToolRunner> {
    pub paths: InstallPaths,
    pub settings: InstallerSettings,
    pub backups: BackupStore,
    pub tools: &'a R,
    pub log: RunLog,
    /// User-facing messages for required-task failures, in order.
    pub errors: Vec<String>,
}

impl<'a, R: ToolRunner> RunContext<'a, R> {
    pub fn new(paths: InstallPaths, settings: InstallerSettings, tools: &'a R, log: RunLog) -> Self {
        Self {
            paths,
            settings,
            backups: BackupStore::new(),
            tools,
            log,
            errors: Vec::new(),
        }
    }
}

/// One step of a run together with its progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub kind: TaskKind,
    pub optional: bool,
    pub status: TaskStatus,
    pub error: Option<ErrorInfo>,
}

impl Task {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            optional: kind.optional_by_default(),
            status: TaskStatus::Pending,
            error: None,
        }
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn description(&self) -> &'static str {
        self.kind.description()
    }
}

/// Progress notifications emitted while a pipeline runs.
#[derive(Debug, Clone, Copy)]
pub enum TaskEvent<'t> {
    Started { index: usize, task: &'t Task },
    Finished { index: usize, task: &'t Task },
}

/// Final state of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: Mode,
    pub tasks: Vec<Task>,
    pub errors: Vec<String>,
    pub rollback: Rollback,
    pub log_path: PathBuf,
}

impl RunReport {
    /// True when no required task failed.
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    /// The required task that ended the run, if any.
    pub fn failed_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|task| task.status == TaskStatus::Failed && !task.optional)
    }

    /// Optional tasks that failed without ending the run.
    pub fn warnings(&self) -> impl Iterator<Item = &Task> {
        self.tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Failed && task.optional)
    }
}

/// Sequential task driver for one run.
pub struct Pipeline<'a, R: ToolRunner> {
    mode: Mode,
    tasks: Vec<Task>,
    current: usize,
    status: RunStatus,
    rollback: Rollback,
    context: RunContext<'a, R>,
}

impl<'a, R: ToolRunner> Pipeline<'a, R> {
    /// Pipeline with the fixed task list for `mode`.
    pub fn build(mode: Mode, context: RunContext<'a, R>) -> Self {
        let kinds = match mode {
            Mode::Install => INSTALL_TASKS,
            Mode::Uninstall => UNINSTALL_TASKS,
        };
        let tasks = kinds.iter().copied().map(Task::new).collect();
        Self::with_tasks(mode, tasks, context)
    }

    /// Pipeline with an explicit task list, executed in the given order.
    pub fn with_tasks(mode: Mode, tasks: Vec<Task>, context: RunContext<'a, R>) -> Self {
        Self {
            mode,
            tasks,
            current: 0,
            status: RunStatus::NotStarted,
            rollback: Rollback::NotAttempted,
            context,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn context(&self) -> &RunContext<'a, R> {
        &self.context
    }

    /// Execute every task in order, calling `on_event` before and after each one.
    ///
    /// Always ends with the pipeline in [`RunStatus::Complete`] and the backup store
    /// cleared. Calling `run` again returns the same report without executing anything.
    #[instrument(skip_all, fields(mode = self.mode.as_str(), tasks = self.tasks.len()))]
    pub fn run<F: FnMut(TaskEvent<'_>)>(&mut self, mut on_event: F) -> RunReport {
        if self.status != RunStatus::NotStarted {
            return self.report();
        }
        self.status = RunStatus::Running;
        info!("run started");
        self.context
            .log
            .note(&format!("{} run started", self.mode.as_str()));

        while self.current < self.tasks.len() {
            let index = self.current;
            self.tasks[index].status = TaskStatus::Running;
            on_event(TaskEvent::Started {
                index,
                task: &self.tasks[index],
            });

            let kind = self.tasks[index].kind;
            let result = TaskResult {
                task_index: index,
                outcome: kind.execute(&mut self.context),
            };
            let proceed = self.apply(result);

            on_event(TaskEvent::Finished {
                index,
                task: &self.tasks[index],
            });
            if !proceed {
                break;
            }
            self.current += 1;
        }

        self.finish()
    }

    /// Record a task result. Returns `false` when the run must stop.
    fn apply(&mut self, result: TaskResult) -> bool {
        let task = &mut self.tasks[result.task_index];
        let err = match result.outcome {
            Ok(()) => {
                task.status = TaskStatus::Complete;
                info!(task = task.name(), "task complete");
                return true;
            }
            Err(err) => err,
        };

        task.status = TaskStatus::Failed;
        task.error = Some(ErrorInfo::from_error(
            &err,
            Some(self.context.log.path().to_path_buf()),
        ));
        self.context
            .log
            .note(&format!("{} failed: {err}", task.name()));

        if task.optional {
            warn!(task = task.name(), kind = %err.kind(), err = %err, "optional task failed");
            return true;
        }

        error!(task = task.name(), kind = %err.kind(), err = %err, "required task failed");
        let message = err.to_string();
        if self.mode == Mode::Install && !self.context.backups.is_empty() {
            match self.context.backups.restore_all() {
                Ok(()) => {
                    info!(entries = self.context.backups.len(), "rolled back");
                    self.rollback = Rollback::RolledBack;
                    self.context.errors.push(format!("{message} (rolled back)"));
                }
                Err(restore_err) => {
                    error!(err = %restore_err, "rollback failed");
                    self.rollback = Rollback::Failed(restore_err.to_string());
                    self.context
                        .errors
                        .push(format!("{message} (rollback failed: {restore_err})"));
                }
            }
        } else {
            self.context.errors.push(message);
        }
        false
    }

    fn finish(&mut self) -> RunReport {
        self.context.backups.cleanup();
        self.status = RunStatus::Complete;
        let report = self.report();
        info!(succeeded = report.succeeded(), "run complete");
        self.context.log.note(&format!(
            "{} run complete ({})",
            self.mode.as_str(),
            if report.succeeded() { "ok" } else { "failed" }
        ));
        report
    }

    fn report(&self) -> RunReport {
        RunReport {
            mode: self.mode,
            tasks: self.tasks.clone(),
            errors: self.context.errors.clone(),
            rollback: self.rollback.clone(),
            log_path: self.context.log.path().to_path_buf(),
        }
    }
}
