//! `cursor-acp-installer`: install or remove the cursor-acp OpenCode plugin.
//!
//! Each run prints one line per task and writes the output of every external
//! command to a run log, which failure messages point at.

use std::env;
use std::path::{self, Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use installer::core::types::{Mode, TaskStatus};
use installer::exit_codes;
use installer::io::paths::{InstallPaths, default_cache_dir, default_host_dir};
use installer::io::process::SystemToolRunner;
use installer::io::run_log::RunLog;
use installer::io::settings::{InstallerSettings, load_settings, write_settings};
use installer::logging;
use installer::pipeline::{Pipeline, RunContext, RunReport, Task, TaskEvent};

/// Settings file looked up in the OpenCode config directory.
const SETTINGS_FILE: &str = "cursor-acp-installer.toml";

#[derive(Parser, Debug)]
#[command(
    name = "cursor-acp-installer",
    version,
    about = "Install or remove the cursor-acp OpenCode plugin"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the plugin, link it into OpenCode, and register the provider.
    Install(RunArgs),
    /// Remove the plugin link, the ACP SDK, and the provider entry.
    Uninstall(RunArgs),
    /// Write a settings file holding the default values.
    InitSettings {
        /// Target file (defaults to the OpenCode config directory).
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Plugin checkout to build (defaults to the current directory).
    #[arg(long)]
    project_dir: Option<PathBuf>,
    /// OpenCode config directory (defaults to `$XDG_CONFIG_HOME/opencode`).
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// OpenCode cache directory (defaults to `$XDG_CACHE_HOME/opencode`).
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Installer settings file (TOML).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Run log location (defaults to a timestamped file in the temp dir).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not failures.
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            process::exit(code);
        }
    };
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Install(args) => cmd_run(Mode::Install, &args),
        Command::Uninstall(args) => cmd_run(Mode::Uninstall, &args),
        Command::InitSettings { path, force } => cmd_init_settings(path, force),
    }
}

fn cmd_run(mode: Mode, args: &RunArgs) -> Result<i32> {
    let paths = resolve_paths(args)?;
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| paths.host_dir.join(SETTINGS_FILE));
    let settings = load_settings(&settings_path)?;
    let log = match &args.log_file {
        Some(path) => RunLog::new(path),
        None => RunLog::in_dir(&env::temp_dir(), mode),
    };

    let tools = SystemToolRunner::new(settings.output_limit_bytes);
    let mut pipeline = Pipeline::build(mode, RunContext::new(paths, settings, &tools, log));
    let report = pipeline.run(print_event);
    print_summary(&report);

    Ok(if report.succeeded() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn cmd_init_settings(path: Option<PathBuf>, force: bool) -> Result<i32> {
    let path = match path {
        Some(path) => path,
        None => default_host_dir()?.join(SETTINGS_FILE),
    };
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_settings(&path, &InstallerSettings::default())
        .with_context(|| format!("write settings {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn resolve_paths(args: &RunArgs) -> Result<InstallPaths> {
    let project_dir = match &args.project_dir {
        Some(dir) => absolute_dir(dir)?,
        None => env::current_dir().context("resolve current directory")?,
    };
    let host_dir = match &args.config_dir {
        Some(dir) => absolute_dir(dir)?,
        None => default_host_dir()?,
    };
    let cache_dir = match &args.cache_dir {
        Some(dir) => absolute_dir(dir)?,
        None => default_cache_dir()?,
    };
    Ok(InstallPaths::new(
        project_dir,
        host_dir,
        cache_dir.join("node_modules"),
    ))
}

// Task paths must be absolute: a relative symlink target resolves against the
// plugin directory, not the working directory.
fn absolute_dir(dir: &Path) -> Result<PathBuf> {
    path::absolute(dir).with_context(|| format!("resolve {}", dir.display()))
}

fn print_event(event: TaskEvent<'_>) {
    match event {
        TaskEvent::Started { task, .. } => eprintln!("{}", started_line(task)),
        TaskEvent::Finished { task, .. } => {
            println!("{}", task_line(task));
            if let Some(info) = &task.error {
                println!("       {}", info.message);
            }
        }
    }
}

fn started_line(task: &Task) -> String {
    format!("  ..   {}: {}", task.name(), task.description())
}

fn task_line(task: &Task) -> String {
    let marker = match task.status {
        TaskStatus::Complete => "ok",
        TaskStatus::Failed if task.optional => "warn",
        TaskStatus::Failed => "FAIL",
        TaskStatus::Pending | TaskStatus::Running => "skip",
    };
    format!("[{marker:>4}] {}", task.name())
}

fn print_summary(report: &RunReport) {
    for task in report
        .tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Pending)
    {
        println!("{}", task_line(task));
    }

    if report.succeeded() {
        let verb = match report.mode {
            Mode::Install => "installed",
            Mode::Uninstall => "removed",
        };
        println!("cursor-acp {verb}");
        if report.warnings().next().is_some() {
            println!("some optional checks failed; see {}", report.log_path.display());
        }
        return;
    }

    for message in &report.errors {
        eprintln!("error: {message}");
    }
    eprintln!("log: {}", report.log_path.display());
}
