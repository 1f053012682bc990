//! The closed set of install and uninstall steps.
//!
//! Each [`TaskKind`] variant is one named step with a single `execute`
//! entry point. Every step backs up a file before it overwrites or deletes it,
//! so the pipeline can roll a failed install back.

use std::fs;

use tracing::{debug, info, instrument};

use crate::core::document::{
    has_provider_section, provider, remove_dependency, remove_plugins_with_prefix,
    remove_provider, upsert_provider,
};
use crate::core::provider::{PROVIDER_ID, provider_spec, validate_provider_entry};
use crate::error::InstallError;
use crate::io::config_file;
use crate::io::link::{create_link, remove_link};
use crate::io::paths::{LEGACY_PLUGIN, SDK_PACKAGE};
use crate::io::process::{ToolRequest, ToolRunner};
use crate::pipeline::RunContext;

/// Tools that must be on `PATH`, with the command that installs each.
const PREREQUISITES: &[(&str, &str)] = &[
    ("bun", "curl -fsSL https://bun.sh/install | bash"),
    ("cursor-agent", "curl -fsS https://cursor.com/install | bash"),
];

/// Lines of command output quoted in a failure message.
const OUTPUT_TAIL_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    CheckPrerequisites,
    BuildPlugin,
    InstallDependencySdk,
    CreateSymlink,
    UpdateConfig,
    ValidateConfig,
    VerifyPluginLoads,
    RemoveSymlink,
    RemoveDependencySdk,
    RemoveProviderConfig,
    RemoveLegacyPlugin,
    ValidateRemoval,
}

/// Steps of an install run, in execution order.
pub const INSTALL_TASKS: &[TaskKind] = &[
    TaskKind::CheckPrerequisites,
    TaskKind::BuildPlugin,
    TaskKind::InstallDependencySdk,
    TaskKind::CreateSymlink,
    TaskKind::UpdateConfig,
    TaskKind::ValidateConfig,
    TaskKind::VerifyPluginLoads,
];

/// Steps of an uninstall run, in execution order.
pub const UNINSTALL_TASKS: &[TaskKind] = &[
    TaskKind::RemoveSymlink,
    TaskKind::RemoveDependencySdk,
    TaskKind::RemoveProviderConfig,
    TaskKind::RemoveLegacyPlugin,
    TaskKind::ValidateRemoval,
];

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::CheckPrerequisites => "Check prerequisites",
            TaskKind::BuildPlugin => "Build plugin",
            TaskKind::InstallDependencySdk => "Install ACP SDK",
            TaskKind::CreateSymlink => "Create symlink",
            TaskKind::UpdateConfig => "Update config",
            TaskKind::ValidateConfig => "Validate config",
            TaskKind::VerifyPluginLoads => "Verify plugin loads",
            TaskKind::RemoveSymlink => "Remove plugin symlink",
            TaskKind::RemoveDependencySdk => "Remove ACP SDK",
            TaskKind::RemoveProviderConfig => "Remove provider config",
            TaskKind::RemoveLegacyPlugin => "Remove old plugin",
            TaskKind::ValidateRemoval => "Validate config",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TaskKind::CheckPrerequisites => "Verifying bun and cursor-agent",
            TaskKind::BuildPlugin => "Running bun install && bun run build",
            TaskKind::InstallDependencySdk => "Adding @agentclientprotocol/sdk to opencode",
            TaskKind::CreateSymlink => "Linking to OpenCode plugin directory",
            TaskKind::UpdateConfig => "Adding cursor-acp provider to opencode.json",
            TaskKind::ValidateConfig => "Checking JSON syntax",
            TaskKind::VerifyPluginLoads => "Checking if plugin appears in opencode",
            TaskKind::RemoveSymlink => "Removing cursor-acp.js from plugin directory",
            TaskKind::RemoveDependencySdk => "Removing @agentclientprotocol/sdk from opencode",
            TaskKind::RemoveProviderConfig => "Removing cursor-acp from opencode.json",
            TaskKind::RemoveLegacyPlugin => "Removing opencode-cursor-auth if present",
            TaskKind::ValidateRemoval => "Checking JSON syntax",
        }
    }

    /// Whether a failure of this step is reported without ending the run.
    pub fn optional_by_default(self) -> bool {
        matches!(self, TaskKind::VerifyPluginLoads)
    }

    pub fn execute<R: ToolRunner>(self, ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
        match self {
            TaskKind::CheckPrerequisites => check_prerequisites(ctx),
            TaskKind::BuildPlugin => build_plugin(ctx),
            TaskKind::InstallDependencySdk => install_dependency_sdk(ctx),
            TaskKind::CreateSymlink => create_symlink(ctx),
            TaskKind::UpdateConfig => update_config(ctx),
            TaskKind::ValidateConfig => validate_config(ctx),
            TaskKind::VerifyPluginLoads => verify_plugin_loads(ctx),
            TaskKind::RemoveSymlink => remove_symlink(ctx),
            TaskKind::RemoveDependencySdk => remove_dependency_sdk(ctx),
            TaskKind::RemoveProviderConfig => remove_provider_config(ctx),
            TaskKind::RemoveLegacyPlugin => remove_legacy_plugin(ctx),
            TaskKind::ValidateRemoval => validate_removal(ctx),
        }
    }
}

#[instrument(skip_all)]
fn check_prerequisites<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    for (tool, hint) in PREREQUISITES {
        match ctx.tools.locate(tool) {
            Some(path) => debug!(tool, path = %path.display(), "found prerequisite"),
            None => {
                return Err(InstallError::PrerequisiteMissing {
                    tool: (*tool).to_string(),
                    hint: (*hint).to_string(),
                });
            }
        }
    }
    // A located but broken agent install fails here rather than on first use.
    let request = ToolRequest::new("cursor-agent", ["--version"], &ctx.paths.project_dir);
    let version = run_tool(ctx, &request)?;
    debug!(version = version.trim(), "cursor-agent responds");
    Ok(())
}

#[instrument(skip_all, fields(project = %ctx.paths.project_dir.display()))]
fn build_plugin<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    let project = ctx.paths.project_dir.clone();
    run_tool(ctx, &ToolRequest::new("bun", ["install"], &project))?;
    run_tool(ctx, &ToolRequest::new("bun", ["run", "build"], &project))?;

    let artifact = &ctx.paths.build_artifact;
    let size = fs::metadata(artifact).map(|meta| meta.len()).unwrap_or(0);
    if size == 0 {
        return Err(InstallError::Missing(format!(
            "build artifact {} not found or empty after build",
            artifact.display()
        )));
    }
    info!(bytes = size, "plugin built");
    Ok(())
}

#[instrument(skip_all)]
fn install_dependency_sdk<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    ctx.backups.backup(&ctx.paths.config_path)?;

    if ctx.paths.sdk_dir.exists() {
        info!(path = %ctx.paths.sdk_dir.display(), "ACP SDK already installed");
        return Ok(());
    }

    ctx.backups.backup(&ctx.paths.host_package_json)?;
    // Recorded as absent, so a rollback removes the freshly installed package.
    ctx.backups.backup(&ctx.paths.sdk_dir)?;

    let host_dir = ctx.paths.host_dir.clone();
    fs::create_dir_all(&host_dir)
        .map_err(|err| InstallError::io_at("create directory", &host_dir, err))?;
    let package = format!("{SDK_PACKAGE}@{}", ctx.settings.sdk_version);
    run_tool(ctx, &ToolRequest::new("bun", ["add", package.as_str()], &host_dir))?;
    Ok(())
}

#[instrument(skip_all)]
fn create_symlink<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    let plugin_dir = &ctx.paths.plugin_dir;
    fs::create_dir_all(plugin_dir)
        .map_err(|err| InstallError::io_at("create plugin directory", plugin_dir, err))?;
    create_link(
        &ctx.paths.build_artifact,
        &ctx.paths.plugin_link,
        &mut ctx.backups,
    )
}

#[instrument(skip_all, fields(config = %ctx.paths.config_path.display()))]
fn update_config<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    let path = &ctx.paths.config_path;
    ctx.backups.backup(path)?;
    let mut doc = config_file::load(path)?;
    upsert_provider(&mut doc, PROVIDER_ID, provider_spec(&ctx.settings.base_url));
    config_file::save(&doc, path)?;
    info!("provider entry written");
    Ok(())
}

#[instrument(skip_all, fields(config = %ctx.paths.config_path.display()))]
fn validate_config<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    let doc = config_file::validate(&ctx.paths.config_path)?;
    if !has_provider_section(&doc) {
        return Err(InstallError::Validation(
            "provider section missing from config".to_string(),
        ));
    }
    let entry = provider(&doc, PROVIDER_ID).ok_or_else(|| {
        InstallError::Validation(format!("{PROVIDER_ID} provider not found in config"))
    })?;
    let violations = validate_provider_entry(entry);
    if !violations.is_empty() {
        return Err(InstallError::Validation(format!(
            "{PROVIDER_ID} provider entry is malformed: {}",
            violations.join("; ")
        )));
    }
    Ok(())
}

#[instrument(skip_all)]
fn verify_plugin_loads<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    let request = ToolRequest::new("opencode", ["models"], &ctx.paths.project_dir)
        .with_timeout(ctx.settings.verify_timeout());
    let output = run_tool(ctx, &request)?;
    if output.contains(PROVIDER_ID) {
        return Ok(());
    }
    Err(InstallError::Validation(format!(
        "{PROVIDER_ID} provider not found - plugin may not be installed correctly. OpenCode output: {}",
        output_tail(&output)
    )))
}

#[instrument(skip_all)]
fn remove_symlink<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    remove_link(&ctx.paths.plugin_link)?;
    Ok(())
}

#[instrument(skip_all)]
fn remove_dependency_sdk<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    if !ctx.paths.sdk_dir.exists() {
        debug!("ACP SDK not installed");
        return Ok(());
    }

    let manifest = &ctx.paths.host_package_json;
    if manifest.exists() {
        ctx.backups.backup(manifest)?;
        let mut doc = config_file::load(manifest)?;
        if remove_dependency(&mut doc, SDK_PACKAGE) {
            config_file::save(&doc, manifest)?;
            info!("dependency entry removed");
        }
    }

    let scope_dir = &ctx.paths.sdk_scope_dir;
    fs::remove_dir_all(scope_dir).map_err(|err| InstallError::io_at("remove", scope_dir, err))?;
    info!("ACP SDK removed");
    Ok(())
}

#[instrument(skip_all, fields(config = %ctx.paths.config_path.display()))]
fn remove_provider_config<R: ToolRunner>(
    ctx: &mut RunContext<'_, R>,
) -> Result<(), InstallError> {
    let path = &ctx.paths.config_path;
    ctx.backups.backup(path)?;
    if !path.exists() {
        return Ok(());
    }
    let mut doc = config_file::load(path)?;
    if remove_provider(&mut doc, PROVIDER_ID) {
        config_file::save(&doc, path)?;
        info!("provider entry removed");
    }
    Ok(())
}

#[instrument(skip_all, fields(config = %ctx.paths.config_path.display()))]
fn remove_legacy_plugin<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    let path = &ctx.paths.config_path;
    ctx.backups.backup(path)?;
    if path.exists() {
        let mut doc = config_file::load(path)?;
        let removed = remove_plugins_with_prefix(&mut doc, LEGACY_PLUGIN);
        if removed > 0 {
            config_file::save(&doc, path)?;
            info!(removed, "legacy plugin references removed");
        }
    }

    let cached = &ctx.paths.legacy_cache_dir;
    if cached.exists() {
        fs::remove_dir_all(cached)
            .map_err(|err| InstallError::io_at("remove old plugin from cache", cached, err))?;
        info!(path = %cached.display(), "legacy plugin removed from cache");
    }
    Ok(())
}

#[instrument(skip_all, fields(config = %ctx.paths.config_path.display()))]
fn validate_removal<R: ToolRunner>(ctx: &mut RunContext<'_, R>) -> Result<(), InstallError> {
    let path = &ctx.paths.config_path;
    if !path.exists() {
        return Ok(());
    }
    let doc = config_file::validate(path)?;
    if provider(&doc, PROVIDER_ID).is_some() {
        return Err(InstallError::Validation(format!(
            "{PROVIDER_ID} provider still exists in config"
        )));
    }
    Ok(())
}

/// Run an external command, log its output, and map failure to an error.
///
/// Returns the combined output on success.
fn run_tool<R: ToolRunner>(
    ctx: &RunContext<'_, R>,
    request: &ToolRequest,
) -> Result<String, InstallError> {
    let output = ctx.tools.run(request)?;
    ctx.log.command(request, &output);
    let combined = output.combined();
    if output.timed_out {
        return Err(InstallError::Timeout {
            command: request.command_line(),
            timeout: request.timeout.unwrap_or_default(),
        });
    }
    if !output.success {
        let mut detail = match output.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        let tail = output_tail(&combined);
        if !tail.is_empty() {
            detail.push_str(": ");
            detail.push_str(&tail);
        }
        return Err(InstallError::ProcessFailure {
            command: request.command_line(),
            detail,
        });
    }
    Ok(combined)
}

/// Last few non-empty lines of `output`, joined with ` | `.
fn output_tail(output: &str) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::DEFAULT_BASE_URL;
    use crate::test_support::{ScriptedResponse, ScriptedToolRunner, TestEnv};
    use serde_json::json;

    #[test]
    fn task_lists_are_fixed() {
        let install: Vec<&str> = INSTALL_TASKS.iter().map(|t| t.name()).collect();
        assert_eq!(
            install,
            vec![
                "Check prerequisites",
                "Build plugin",
                "Install ACP SDK",
                "Create symlink",
                "Update config",
                "Validate config",
                "Verify plugin loads",
            ]
        );
        let optional: Vec<TaskKind> = INSTALL_TASKS
            .iter()
            .copied()
            .filter(|t| t.optional_by_default())
            .collect();
        assert_eq!(optional, vec![TaskKind::VerifyPluginLoads]);
        assert!(UNINSTALL_TASKS.iter().all(|t| !t.optional_by_default()));
    }

    #[test]
    fn missing_prerequisite_names_install_hint() {
        let env = TestEnv::new().expect("env");
        let tools = ScriptedToolRunner::new().without_program("cursor-agent");
        let mut ctx = env.context(&tools);

        let err = TaskKind::CheckPrerequisites
            .execute(&mut ctx)
            .expect_err("missing cursor-agent");
        assert!(matches!(err, InstallError::PrerequisiteMissing { .. }));
        assert!(err.to_string().contains("cursor.com/install"));
        assert!(tools.command_lines().is_empty());
    }

    #[test]
    fn prerequisites_query_agent_version() {
        let env = TestEnv::new().expect("env");
        let tools = ScriptedToolRunner::new()
            .respond("cursor-agent --version", ScriptedResponse::failure(127, "broken"));
        let mut ctx = env.context(&tools);

        let err = TaskKind::CheckPrerequisites
            .execute(&mut ctx)
            .expect_err("version check fails");
        assert_eq!(
            err.to_string(),
            "cursor-agent --version failed: exit code 127: broken"
        );
        // Only the post-install verification is bounded by a timeout.
        assert_eq!(tools.requests()[0].timeout, None);
    }

    #[test]
    fn build_fails_on_empty_artifact() {
        let env = TestEnv::new().expect("env");
        env.write_artifact("").expect("artifact");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        let err = TaskKind::BuildPlugin.execute(&mut ctx).expect_err("empty");
        assert!(err.to_string().contains("not found or empty"));
        assert_eq!(
            tools.command_lines(),
            vec!["bun install".to_string(), "bun run build".to_string()]
        );
    }

    #[test]
    fn build_stops_after_failed_install() {
        let env = TestEnv::new().expect("env");
        let tools = ScriptedToolRunner::new()
            .respond("bun install", ScriptedResponse::failure(1, "lockfile error"));
        let mut ctx = env.context(&tools);

        let err = TaskKind::BuildPlugin.execute(&mut ctx).expect_err("install fails");
        assert_eq!(
            err.to_string(),
            "bun install failed: exit code 1: lockfile error"
        );
        assert_eq!(tools.command_lines(), vec!["bun install".to_string()]);
        let log = fs::read_to_string(env.log_path()).expect("run log");
        assert!(log.contains("lockfile error"));
    }

    #[test]
    fn sdk_install_skipped_when_present() {
        let env = TestEnv::new().expect("env");
        fs::create_dir_all(&env.paths().sdk_dir).expect("mkdir sdk");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        TaskKind::InstallDependencySdk.execute(&mut ctx).expect("skip");
        assert!(tools.command_lines().is_empty());
        assert!(ctx.backups.contains(&env.paths().config_path));
    }

    #[test]
    fn sdk_install_runs_bun_add_in_host_dir() {
        let env = TestEnv::new().expect("env");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        TaskKind::InstallDependencySdk.execute(&mut ctx).expect("install");
        assert_eq!(
            tools.command_lines(),
            vec!["bun add @agentclientprotocol/sdk@^0.13.1".to_string()]
        );
        assert_eq!(tools.requests()[0].workdir, env.paths().host_dir);
        assert!(ctx.backups.contains(&env.paths().host_package_json));
    }

    #[test]
    fn update_config_creates_file_when_absent() {
        let env = TestEnv::new().expect("env");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        TaskKind::UpdateConfig.execute(&mut ctx).expect("update");
        let doc = config_file::load(&env.paths().config_path).expect("load");
        assert_eq!(
            provider(&doc, PROVIDER_ID),
            Some(&provider_spec(DEFAULT_BASE_URL))
        );

        TaskKind::ValidateConfig.execute(&mut ctx).expect("validate");
    }

    #[test]
    fn validate_config_requires_provider_entry() {
        let env = TestEnv::new().expect("env");
        env.write_config(&json!({"provider": {"other": {}}}))
            .expect("config");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        let err = TaskKind::ValidateConfig.execute(&mut ctx).expect_err("missing");
        assert_eq!(err.to_string(), "cursor-acp provider not found in config");
    }

    #[test]
    fn validate_config_rejects_malformed_entry() {
        let env = TestEnv::new().expect("env");
        env.write_config(&json!({"provider": {"cursor-acp": {"npm": "x"}}}))
            .expect("config");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        let err = TaskKind::ValidateConfig.execute(&mut ctx).expect_err("malformed");
        assert!(matches!(err, InstallError::Validation(_)));
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn verify_uses_timeout_and_checks_output() {
        let env = TestEnv::new().expect("env");
        let tools = ScriptedToolRunner::new().respond(
            "opencode models",
            ScriptedResponse::success("anthropic/claude\nopenai/gpt"),
        );
        let mut ctx = env.context(&tools);

        let err = TaskKind::VerifyPluginLoads
            .execute(&mut ctx)
            .expect_err("provider missing");
        assert!(err.to_string().contains("cursor-acp provider not found"));
        assert_eq!(
            tools.requests()[0].timeout,
            Some(std::time::Duration::from_secs(5))
        );
    }

    #[test]
    fn verify_reports_timeout() {
        let env = TestEnv::new().expect("env");
        let tools =
            ScriptedToolRunner::new().respond("opencode models", ScriptedResponse::timeout());
        let mut ctx = env.context(&tools);

        let err = TaskKind::VerifyPluginLoads.execute(&mut ctx).expect_err("timeout");
        assert!(matches!(err, InstallError::Timeout { .. }));
    }

    #[test]
    fn remove_symlink_when_absent_succeeds() {
        let env = TestEnv::new().expect("env");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);
        TaskKind::RemoveSymlink.execute(&mut ctx).expect("noop");
    }

    #[test]
    fn remove_sdk_edits_manifest_and_deletes_scope() {
        let env = TestEnv::new().expect("env");
        let paths = env.paths().clone();
        fs::create_dir_all(&paths.sdk_dir).expect("mkdir sdk");
        config_file::save(
            &json!({"dependencies": {"@agentclientprotocol/sdk": "^0.13.1", "zod": "^3"}}),
            &paths.host_package_json,
        )
        .expect("manifest");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        TaskKind::RemoveDependencySdk.execute(&mut ctx).expect("remove");
        assert!(!paths.sdk_scope_dir.exists());
        let manifest = config_file::load(&paths.host_package_json).expect("load");
        assert_eq!(manifest, json!({"dependencies": {"zod": "^3"}}));
    }

    #[test]
    fn legacy_plugin_entries_and_cache_are_removed() {
        let env = TestEnv::new().expect("env");
        env.write_config(&json!({"plugin": ["opencode-cursor-auth@1.0.0", "other-plugin"]}))
            .expect("config");
        fs::create_dir_all(&env.paths().legacy_cache_dir).expect("mkdir cache");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        TaskKind::RemoveLegacyPlugin.execute(&mut ctx).expect("remove");
        let doc = config_file::load(&env.paths().config_path).expect("load");
        assert_eq!(doc["plugin"], json!(["other-plugin"]));
        assert!(!env.paths().legacy_cache_dir.exists());
    }

    #[test]
    fn validate_removal_flags_leftover_provider() {
        let env = TestEnv::new().expect("env");
        env.write_config(&json!({"provider": {"cursor-acp": {}}}))
            .expect("config");
        let tools = ScriptedToolRunner::new();
        let mut ctx = env.context(&tools);

        let err = TaskKind::ValidateRemoval.execute(&mut ctx).expect_err("leftover");
        assert_eq!(err.to_string(), "cursor-acp provider still exists in config");
    }

    #[test]
    fn output_tail_keeps_last_lines() {
        let output = "1\n2\n\n3\n4\n5\n6\n";
        assert_eq!(output_tail(output), "2 | 3 | 4 | 5 | 6");
    }
}
