//! Canonical filesystem locations touched by install and uninstall runs.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::provider::PROVIDER_ID;

/// Scoped package name of the ACP SDK installed into the host.
pub const SDK_SCOPE: &str = "@agentclientprotocol";
pub const SDK_PACKAGE: &str = "@agentclientprotocol/sdk";
/// Package name of the plugin this one replaces.
pub const LEGACY_PLUGIN: &str = "opencode-cursor-auth";

/// All paths for one project checkout and one host config directory.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    /// Plugin checkout (where `bun run build` runs).
    pub project_dir: PathBuf,
    /// Build output linked into the host.
    pub build_artifact: PathBuf,
    /// Host config directory (`~/.config/opencode`).
    pub host_dir: PathBuf,
    pub config_path: PathBuf,
    pub plugin_dir: PathBuf,
    pub plugin_link: PathBuf,
    pub host_package_json: PathBuf,
    pub sdk_scope_dir: PathBuf,
    pub sdk_dir: PathBuf,
    /// Host package cache that may still hold the legacy plugin.
    pub legacy_cache_dir: PathBuf,
}

impl InstallPaths {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        host_dir: impl Into<PathBuf>,
        cache_node_modules: impl Into<PathBuf>,
    ) -> Self {
        let project_dir = project_dir.into();
        let host_dir = host_dir.into();
        let plugin_dir = host_dir.join("plugin");
        let sdk_scope_dir = host_dir.join("node_modules").join(SDK_SCOPE);
        Self {
            build_artifact: project_dir.join("dist").join("index.js"),
            project_dir,
            config_path: host_dir.join("opencode.json"),
            plugin_link: plugin_dir.join(format!("{PROVIDER_ID}.js")),
            plugin_dir,
            host_package_json: host_dir.join("package.json"),
            sdk_dir: sdk_scope_dir.join("sdk"),
            sdk_scope_dir,
            legacy_cache_dir: cache_node_modules.into().join(LEGACY_PLUGIN),
            host_dir,
        }
    }

    /// Resolve host locations from the environment.
    pub fn discover(project_dir: &Path) -> Result<Self> {
        Ok(Self::new(
            project_dir,
            default_host_dir()?,
            default_cache_dir()?.join("node_modules"),
        ))
    }
}

/// `$XDG_CONFIG_HOME/opencode`, else `~/.config/opencode`.
pub fn default_host_dir() -> Result<PathBuf> {
    let root = match xdg_dir("XDG_CONFIG_HOME") {
        Some(dir) => dir,
        None => home_dir()?.join(".config"),
    };
    Ok(root.join("opencode"))
}

/// `$XDG_CACHE_HOME/opencode`, else `~/.cache/opencode`.
pub fn default_cache_dir() -> Result<PathBuf> {
    let root = match xdg_dir("XDG_CACHE_HOME") {
        Some(dir) => dir,
        None => home_dir()?.join(".cache"),
    };
    Ok(root.join("opencode"))
}

fn home_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or_else(|| anyhow!("cannot determine home directory"))
}

// XDG variables only count when absolute.
fn xdg_dir(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .map(PathBuf::from)
        .filter(|path| path.is_absolute())
}
