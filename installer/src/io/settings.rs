//! Installer settings stored as TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::provider::DEFAULT_BASE_URL;

/// Installer settings (TOML).
///
/// Every field is optional in the file; missing fields fall back to the values
/// the plugin ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallerSettings {
    /// Endpoint of the local proxy written into the provider entry.
    pub base_url: String,

    /// Version requirement passed to `bun add` for the ACP SDK.
    pub sdk_version: String,

    /// Wall-clock budget for the post-install `opencode models` check.
    pub verify_timeout_secs: u64,

    /// Keep at most this many bytes of stdout and of stderr per command.
    pub output_limit_bytes: usize,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            sdk_version: "^0.13.1".to_string(),
            verify_timeout_secs: 5,
            output_limit_bytes: 100_000,
        }
    }
}

impl InstallerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("base_url must be non-empty"));
        }
        if self.sdk_version.trim().is_empty() {
            return Err(anyhow!("sdk_version must be non-empty"));
        }
        if self.verify_timeout_secs == 0 {
            return Err(anyhow!("verify_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `InstallerSettings::default()`.
pub fn load_settings(path: &Path) -> Result<InstallerSettings> {
    if !path.exists() {
        let settings = InstallerSettings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: InstallerSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    Ok(settings)
}

/// Atomically write settings to disk (temp file + rename).
pub fn write_settings(path: &Path, settings: &InstallerSettings) -> Result<()> {
    settings.validate()?;
    let mut buf = toml::to_string_pretty(settings).context("serialize settings toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("settings path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp settings {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace settings {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(settings, InstallerSettings::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("installer.toml");
        let settings = InstallerSettings {
            base_url: "http://127.0.0.1:40000/v1".to_string(),
            ..InstallerSettings::default()
        };
        write_settings(&path, &settings).expect("write");
        let loaded = load_settings(&path).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("installer.toml");
        fs::write(&path, "verify_timeout_secs = 30\n").expect("write");
        let loaded = load_settings(&path).expect("load");
        assert_eq!(loaded.verify_timeout(), Duration::from_secs(30));
        assert_eq!(loaded.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("installer.toml");
        fs::write(&path, "verify_timeout_secs = 0\n").expect("write");
        let err = load_settings(&path).expect_err("zero timeout");
        assert!(format!("{err:#}").contains("verify_timeout_secs must be > 0"));
    }
}
