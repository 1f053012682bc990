//! Load, save, and re-validate JSON configuration files (`opencode.json`, `package.json`).

use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::document::empty_document;
use crate::error::InstallError;

/// Read and parse a JSON object. A missing file yields an empty object.
#[instrument(fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<Value, InstallError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("config missing, starting from empty document");
            return Ok(empty_document());
        }
        Err(err) => return Err(InstallError::io_at("read", path, err)),
    };
    let doc: Value =
        serde_json::from_str(&contents).map_err(|err| InstallError::parse_at(path, err))?;
    if !doc.is_object() {
        return Err(InstallError::Validation(format!(
            "{} must contain a JSON object at the top level",
            path.display()
        )));
    }
    Ok(doc)
}

/// Serialize `doc` as two-space indented JSON and replace `path` atomically.
///
/// Parent directories are created as needed.
#[instrument(skip(doc), fields(path = %path.display()))]
pub fn save(doc: &Value, path: &Path) -> Result<(), InstallError> {
    let mut buf = serde_json::to_string_pretty(doc).map_err(|err| InstallError::Parse {
        context: format!("serialize {}", path.display()),
        source: err,
    })?;
    buf.push('\n');
    write_atomic(path, &buf)?;
    debug!(bytes = buf.len(), "config written");
    Ok(())
}

/// Re-read `path` and confirm it parses as JSON.
///
/// Kept separate from [`save`]: a successful write does not prove the file on disk
/// is still valid (truncation, a concurrent external edit).
#[instrument(fields(path = %path.display()))]
pub fn validate(path: &Path) -> Result<Value, InstallError> {
    let contents = fs::read_to_string(path).map_err(|err| InstallError::io_at("read", path, err))?;
    serde_json::from_str(&contents).map_err(|err| InstallError::parse_at(path, err))
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), InstallError> {
    let parent = path.parent().ok_or_else(|| {
        InstallError::Validation(format!("config path missing parent {}", path.display()))
    })?;
    fs::create_dir_all(parent)
        .map_err(|err| InstallError::io_at("create directory", parent, err))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .map_err(|err| InstallError::io_at("write temp config", &tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| InstallError::io_at("replace config", path, err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{provider, upsert_provider};
    use crate::core::provider::{DEFAULT_BASE_URL, PROVIDER_ID, provider_spec};
    use serde_json::json;

    #[test]
    fn load_missing_returns_empty_object() {
        let temp = tempfile::tempdir().expect("tempdir");
        let doc = load(&temp.path().join("opencode.json")).expect("load");
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn load_malformed_is_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("opencode.json");
        fs::write(&path, "{\"provider\": ").expect("write");
        let err = load(&path).expect_err("malformed");
        assert!(matches!(err, InstallError::Parse { .. }));
    }

    #[test]
    fn upsert_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("opencode.json");
        fs::write(
            &path,
            "{\"$schema\": \"https://opencode.ai/config.json\", \"theme\": \"dark\"}",
        )
        .expect("write");

        let mut doc = load(&path).expect("load");
        let spec = provider_spec(DEFAULT_BASE_URL);
        upsert_provider(&mut doc, PROVIDER_ID, spec.clone());
        save(&doc, &path).expect("save");

        let reloaded = load(&path).expect("reload");
        assert_eq!(provider(&reloaded, PROVIDER_ID), Some(&spec));
        assert_eq!(reloaded["theme"], "dark");
        let keys: Vec<&String> = reloaded.as_object().expect("object").keys().collect();
        assert_eq!(keys, vec!["$schema", "theme", "provider"]);
    }

    #[test]
    fn save_creates_parent_dirs_and_indents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("a").join("b").join("opencode.json");
        save(&json!({"plugin": []}), &path).expect("save");
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "{\n  \"plugin\": []\n}\n");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn validate_rejects_truncated_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("opencode.json");
        fs::write(&path, "{\"provider\": {\"cursor-acp\"").expect("write");
        assert!(matches!(validate(&path), Err(InstallError::Parse { .. })));
    }
}
