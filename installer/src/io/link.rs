//! Symlink management for the host plugin directory.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::InstallError;
use crate::io::backup::BackupStore;

/// Create a symlink at `link` pointing to `target`.
#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

/// Create a symlink at `link` pointing to `target`.
#[cfg(windows)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Point `link` at `target`, replacing whatever is at `link`.
///
/// The previous state of `link` is recorded in `backups` first (including "nothing
/// there"), so a rollback removes a freshly created link as well as restoring an
/// older one.
#[instrument(skip(backups), fields(target = %target.display(), link = %link.display()))]
pub fn create_link(
    target: &Path,
    link: &Path,
    backups: &mut BackupStore,
) -> Result<(), InstallError> {
    backups.backup(link)?;

    match fs::symlink_metadata(link) {
        Ok(meta) => {
            debug!(is_symlink = meta.file_type().is_symlink(), "replacing existing entry");
            fs::remove_file(link).map_err(|err| InstallError::io_at("remove", link, err))?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(InstallError::io_at("inspect", link, err)),
    }

    symlink(target, link).map_err(|err| {
        InstallError::Link(format!("failed to create symlink {}: {err}", link.display()))
    })?;

    fs::metadata(link).map_err(|err| {
        InstallError::Link(format!(
            "symlink verification failed for {}: {err}",
            link.display()
        ))
    })?;

    info!("symlink created");
    Ok(())
}

/// Remove `link` if present. Returns `true` when something was removed.
#[instrument(fields(link = %link.display()))]
pub fn remove_link(link: &Path) -> Result<bool, InstallError> {
    match fs::symlink_metadata(link) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("link already absent");
            Ok(false)
        }
        Err(err) => Err(InstallError::Link(format!(
            "failed to inspect symlink {}: {err}",
            link.display()
        ))),
        Ok(_) => {
            fs::remove_file(link).map_err(|err| {
                InstallError::Link(format!("failed to remove symlink {}: {err}", link.display()))
            })?;
            info!("symlink removed");
            Ok(true)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::io::backup::BackupEntry;

    #[test]
    fn create_link_points_at_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("index.js");
        let link = temp.path().join("cursor-acp.js");
        fs::write(&target, "module.exports = {}").expect("write");

        let mut backups = BackupStore::new();
        create_link(&target, &link, &mut backups).expect("link");

        assert_eq!(fs::read_link(&link).expect("read link"), target);
        assert_eq!(backups.get(&link), Some(&BackupEntry::Absent));
    }

    #[test]
    fn create_link_replaces_existing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("index.js");
        let link = temp.path().join("cursor-acp.js");
        fs::write(&target, "new").expect("write target");
        fs::write(&link, "stale copy").expect("write stale");

        let mut backups = BackupStore::new();
        create_link(&target, &link, &mut backups).expect("link");

        assert_eq!(fs::read_to_string(&link).expect("read"), "new");
        assert_eq!(
            backups.get(&link),
            Some(&BackupEntry::Contents(b"stale copy".to_vec()))
        );
    }

    #[test]
    fn create_link_fails_when_target_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let link = temp.path().join("cursor-acp.js");

        let mut backups = BackupStore::new();
        let err = create_link(&temp.path().join("missing.js"), &link, &mut backups)
            .expect_err("dangling link should fail verification");
        assert!(matches!(err, InstallError::Link(_)));
    }

    #[test]
    fn remove_link_is_noop_when_absent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let removed = remove_link(&temp.path().join("cursor-acp.js")).expect("remove");
        assert!(!removed);
    }

    #[test]
    fn remove_link_keeps_target() {
        let temp = tempfile::tempdir().expect("tempdir");
        let target = temp.path().join("index.js");
        let link = temp.path().join("cursor-acp.js");
        fs::write(&target, "x").expect("write");
        symlink(&target, &link).expect("link");

        assert!(remove_link(&link).expect("remove"));
        assert!(fs::symlink_metadata(&link).is_err());
        assert!(target.exists());
    }
}
