//! In-memory backups of files the installer is about to overwrite or delete.
//!
//! The first backup of a path wins: later requests for the same path are
//! no-ops, so a rollback restores the state from before the run rather than
//! an intermediate one.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::error::{InstallError, RestoreError};
use crate::io::link::symlink;

/// Original state of a backed-up path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupEntry {
    /// Regular file bytes.
    Contents(Vec<u8>),
    /// Symlink target; restored by recreating the link.
    Symlink(PathBuf),
    /// Nothing existed at the path; restoring deletes whatever is there now.
    Absent,
}

/// Backups for a single run, keyed by path.
#[derive(Debug, Default)]
pub struct BackupStore {
    entries: BTreeMap<PathBuf, BackupEntry>,
}

impl BackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current state of `path` unless it is already recorded.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn backup(&mut self, path: &Path) -> Result<(), InstallError> {
        if self.entries.contains_key(path) {
            debug!("already backed up");
            return Ok(());
        }
        let entry = match fs::symlink_metadata(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => BackupEntry::Absent,
            Err(err) => return Err(InstallError::io_at("inspect for backup", path, err)),
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(path)
                    .map_err(|err| InstallError::io_at("read link for backup", path, err))?;
                BackupEntry::Symlink(target)
            }
            Ok(_) => {
                let bytes = fs::read(path)
                    .map_err(|err| InstallError::io_at("read file for backup", path, err))?;
                BackupEntry::Contents(bytes)
            }
        };
        debug!(entry = entry_label(&entry), "backed up");
        self.entries.insert(path.to_path_buf(), entry);
        Ok(())
    }

    /// Restore every recorded path, continuing past individual failures.
    ///
    /// Records are kept; call [`BackupStore::cleanup`] once no further restore is expected.
    #[instrument(skip(self), fields(entries = self.entries.len()))]
    pub fn restore_all(&self) -> Result<(), RestoreError> {
        let mut failures = Vec::new();
        for (path, entry) in &self.entries {
            if let Err(err) = restore_entry(path, entry) {
                warn!(path = %path.display(), err = %err, "restore failed");
                failures.push((path.clone(), err));
            } else {
                debug!(path = %path.display(), entry = entry_label(entry), "restored");
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RestoreError { failures })
        }
    }

    /// Drop all records without restoring anything.
    pub fn cleanup(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, path: &Path) -> Option<&BackupEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn restore_entry(path: &Path, entry: &BackupEntry) -> io::Result<()> {
    match entry {
        BackupEntry::Contents(bytes) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            // A link created during the run would otherwise redirect the write.
            if is_symlink(path) {
                fs::remove_file(path)?;
            }
            fs::write(path, bytes)
        }
        BackupEntry::Symlink(target) => {
            remove_if_present(path)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            symlink(target, path)
        }
        BackupEntry::Absent => remove_if_present(path),
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}

fn entry_label(entry: &BackupEntry) -> &'static str {
    match entry {
        BackupEntry::Contents(_) => "contents",
        BackupEntry::Symlink(_) => "symlink",
        BackupEntry::Absent => "absent",
    }
}
