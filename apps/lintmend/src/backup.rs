//! Backup Manager: byte-for-byte snapshots outside the scanned tree,
//! atomic commit (temp file in the target's directory + rename), and
//! restore on any commit failure.

use crate::error::BackupError;
use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
/// Snapshot of one file, owned for the duration of that file's pass.
pub struct BackupHandle {
    pub source: PathBuf,
    pub snapshot: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Final step of an atomic write: move the fully written temp file over
/// the target.
pub trait Persist: Send + Sync {
    fn persist(&self, temp: NamedTempFile, target: &Path) -> io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RenamePersist;

impl Persist for RenamePersist {
    fn persist(&self, temp: NamedTempFile, target: &Path) -> io::Result<()> {
        temp.persist(target).map(|_| ()).map_err(|e| e.error)
    }
}

pub struct BackupManager {
    /// `<backup root>/<session id>`.
    root: PathBuf,
    repo_root: PathBuf,
    retain: bool,
    persist: Box<dyn Persist>,
}

impl BackupManager {
    pub fn new(
        backup_root: &Path,
        repo_root: &Path,
        session_id: &str,
        retain: bool,
    ) -> Result<Self, BackupError> {
        Self::with_persist(
            backup_root,
            repo_root,
            session_id,
            retain,
            Box::new(RenamePersist),
        )
    }

    pub fn with_persist(
        backup_root: &Path,
        repo_root: &Path,
        session_id: &str,
        retain: bool,
        persist: Box<dyn Persist>,
    ) -> Result<Self, BackupError> {
        let tree = resolve(repo_root);
        let backup = resolve(backup_root);
        if backup.starts_with(&tree) {
            return Err(BackupError::InsideScannedTree { backup, tree });
        }
        let root = backup.join(session_id);
        fs::create_dir_all(&root).map_err(|source| BackupError::NotWritable {
            path: root.clone(),
            source,
        })?;
        NamedTempFile::new_in(&root).map_err(|source| BackupError::NotWritable {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            repo_root: tree,
            retain,
            persist,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.root
    }

    pub fn snapshot(&self, source: &Path) -> Result<BackupHandle, BackupError> {
        let snapshot = self.root.join(backup_name(&resolve(source), &self.repo_root));
        let wrap = |source: io::Error| BackupError::Snapshot {
            path: snapshot.clone(),
            source,
        };
        if let Some(parent) = snapshot.parent() {
            fs::create_dir_all(parent).map_err(wrap)?;
        }
        fs::copy(source, &snapshot).map_err(wrap)?;
        tracing::debug!(file = %source.display(), snapshot = %snapshot.display(), "snapshot taken");
        Ok(BackupHandle {
            source: source.to_path_buf(),
            snapshot,
            created_at: Utc::now(),
        })
    }

    /// Atomically replace the source file with `content`. Any failure
    /// restores the snapshot before returning.
    pub fn commit(&self, handle: &BackupHandle, content: &str) -> Result<(), BackupError> {
        let Err(err) = self.write_atomic(&handle.source, content) else {
            return Ok(());
        };
        let restored = match self.restore(handle) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(file = %handle.source.display(), error = %e, "restore after failed commit");
                false
            }
        };
        Err(BackupError::Commit {
            path: handle.source.clone(),
            reason: err.to_string(),
            restored,
        })
    }

    fn write_atomic(&self, target: &Path, content: &str) -> io::Result<()> {
        let mut temp = temp_beside(target)?;
        temp.write_all(content.as_bytes())?;
        if let Ok(meta) = fs::metadata(target) {
            temp.as_file().set_permissions(meta.permissions())?;
        }
        temp.as_file().sync_all()?;
        self.persist.persist(temp, target)
    }

    /// Put the snapshot back. A target that still matches it is left alone;
    /// otherwise the snapshot goes through a temp file and rename, so a
    /// failed restore never truncates the target.
    pub fn restore(&self, handle: &BackupHandle) -> Result<(), BackupError> {
        let fail = |source: io::Error| BackupError::Restore {
            path: handle.source.clone(),
            snapshot: handle.snapshot.clone(),
            source,
        };
        let saved = fs::read(&handle.snapshot).map_err(fail)?;
        if fs::read(&handle.source).is_ok_and(|current| current == saved) {
            return Ok(());
        }
        let mut temp = temp_beside(&handle.source).map_err(fail)?;
        temp.write_all(&saved).map_err(fail)?;
        let perms = fs::metadata(&handle.snapshot).map_err(fail)?.permissions();
        temp.as_file().set_permissions(perms).map_err(fail)?;
        temp.as_file().sync_all().map_err(fail)?;
        temp.persist(&handle.source).map_err(|e| fail(e.error))?;
        tracing::warn!(file = %handle.source.display(), "restored from backup");
        Ok(())
    }

    /// Drop the snapshot after a clean pass. Returns whether it was kept.
    pub fn discard(&self, handle: BackupHandle) -> bool {
        if self.retain {
            return true;
        }
        match fs::remove_file(&handle.snapshot) {
            Ok(()) => false,
            Err(e) => {
                tracing::warn!(snapshot = %handle.snapshot.display(), error = %e, "could not remove snapshot");
                true
            }
        }
    }

    /// Remove empty directories left in the session directory.
    pub fn prune(&self) {
        prune_empty(&self.root);
    }
}

fn prune_empty(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    let mut empty = true;
    for entry in entries.flatten() {
        let path = entry.path();
        if !(path.is_dir() && prune_empty(&path)) {
            empty = false;
        }
    }
    empty && fs::remove_dir(dir).is_ok()
}

/// Canonical form of `path`, also for paths that do not exist yet.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(p) = fs::canonicalize(path) {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => resolve(parent).join(name),
        _ => std::env::current_dir()
            .map(|d| d.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Path of a file's snapshot relative to the session directory.
fn backup_name(source: &Path, repo_root: &Path) -> PathBuf {
    let rel = pathdiff::diff_paths(source, repo_root).unwrap_or_else(|| source.to_path_buf());
    rel.components()
        .filter_map(|c| match c {
            Component::ParentDir => Some(OsStr::new("__up")),
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

fn temp_beside(target: &Path) -> io::Result<NamedTempFile> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    NamedTempFile::new_in(dir)
}
