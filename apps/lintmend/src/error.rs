//! Error taxonomy.
//!
//! - `FixError`: structural, per-violation. Always converted into a
//!   `skipped`/`failed` outcome, never propagated past the engine.
//! - `BackupError`: per-file I/O (snapshot/commit/restore) or fatal setup
//!   when the backup root is unusable.
//! - `StoreError`, `ConfigError`, `ImportError`: fatal setup.
//! - `RunError`: what a whole run can fail with before or after touching
//!   files (store, backup root, session bookkeeping).

use crate::models::ViolationStatus;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Why a dispatch function did not apply its fix.
pub enum FixError {
    #[error("line {line} is out of range (file has {len} lines)")]
    LineOutOfRange { line: usize, len: usize },

    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),

    #[error("already satisfied: {0}")]
    AlreadySatisfied(String),

    #[error("insufficient context: {0}")]
    InsufficientContext(String),

    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("needs manual fix: {0}")]
    NeedsManualFix(String),

    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    #[error("unknown template '{template}' for {code}")]
    UnknownTemplate { code: &'static str, template: String },
}

impl FixError {
    /// Status recorded for the violation when this error is returned.
    pub fn status(&self) -> ViolationStatus {
        match self {
            FixError::LineOutOfRange { .. }
            | FixError::InsufficientContext(_)
            | FixError::UnknownTemplate { .. } => ViolationStatus::Failed,
            FixError::PreconditionNotMet(_)
            | FixError::AlreadySatisfied(_)
            | FixError::NotAllowed(_)
            | FixError::NeedsManualFix(_)
            | FixError::UnsupportedKind(_) => ViolationStatus::Skipped,
        }
    }
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup directory {backup} is inside the scanned tree {tree}")]
    InsideScannedTree { backup: PathBuf, tree: PathBuf },

    #[error("backup directory {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to commit {path}: {reason}")]
    Commit {
        path: PathBuf,
        reason: String,
        restored: bool,
    },

    #[error("failed to restore {path} from {snapshot}: {source}")]
    Restore {
        path: PathBuf,
        snapshot: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store at {path} is unreachable: {source}")]
    Unreachable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("store at {path} is locked by another run")]
    Locked { path: PathBuf },

    #[error("store table {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write store table {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize store table: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read linter report {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to run linter '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("linter '{command}' failed: {stderr}")]
    LinterFailed { command: String, stderr: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} is not active")]
    NotActive(String),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
