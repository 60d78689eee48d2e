//! Shared data models for violations, fix outcomes, patterns and sessions.
//!
//! These mirror the persisted tables (`violations`, `corrections`,
//! `patterns`, `sessions`) and the in-memory records passed between the
//! engine, the session recorder and the printers.

pub mod kind;

pub use kind::{LineEffect, ViolationKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Lifecycle of a violation record.
pub enum ViolationStatus {
    Pending,
    Fixed,
    Failed,
    Skipped,
}

impl ViolationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationStatus::Pending => "pending",
            ViolationStatus::Fixed => "fixed",
            ViolationStatus::Failed => "failed",
            ViolationStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single line-addressed violation reported by the external linter.
pub struct ViolationRecord {
    pub id: u64,
    pub file_path: PathBuf,
    /// 1-based.
    pub line_number: usize,
    pub column: usize,
    pub kind_code: String,
    pub message: String,
    pub status: ViolationStatus,
}

impl ViolationRecord {
    pub fn kind(&self) -> Option<ViolationKind> {
        ViolationKind::from_code(&self.kind_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One line of linter output, before it is assigned an id.
pub struct ReportedViolation {
    pub file_path: PathBuf,
    pub line_number: usize,
    pub column: usize,
    pub kind_code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Result of one attempted fix. Created once, never mutated afterwards
/// except by the engine when a commit fails and the fix did not land.
pub struct FixOutcome {
    pub violation_id: u64,
    pub file_path: PathBuf,
    pub line_number: usize,
    pub kind_code: String,
    pub template: Option<String>,
    pub original_line: String,
    pub resulting_line: String,
    pub success: bool,
    pub status: ViolationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FixOutcome {
    /// Downgrade a fix that was applied in memory but never reached disk.
    pub(crate) fn revoke(&mut self, status: ViolationStatus, reason: &str) {
        if self.success {
            self.success = false;
            self.status = status;
            self.resulting_line = self.original_line.clone();
            self.error = Some(reason.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Confidence-scored correction template for one violation kind.
pub struct CorrectionPattern {
    pub kind_code: String,
    pub template: String,
    pub confidence: f64,
    pub usage_count: u64,
    #[serde(default)]
    pub success_count: u64,
    pub success_rate: f64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Row of the `corrections` table.
pub struct CorrectionRecord {
    pub violation_id: u64,
    pub template_used: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Row of the `sessions` table.
pub struct SessionRecord {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub files_processed: usize,
    pub violations_fixed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A file whose pass was aborted by an I/O failure.
pub struct FileFailure {
    pub file: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
/// Aggregated result of one session, used by printers and the store.
pub struct Summary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub files_processed: usize,
    pub attempted: usize,
    pub fixed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub restored_files: Vec<PathBuf>,
    pub file_failures: Vec<FileFailure>,
    pub timed_out_files: Vec<PathBuf>,
    pub fixed_by_code: BTreeMap<String, usize>,
}

impl Summary {
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            session_id: self.session_id.clone(),
            start_time: self.started_at,
            end_time: self.finished_at,
            files_processed: self.files_processed,
            violations_fixed: self.fixed,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.fixed as f64 / self.attempted as f64 * 100.0
        }
    }
}
