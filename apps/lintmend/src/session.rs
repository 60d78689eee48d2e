//! Session Recorder: append-only log of fix outcomes for one run.

use crate::error::SessionError;
use crate::models::{FileFailure, FixOutcome, Summary, ViolationStatus};
use crate::patterns::PatternStore;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Timestamp-based id, unique per process.
    pub fn generate() -> Self {
        let now = Utc::now();
        Self(format!(
            "{}-{}",
            now.format("%Y%m%dT%H%M%S%3fZ"),
            std::process::id()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
/// What one file's pass produced, as handed over by the engine.
pub struct FileReport {
    pub path: PathBuf,
    pub outcomes: Vec<FixOutcome>,
    /// The buffer differed from the file content.
    pub changed: bool,
    pub committed: bool,
    pub restored: bool,
    pub backup_retained: bool,
    pub failure: Option<String>,
    pub timed_out: bool,
}

#[derive(Debug, Default)]
struct State {
    active: Option<(SessionId, DateTime<Utc>)>,
    outcomes: Vec<FixOutcome>,
    files: usize,
    restored: Vec<PathBuf>,
    failures: Vec<FileFailure>,
    timed_out: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct SessionRecorder {
    state: Mutex<State>,
}

impl SessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a session, discarding anything left from a previous one.
    pub fn start_session(&self) -> SessionId {
        let id = SessionId::generate();
        let mut state = self.lock();
        *state = State {
            active: Some((id.clone(), Utc::now())),
            ..State::default()
        };
        tracing::info!(session = %id, "session started");
        id
    }

    pub fn record(&self, outcome: FixOutcome) {
        self.lock().outcomes.push(outcome);
    }

    /// Append one file's outcomes contiguously and fold them into the
    /// pattern scores. Skipped outcomes say nothing about a template.
    pub fn record_file(&self, report: FileReport, patterns: &PatternStore) {
        for outcome in &report.outcomes {
            let (Some(template), Some(kind)) = (
                outcome.template.as_deref(),
                crate::models::ViolationKind::from_code(&outcome.kind_code),
            ) else {
                continue;
            };
            match outcome.status {
                ViolationStatus::Fixed => patterns.record_outcome(kind, template, true),
                ViolationStatus::Failed => patterns.record_outcome(kind, template, false),
                ViolationStatus::Skipped | ViolationStatus::Pending => {}
            }
        }
        let mut state = self.lock();
        if !report.outcomes.is_empty() || report.failure.is_some() {
            state.files += 1;
        }
        if report.restored {
            state.restored.push(report.path.clone());
        }
        if report.timed_out {
            state.timed_out.push(report.path.clone());
        }
        if let Some(reason) = report.failure {
            state.failures.push(FileFailure {
                file: report.path,
                reason,
            });
        }
        state.outcomes.extend(report.outcomes);
    }

    pub fn outcomes(&self) -> Vec<FixOutcome> {
        self.lock().outcomes.clone()
    }

    pub fn finish_session(&self, id: &SessionId) -> Result<Summary, SessionError> {
        let mut state = self.lock();
        let started_at = match &state.active {
            Some((active, started)) if active == id => *started,
            _ => return Err(SessionError::NotActive(id.to_string())),
        };
        state.active = None;
        let finished_at = Utc::now();
        let mut summary = Summary {
            session_id: id.to_string(),
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            files_processed: state.files,
            attempted: state.outcomes.len(),
            fixed: 0,
            failed: 0,
            skipped: 0,
            restored_files: state.restored.clone(),
            file_failures: state.failures.clone(),
            timed_out_files: state.timed_out.clone(),
            fixed_by_code: BTreeMap::new(),
        };
        for o in &state.outcomes {
            match o.status {
                ViolationStatus::Fixed => {
                    summary.fixed += 1;
                    *summary.fixed_by_code.entry(o.kind_code.clone()).or_default() += 1;
                }
                ViolationStatus::Failed => summary.failed += 1,
                ViolationStatus::Skipped | ViolationStatus::Pending => summary.skipped += 1,
            }
        }
        tracing::info!(
            session = %id,
            attempted = summary.attempted,
            fixed = summary.fixed,
            failed = summary.failed,
            skipped = summary.skipped,
            "session finished"
        );
        Ok(summary)
    }
}
