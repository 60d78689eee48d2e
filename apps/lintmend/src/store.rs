//! Persisted tables and the run lock.
//!
//! The JSON store keeps one file per table under the store directory:
//! `violations.json`, `corrections.json`, `patterns.json`,
//! `sessions.json`. Tables are loaded whole on open and written back
//! atomically on `flush`.

use crate::error::StoreError;
use crate::models::{
    CorrectionPattern, CorrectionRecord, FixOutcome, ReportedViolation, SessionRecord,
    ViolationRecord, ViolationStatus,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const VIOLATIONS_TABLE: &str = "violations.json";
pub const CORRECTIONS_TABLE: &str = "corrections.json";
pub const PATTERNS_TABLE: &str = "patterns.json";
pub const SESSIONS_TABLE: &str = "sessions.json";
pub const LOCK_FILE: &str = "lintmend.lock";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub added: usize,
    pub duplicates: usize,
}

/// Backing storage for violations, corrections, patterns and sessions.
pub trait Store {
    /// Violations still waiting for a fix, in id order.
    fn pending(&self) -> Vec<ViolationRecord>;

    /// Add linter findings as new pending records. A finding at the same
    /// file, line, column and code as a record that is still pending is
    /// ignored; the message text is not part of the match.
    fn import_violations(&mut self, found: Vec<ReportedViolation>) -> ImportStats;

    /// Move violations to their outcome status and log the corrections.
    /// `pending` outcomes (work deferred by a deadline) leave the record
    /// untouched so the next run picks it up again.
    fn apply_outcomes(&mut self, outcomes: &[FixOutcome], at: DateTime<Utc>);

    fn patterns(&self) -> Vec<CorrectionPattern>;

    fn replace_patterns(&mut self, rows: Vec<CorrectionPattern>);

    fn sessions(&self) -> Vec<SessionRecord>;

    fn append_session(&mut self, record: SessionRecord);

    fn flush(&mut self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct JsonStore {
    dir: PathBuf,
    violations: Vec<ViolationRecord>,
    corrections: Vec<CorrectionRecord>,
    patterns: Vec<CorrectionPattern>,
    sessions: Vec<SessionRecord>,
}

impl JsonStore {
    /// Open (creating if needed) the store directory and load every table.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Unreachable {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            violations: load_table(&dir.join(VIOLATIONS_TABLE))?,
            corrections: load_table(&dir.join(CORRECTIONS_TABLE))?,
            patterns: load_table(&dir.join(PATTERNS_TABLE))?,
            sessions: load_table(&dir.join(SESSIONS_TABLE))?,
        })
    }

    pub fn violations(&self) -> &[ViolationRecord] {
        &self.violations
    }

    pub fn corrections(&self) -> &[CorrectionRecord] {
        &self.corrections
    }
}

impl Store for JsonStore {
    fn pending(&self) -> Vec<ViolationRecord> {
        self.violations
            .iter()
            .filter(|v| v.status == ViolationStatus::Pending)
            .cloned()
            .collect()
    }

    fn import_violations(&mut self, found: Vec<ReportedViolation>) -> ImportStats {
        let mut seen: HashSet<(PathBuf, usize, usize, String)> = self
            .violations
            .iter()
            .filter(|v| v.status == ViolationStatus::Pending)
            .map(|v| {
                (
                    v.file_path.clone(),
                    v.line_number,
                    v.column,
                    v.kind_code.to_ascii_uppercase(),
                )
            })
            .collect();
        let mut next_id = self.violations.iter().map(|v| v.id).max().unwrap_or(0) + 1;
        let mut stats = ImportStats::default();
        for f in found {
            let key = (
                f.file_path.clone(),
                f.line_number,
                f.column,
                f.kind_code.to_ascii_uppercase(),
            );
            if !seen.insert(key) {
                stats.duplicates += 1;
                continue;
            }
            self.violations.push(ViolationRecord {
                id: next_id,
                file_path: f.file_path,
                line_number: f.line_number,
                column: f.column,
                kind_code: f.kind_code,
                message: f.message,
                status: ViolationStatus::Pending,
            });
            next_id += 1;
            stats.added += 1;
        }
        stats
    }

    fn apply_outcomes(&mut self, outcomes: &[FixOutcome], at: DateTime<Utc>) {
        let index: HashMap<u64, usize> = self
            .violations
            .iter()
            .enumerate()
            .map(|(i, v)| (v.id, i))
            .collect();
        for o in outcomes {
            if o.status == ViolationStatus::Pending {
                continue;
            }
            if let Some(&i) = index.get(&o.violation_id) {
                self.violations[i].status = o.status;
            }
            if let Some(template) = &o.template {
                self.corrections.push(CorrectionRecord {
                    violation_id: o.violation_id,
                    template_used: template.clone(),
                    success: o.success,
                    timestamp: at,
                });
            }
        }
    }

    fn patterns(&self) -> Vec<CorrectionPattern> {
        self.patterns.clone()
    }

    fn replace_patterns(&mut self, rows: Vec<CorrectionPattern>) {
        self.patterns = rows;
    }

    fn sessions(&self) -> Vec<SessionRecord> {
        self.sessions.clone()
    }

    fn append_session(&mut self, record: SessionRecord) {
        self.sessions.push(record);
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        save_table(&self.dir.join(VIOLATIONS_TABLE), &self.violations)?;
        save_table(&self.dir.join(CORRECTIONS_TABLE), &self.corrections)?;
        save_table(&self.dir.join(PATTERNS_TABLE), &self.patterns)?;
        save_table(&self.dir.join(SESSIONS_TABLE), &self.sessions)?;
        Ok(())
    }
}

fn load_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    match fs::read_to_string(path) {
        Ok(s) if s.trim().is_empty() => Ok(Vec::new()),
        Ok(s) => serde_json::from_str(&s).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(StoreError::Unreachable {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn save_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let mut json = serde_json::to_string_pretty(rows)?;
    json.push('\n');
    let write = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(write)?;
    temp.write_all(json.as_bytes()).map_err(write)?;
    temp.as_file().sync_all().map_err(write)?;
    temp.persist(path).map_err(|e| write(e.error))?;
    Ok(())
}

/// Advisory lock on the store directory, held for the length of a run.
pub struct StoreLock {
    path: PathBuf,
    lock: fd_lock::RwLock<File>,
}

impl StoreLock {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let fail = |source: io::Error| StoreError::Unreachable {
            path: dir.to_path_buf(),
            source,
        };
        fs::create_dir_all(dir).map_err(fail)?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(fail)?;
        Ok(Self {
            path,
            lock: fd_lock::RwLock::new(file),
        })
    }

    /// Take the exclusive lock without waiting. Released when the guard drops.
    pub fn try_acquire(&mut self) -> Result<fd_lock::RwLockWriteGuard<'_, File>, StoreError> {
        let path = &self.path;
        self.lock
            .try_write()
            .map_err(|_| StoreError::Locked { path: path.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn found(file: &str, line: usize, code: &str) -> ReportedViolation {
        ReportedViolation {
            file_path: PathBuf::from(file),
            line_number: line,
            column: 1,
            kind_code: code.to_string(),
            message: "m".into(),
        }
    }

    fn fixed(id: u64, template: Option<&str>) -> FixOutcome {
        FixOutcome {
            violation_id: id,
            file_path: PathBuf::from("a.py"),
            line_number: 1,
            kind_code: "W291".into(),
            template: template.map(str::to_string),
            original_line: "x \n".into(),
            resulting_line: "x\n".into(),
            success: true,
            status: ViolationStatus::Fixed,
            error: None,
        }
    }

    #[test]
    fn test_import_assigns_ids_and_skips_pending_duplicates() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::open(dir.path()).unwrap();
        let stats = store.import_violations(vec![
            found("a.py", 1, "W291"),
            found("a.py", 1, "w291"),
            found("a.py", 2, "E302"),
        ]);
        assert_eq!(stats, ImportStats { added: 2, duplicates: 1 });
        let ids: Vec<u64> = store.pending().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2]);

        store.apply_outcomes(&[fixed(1, Some("strip-trailing-whitespace"))], Utc::now());
        // a fixed record no longer blocks a fresh report of the same finding
        let stats = store.import_violations(vec![found("a.py", 1, "W291")]);
        assert_eq!(stats.added, 1);
        assert_eq!(store.pending().last().unwrap().id, 3);
    }

    #[test]
    fn test_reworded_message_is_still_a_duplicate() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::open(dir.path()).unwrap();
        store.import_violations(vec![found("a.py", 3, "E302")]);
        let again = ReportedViolation {
            message: "expected 2 blank lines, found 1".into(),
            ..found("a.py", 3, "E302")
        };
        let stats = store.import_violations(vec![again]);
        assert_eq!(stats, ImportStats { added: 0, duplicates: 1 });
    }

    #[test]
    fn test_deferred_outcome_leaves_record_pending() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::open(dir.path()).unwrap();
        store.import_violations(vec![found("a.py", 1, "W291"), found("b.py", 1, "W291")]);
        let deferred = FixOutcome {
            violation_id: 2,
            success: false,
            status: ViolationStatus::Pending,
            error: Some("run deadline passed before commit".into()),
            ..fixed(2, Some("strip-trailing-whitespace"))
        };
        store.apply_outcomes(&[fixed(1, Some("strip-trailing-whitespace")), deferred], Utc::now());
        let pending: Vec<u64> = store.pending().iter().map(|v| v.id).collect();
        assert_eq!(pending, vec![2]);
        assert_eq!(store.corrections().len(), 1);
    }

    #[test]
    fn test_flush_and_reopen() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::open(dir.path()).unwrap();
        store.import_violations(vec![found("a.py", 1, "W291")]);
        store.apply_outcomes(&[fixed(1, Some("strip-trailing-whitespace")), fixed(1, None)], Utc::now());
        store.flush().unwrap();

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(reopened.violations()[0].status, ViolationStatus::Fixed);
        assert_eq!(reopened.corrections().len(), 1);
        assert!(reopened.pending().is_empty());
        for table in [VIOLATIONS_TABLE, CORRECTIONS_TABLE, PATTERNS_TABLE, SESSIONS_TABLE] {
            assert!(dir.path().join(table).exists(), "{table} missing");
        }
    }

    #[test]
    fn test_corrupt_table_is_fatal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(VIOLATIONS_TABLE), "{not json").unwrap();
        let err = JsonStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_second_lock_is_refused() {
        let dir = tempdir().unwrap();
        let mut first = StoreLock::open(dir.path()).unwrap();
        let guard = first.try_acquire().unwrap();
        let mut second = StoreLock::open(dir.path()).unwrap();
        assert!(matches!(second.try_acquire(), Err(StoreError::Locked { .. })));
        drop(guard);
        assert!(second.try_acquire().is_ok());
    }
}
