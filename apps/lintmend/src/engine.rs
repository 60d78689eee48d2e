//! Correction Engine and run orchestration.
//!
//! Within a file, fixes are applied to an in-memory buffer in strictly
//! descending line order, so every fix addresses the line number the linter
//! reported. Ties on one line run content edits first, then edits that grow
//! the file at or after the line, then edits that insert before or delete;
//! remaining ties go by violation id. Files are processed in parallel and
//! never share a buffer.

use crate::backup::BackupManager;
use crate::buffer::LineBuffer;
use crate::config::Effective;
use crate::error::{BackupError, FixError, RunError};
use crate::fixes::{apply_fix, FixOptions};
use crate::models::{FixOutcome, LineEffect, Summary, ViolationRecord, ViolationStatus};
use crate::patterns::PatternStore;
use crate::session::{FileReport, SessionId, SessionRecorder};
use crate::store::Store;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

/// Applies fixes to one in-memory buffer.
pub struct CorrectionEngine<'a> {
    fix: &'a FixOptions,
    patterns: &'a PatternStore,
}

impl<'a> CorrectionEngine<'a> {
    pub fn new(fix: &'a FixOptions, patterns: &'a PatternStore) -> Self {
        Self { fix, patterns }
    }

    /// Apply every violation to `buffer`. Returns one outcome per
    /// violation, in processing order.
    pub fn correct_buffer(
        &self,
        buffer: &mut LineBuffer,
        violations: &[ViolationRecord],
    ) -> Vec<FixOutcome> {
        let mut ordered: Vec<&ViolationRecord> = violations.iter().collect();
        ordered.sort_by(|a, b| fix_order(a, b));
        // (first line, reported line, violation id) of fixes that rewrote
        // lines above the line they were reported on
        let mut absorbed: Vec<(usize, usize, u64)> = Vec::new();
        let mut outcomes = Vec::with_capacity(ordered.len());
        for v in ordered {
            let covering = absorbed
                .iter()
                .find(|(from, to, _)| (*from..*to).contains(&v.line_number));
            if let Some(&(_, _, by)) = covering {
                outcomes.push(absorbed_outcome(v, by));
                continue;
            }
            let (outcome, above) = self.apply_one(buffer, v);
            if above > 0 {
                absorbed.push((v.line_number - above, v.line_number, v.id));
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Returns the outcome and how many lines above the reported line the
    /// applied fix rewrote.
    fn apply_one(&self, buffer: &mut LineBuffer, v: &ViolationRecord) -> (FixOutcome, usize) {
        let current = buffer
            .index_of(v.line_number)
            .map(|i| buffer.line(i).render())
            .unwrap_or_default();
        let mut outcome = FixOutcome {
            violation_id: v.id,
            file_path: v.file_path.clone(),
            line_number: v.line_number,
            kind_code: v.kind_code.clone(),
            template: None,
            original_line: current.clone(),
            resulting_line: current,
            success: false,
            status: ViolationStatus::Skipped,
            error: None,
        };
        let Some(kind) = v.kind() else {
            outcome.error = Some(FixError::UnsupportedKind(v.kind_code.clone()).to_string());
            return (outcome, 0);
        };

        let mut ranked: Vec<String> = self
            .patterns
            .ranked_templates(kind)
            .into_iter()
            .map(|t| t.id)
            .collect();
        if ranked.is_empty() {
            ranked = kind.templates().iter().map(|t| t.to_string()).collect();
        }

        let mut errors: Vec<(String, FixError)> = Vec::new();
        for template in ranked {
            match apply_fix(kind, &template, buffer, v.line_number, self.fix) {
                Ok(applied) => {
                    tracing::debug!(id = v.id, code = kind.code(), line = v.line_number, template = %template, "fixed");
                    outcome.template = Some(template);
                    outcome.original_line = applied.original;
                    outcome.resulting_line = applied.resulting;
                    outcome.success = true;
                    outcome.status = ViolationStatus::Fixed;
                    return (outcome, applied.absorbed_above);
                }
                Err(e) => errors.push((template, e)),
            }
        }

        let (template, err) = summarize_errors(errors);
        tracing::debug!(id = v.id, code = kind.code(), line = v.line_number, error = %err, "not fixed");
        outcome.template = Some(template);
        outcome.status = err.status();
        outcome.error = Some(err.to_string());
        (outcome, 0)
    }
}

fn absorbed_outcome(v: &ViolationRecord, by: u64) -> FixOutcome {
    let err = FixError::AlreadySatisfied(format!(
        "line was rewritten by the fix for violation {by}"
    ));
    FixOutcome {
        violation_id: v.id,
        file_path: v.file_path.clone(),
        line_number: v.line_number,
        kind_code: v.kind_code.clone(),
        template: None,
        original_line: String::new(),
        resulting_line: String::new(),
        success: false,
        status: err.status(),
        error: Some(err.to_string()),
    }
}

/// Single template: its own error. Several: the first one when it is a
/// hard failure, otherwise a combined manual-fix explanation.
fn summarize_errors(mut errors: Vec<(String, FixError)>) -> (String, FixError) {
    if errors.len() > 1 && errors[0].1.status() == ViolationStatus::Skipped {
        let detail = errors
            .iter()
            .map(|(t, e)| format!("{t}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        let first = errors.swap_remove(0).0;
        return (
            first,
            FixError::NeedsManualFix(format!("no template applies ({detail})")),
        );
    }
    errors.swap_remove(0)
}

fn line_effect(v: &ViolationRecord) -> LineEffect {
    v.kind().map_or(LineEffect::InPlace, |k| k.line_effect())
}

fn fix_order(a: &ViolationRecord, b: &ViolationRecord) -> Ordering {
    b.line_number
        .cmp(&a.line_number)
        .then_with(|| line_effect(a).cmp(&line_effect(b)))
        .then_with(|| a.id.cmp(&b.id))
}

/// Everything a run needs, created at run start and dropped at run end.
pub struct RunContext {
    pub settings: Effective,
    pub patterns: PatternStore,
    pub recorder: SessionRecorder,
    pub backups: BackupManager,
    pub session: SessionId,
    pub deadline: Option<Instant>,
    exclude: Vec<glob::Pattern>,
}

impl RunContext {
    pub fn new(
        settings: Effective,
        patterns: PatternStore,
        recorder: SessionRecorder,
        backups: BackupManager,
        session: SessionId,
    ) -> Self {
        let deadline = settings
            .timeout_secs
            .map(|s| Instant::now() + Duration::from_secs(s));
        let exclude = settings
            .exclude
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pat) => Some(pat),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();
        Self {
            settings,
            patterns,
            recorder,
            backups,
            session,
            deadline,
            exclude,
        }
    }

    pub fn engine(&self) -> CorrectionEngine<'_> {
        CorrectionEngine::new(&self.settings.fix, &self.patterns)
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let rel = if path.is_absolute() {
            pathdiff::diff_paths(path, &self.settings.repo_root).unwrap_or_else(|| path.to_path_buf())
        } else {
            path.to_path_buf()
        };
        self.exclude.iter().any(|p| p.matches_path(&rel))
    }

    /// One file's full pass: snapshot, fix in memory, commit or restore.
    pub fn correct_file(&self, path: &Path, violations: &[ViolationRecord]) -> FileReport {
        let _span = tracing::info_span!("file", path = %path.display()).entered();
        let mut report = FileReport {
            path: path.to_path_buf(),
            ..FileReport::default()
        };
        if self.is_excluded(path) {
            report.outcomes = untouched(violations, ViolationStatus::Skipped, "file is excluded by configuration");
            return report;
        }
        if self.deadline_passed() {
            report.timed_out = true;
            report.outcomes = untouched(violations, ViolationStatus::Pending, "run deadline passed before the file was processed");
            return report;
        }

        let full = self.settings.repo_root.join(path);
        let handle = match self.backups.snapshot(&full) {
            Ok(h) => h,
            Err(e) => return abort(report, violations, e.to_string()),
        };
        // a failed pass keeps its snapshot
        report.backup_retained = true;
        let original = match fs::read(&full).map(String::from_utf8) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return abort(report, violations, "file is not valid UTF-8".into()),
            Err(e) => return abort(report, violations, format!("failed to read file: {e}")),
        };

        let mut buffer = LineBuffer::parse(&original);
        report.outcomes = self.engine().correct_buffer(&mut buffer, violations);
        let content = buffer.render();
        let any_failed = report
            .outcomes
            .iter()
            .any(|o| o.status == ViolationStatus::Failed);

        if content == original {
            if !any_failed {
                report.backup_retained = self.backups.discard(handle);
            }
            return report;
        }
        report.changed = true;

        if self.deadline_passed() {
            tracing::warn!("deadline passed before commit; file left untouched");
            report.timed_out = true;
            for o in &mut report.outcomes {
                o.revoke(ViolationStatus::Pending, "run deadline passed before commit");
            }
            report.backup_retained = self.backups.discard(handle);
            return report;
        }

        match self.backups.commit(&handle, &content) {
            Ok(()) => {
                report.committed = true;
                if !any_failed {
                    report.backup_retained = self.backups.discard(handle);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, snapshot = %handle.snapshot.display(), "commit failed");
                report.restored = matches!(e, BackupError::Commit { restored: true, .. });
                let reason = e.to_string();
                fail_all(&mut report.outcomes, &reason);
                report.failure = Some(reason);
            }
        }
        report
    }

    /// Process every file group in parallel, then record the reports in
    /// path order.
    pub fn run(&self, groups: Vec<(PathBuf, Vec<ViolationRecord>)>) {
        let work = || -> Vec<FileReport> {
            groups
                .par_iter()
                .map(|(path, violations)| self.correct_file(path, violations))
                .collect()
        };
        let reports = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.jobs)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                tracing::warn!(error = %e, "falling back to the global thread pool");
                work()
            }
        };
        for report in reports {
            self.recorder.record_file(report, &self.patterns);
        }
    }

    pub fn finish(&self) -> Result<Summary, RunError> {
        let summary = self.recorder.finish_session(&self.session)?;
        self.backups.prune();
        Ok(summary)
    }
}

fn untouched(violations: &[ViolationRecord], status: ViolationStatus, reason: &str) -> Vec<FixOutcome> {
    violations
        .iter()
        .map(|v| FixOutcome {
            violation_id: v.id,
            file_path: v.file_path.clone(),
            line_number: v.line_number,
            kind_code: v.kind_code.clone(),
            template: None,
            original_line: String::new(),
            resulting_line: String::new(),
            success: false,
            status,
            error: Some(reason.to_string()),
        })
        .collect()
}

fn abort(mut report: FileReport, violations: &[ViolationRecord], reason: String) -> FileReport {
    tracing::error!(reason = %reason, "file pass aborted");
    report.outcomes = untouched(violations, ViolationStatus::Failed, &reason);
    report.failure = Some(reason);
    report
}

fn fail_all(outcomes: &mut [FixOutcome], reason: &str) {
    for o in outcomes {
        o.revoke(ViolationStatus::Failed, reason);
        o.status = ViolationStatus::Failed;
        if o.error.is_none() {
            o.error = Some(reason.to_string());
        }
    }
}

/// Lexically drop `.` and fold `..` components.
fn fold(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(c);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Identity of a reported file: its resolved location, relative to the
/// repo root when it lives under it.
fn file_key(path: &Path, root: &Path, base: &Path) -> PathBuf {
    let joined = fold(&root.join(path));
    let resolved = fs::canonicalize(&joined).unwrap_or(joined);
    match resolved.strip_prefix(base) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => resolved,
    }
}

/// Group pending violations by file and keep the first `max_files` files.
/// Different spellings of one file (`./a.py`, `/repo/a.py`) share a group.
pub fn group_pending(
    pending: Vec<ViolationRecord>,
    repo_root: &Path,
    max_files: usize,
) -> Vec<(PathBuf, Vec<ViolationRecord>)> {
    let base = fs::canonicalize(repo_root).unwrap_or_else(|_| fold(repo_root));
    let mut groups: BTreeMap<PathBuf, Vec<ViolationRecord>> = BTreeMap::new();
    for v in pending {
        groups
            .entry(file_key(&v.file_path, repo_root, &base))
            .or_default()
            .push(v);
    }
    groups.into_iter().take(max_files).collect()
}

#[derive(Debug, Clone)]
/// What a finished run hands back to the printers.
pub struct SessionReport {
    pub summary: Summary,
    pub outcomes: Vec<FixOutcome>,
}

/// Full run against a store: load pending violations, correct up to
/// `max_files` files, persist statuses, corrections, patterns and the
/// session row.
pub fn run_session<S: Store>(store: &mut S, settings: Effective) -> Result<SessionReport, RunError> {
    let patterns = PatternStore::from_patterns(store.patterns(), settings.learning_step);
    let recorder = SessionRecorder::new();
    let session = recorder.start_session();
    let backups = BackupManager::new(
        &settings.backup_dir,
        &settings.repo_root,
        session.as_str(),
        settings.retain_backups,
    )?;
    let groups = group_pending(store.pending(), &settings.repo_root, settings.max_files);
    tracing::info!(files = groups.len(), session = %session, "correcting");

    let ctx = RunContext::new(settings, patterns, recorder, backups, session);
    ctx.run(groups);
    let summary = ctx.finish()?;

    let outcomes = ctx.recorder.outcomes();
    store.apply_outcomes(&outcomes, summary.finished_at);
    store.replace_patterns(ctx.patterns.snapshot(None));
    store.append_session(summary.to_record());
    store.flush()?;
    Ok(SessionReport { summary, outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::Persist;
    use std::io;
    use tempfile::{tempdir, NamedTempFile};

    fn v(id: u64, line: usize, code: &str) -> ViolationRecord {
        ViolationRecord {
            id,
            file_path: PathBuf::from("a.py"),
            line_number: line,
            column: 1,
            kind_code: code.to_string(),
            message: String::new(),
            status: ViolationStatus::Pending,
        }
    }

    fn correct(src: &str, violations: &[ViolationRecord]) -> (String, Vec<FixOutcome>) {
        let fix = FixOptions::default();
        let patterns = PatternStore::with_builtin(0.1);
        let mut buf = LineBuffer::parse(src);
        let outcomes = CorrectionEngine::new(&fix, &patterns).correct_buffer(&mut buf, violations);
        (buf.render(), outcomes)
    }

    #[test]
    fn test_five_line_scenario() {
        let src = "a\n   \ndef f():\n  pass\nb";
        let violations = [v(1, 2, "W293"), v(2, 3, "E302"), v(3, 5, "W292")];
        let (out, outcomes) = correct(src, &violations);
        assert_eq!(out, "a\n\n\n\ndef f():\n  pass\nb\n");
        assert!(outcomes.iter().all(|o| o.status == ViolationStatus::Fixed));
        let order: Vec<u64> = outcomes.iter().map(|o| o.violation_id).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let src = "a\n   \ndef f():\n  pass\nb";
        let violations = [v(1, 2, "W293"), v(2, 3, "E302"), v(3, 5, "W292")];
        let (once, _) = correct(src, &violations);
        let (twice, outcomes) = correct(&once, &violations);
        assert_eq!(twice, once);
        assert!(outcomes.iter().all(|o| o.status == ViolationStatus::Skipped));
    }

    #[test]
    fn test_line_shift_safety_with_insertion_at_line_three() {
        let src = "import os\nx = 1\ndef f():   \n    a = 1\n    b = 2\n    c = 3\n    return a\n\n\ny = 2  \n";
        let violations = [v(1, 3, "E302"), v(2, 3, "W291"), v(3, 10, "W291")];
        let (out, outcomes) = correct(src, &violations);
        assert_eq!(
            out,
            "import os\nx = 1\n\n\ndef f():\n    a = 1\n    b = 2\n    c = 3\n    return a\n\n\ny = 2\n"
        );
        assert!(outcomes.iter().all(|o| o.success));
        let last = outcomes.iter().find(|o| o.violation_id == 3).unwrap();
        assert_eq!(last.original_line, "y = 2  \n");
        assert_eq!(last.resulting_line, "y = 2\n");
        // same-line tie: the in-place edit runs before the insertion
        let order: Vec<u64> = outcomes.iter().map(|o| o.violation_id).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_overlapping_blank_line_violations() {
        let src = "x = 1\n\n\n\n\ndef f():\n    pass\n";
        let violations = [v(1, 6, "E302"), v(2, 5, "E303")];
        let (out, outcomes) = correct(src, &violations);
        assert_eq!(out, "x = 1\n\n\ndef f():\n    pass\n");
        assert_eq!(outcomes[0].violation_id, 1);
        assert_eq!(outcomes[0].status, ViolationStatus::Skipped);
        assert_eq!(outcomes[1].status, ViolationStatus::Fixed);
    }

    #[test]
    fn test_lines_removed_by_a_blank_run_fix_are_not_edited_again() {
        let (out, outcomes) = correct("a\n\n\n\n  \nb\n", &[v(1, 5, "W293"), v(2, 6, "E303")]);
        assert_eq!(out, "a\n\n\nb\n");
        assert_eq!(outcomes[0].violation_id, 2);
        assert_eq!(outcomes[0].status, ViolationStatus::Fixed);
        assert_eq!(outcomes[1].status, ViolationStatus::Skipped);
        assert!(outcomes[1].error.as_deref().unwrap().contains("rewritten"));

        let (out, outcomes) = correct("x = 1\n\n  \n\n", &[v(1, 4, "W391"), v(2, 3, "W293")]);
        assert_eq!(out, "x = 1\n");
        assert_eq!(outcomes[0].status, ViolationStatus::Fixed);
        assert_eq!(outcomes[1].status, ViolationStatus::Skipped);

        // a second pass finds nothing left to change
        let (again, _) = correct(&out, &[v(1, 4, "W391"), v(2, 3, "W293")]);
        assert_eq!(again, out);
    }

    #[test]
    fn test_spellings_of_one_file_share_a_group() {
        let repo = tempdir().unwrap();
        fs::write(repo.path().join("a.py"), "x = 1 \n").unwrap();
        let mut a = v(1, 1, "W291");
        a.file_path = PathBuf::from("./a.py");
        let mut b = v(2, 1, "W293");
        b.file_path = repo.path().join("a.py");
        let c = v(3, 1, "E261");
        let groups = group_pending(vec![a, b, c], repo.path(), 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, PathBuf::from("a.py"));
        assert_eq!(groups[0].1.len(), 3);
    }

    #[test]
    fn test_each_violation_gets_exactly_one_outcome() {
        let src = "import requests\nx = 1 \n";
        let violations = [
            v(1, 1, "F401"),
            v(2, 2, "W291"),
            v(3, 99, "W291"),
            v(4, 1, "X999"),
        ];
        let (out, outcomes) = correct(src, &violations);
        assert_eq!(out, "import requests\nx = 1\n");
        assert_eq!(outcomes.len(), 4);
        let status = |id: u64| outcomes.iter().find(|o| o.violation_id == id).unwrap().status;
        assert_eq!(status(1), ViolationStatus::Skipped);
        assert_eq!(status(2), ViolationStatus::Fixed);
        assert_eq!(status(3), ViolationStatus::Failed);
        assert_eq!(status(4), ViolationStatus::Skipped);
        let unknown = outcomes.iter().find(|o| o.violation_id == 4).unwrap();
        assert!(unknown.template.is_none());
        assert!(unknown.error.as_deref().unwrap().contains("X999"));
    }

    #[test]
    fn test_overlong_line_falls_through_ranked_templates() {
        let src = "from os.path import join, dirname, basename, splitext, abspath, normpath\n";
        let (out, outcomes) = correct(src, &[v(1, 1, "E501")]);
        assert!(out.starts_with("from os.path import (\n"));
        assert_eq!(outcomes[0].template.as_deref(), Some("wrap-from-import"));

        let (_, outcomes) = correct("x = compute(alpha, beta, gamma)\n", &[v(1, 1, "E501")]);
        assert_eq!(outcomes[0].status, ViolationStatus::Skipped);
        assert!(outcomes[0].error.as_deref().unwrap().contains("needs manual fix"));
    }

    struct FailingPersist;

    impl Persist for FailingPersist {
        fn persist(&self, _temp: NamedTempFile, _target: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "injected rename failure"))
        }
    }

    fn context(repo: &Path, backups: &Path, persist: Box<dyn Persist>) -> RunContext {
        let settings = Effective {
            repo_root: repo.to_path_buf(),
            store_dir: repo.join(".lintmend"),
            backup_dir: backups.to_path_buf(),
            output: "human".into(),
            max_files: 10,
            jobs: 2,
            timeout_secs: None,
            retain_backups: false,
            exclude: vec!["vendor/**".into()],
            fix: FixOptions::default(),
            learning_step: 0.1,
        };
        let recorder = SessionRecorder::new();
        let session = recorder.start_session();
        let backups =
            BackupManager::with_persist(backups, repo, session.as_str(), false, persist).unwrap();
        RunContext::new(settings, PatternStore::with_builtin(0.1), recorder, backups, session)
    }

    #[test]
    fn test_correct_file_commits_and_discards_backup() {
        let repo = tempdir().unwrap();
        let backups = tempdir().unwrap();
        fs::write(repo.path().join("a.py"), "x = 1 \r\ny = 2\r\n").unwrap();
        let ctx = context(repo.path(), backups.path(), Box::new(crate::backup::RenamePersist));
        let report = ctx.correct_file(Path::new("a.py"), &[v(1, 1, "W291")]);
        assert!(report.committed && !report.backup_retained);
        assert_eq!(
            fs::read_to_string(repo.path().join("a.py")).unwrap(),
            "x = 1\r\ny = 2\r\n"
        );
    }

    #[test]
    fn test_failed_commit_restores_original_and_keeps_backup() {
        let repo = tempdir().unwrap();
        let backups = tempdir().unwrap();
        let original = b"a\n   \ndef f():\n  pass\nb";
        fs::write(repo.path().join("a.py"), original).unwrap();
        let ctx = context(repo.path(), backups.path(), Box::new(FailingPersist));
        let report = ctx.correct_file(
            Path::new("a.py"),
            &[v(1, 2, "W293"), v(2, 3, "E302"), v(3, 5, "W292")],
        );
        assert_eq!(fs::read(repo.path().join("a.py")).unwrap(), original);
        assert!(report.restored && report.backup_retained && !report.committed);
        assert!(report.failure.is_some());
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == ViolationStatus::Failed && !o.success));
        let snapshot = ctx.backups.session_dir().join("a.py");
        assert_eq!(fs::read(snapshot).unwrap(), original);
    }

    #[test]
    fn test_unchanged_file_is_not_written() {
        let repo = tempdir().unwrap();
        let backups = tempdir().unwrap();
        fs::write(repo.path().join("a.py"), "x = 1\n").unwrap();
        let ctx = context(repo.path(), backups.path(), Box::new(FailingPersist));
        let report = ctx.correct_file(Path::new("a.py"), &[v(1, 1, "W291")]);
        assert!(!report.changed && !report.committed && report.failure.is_none());
        assert_eq!(report.outcomes[0].status, ViolationStatus::Skipped);
    }

    #[test]
    fn test_unreadable_and_non_utf8_files_fail_the_pass() {
        let repo = tempdir().unwrap();
        let backups = tempdir().unwrap();
        fs::write(repo.path().join("bin.py"), [0xff, 0xfe, b'\n']).unwrap();
        let ctx = context(repo.path(), backups.path(), Box::new(crate::backup::RenamePersist));
        let report = ctx.correct_file(Path::new("bin.py"), &[v(1, 1, "W291")]);
        assert_eq!(report.outcomes[0].status, ViolationStatus::Failed);
        assert!(report.failure.as_deref().unwrap().contains("UTF-8"));

        let report = ctx.correct_file(Path::new("missing.py"), &[v(2, 1, "W291")]);
        assert_eq!(report.outcomes[0].status, ViolationStatus::Failed);
        assert!(report.failure.is_some());
    }

    #[test]
    fn test_excluded_and_timed_out_files_are_untouched() {
        let repo = tempdir().unwrap();
        let backups = tempdir().unwrap();
        fs::create_dir_all(repo.path().join("vendor")).unwrap();
        fs::write(repo.path().join("vendor/x.py"), "x = 1 \n").unwrap();
        fs::write(repo.path().join("a.py"), "x = 1 \n").unwrap();
        let mut ctx = context(repo.path(), backups.path(), Box::new(crate::backup::RenamePersist));

        let report = ctx.correct_file(Path::new("vendor/x.py"), &[v(1, 1, "W291")]);
        assert_eq!(report.outcomes[0].status, ViolationStatus::Skipped);
        assert_eq!(fs::read_to_string(repo.path().join("vendor/x.py")).unwrap(), "x = 1 \n");

        ctx.deadline = Some(Instant::now());
        let report = ctx.correct_file(Path::new("a.py"), &[v(2, 1, "W291")]);
        assert!(report.timed_out);
        assert_eq!(report.outcomes[0].status, ViolationStatus::Pending);
        assert_eq!(fs::read_to_string(repo.path().join("a.py")).unwrap(), "x = 1 \n");
    }

    #[test]
    fn test_run_records_files_in_path_order_and_learns() {
        let repo = tempdir().unwrap();
        let backups = tempdir().unwrap();
        for name in ["b.py", "a.py", "c.py"] {
            fs::write(repo.path().join(name), "x = 1 \n").unwrap();
        }
        let ctx = context(repo.path(), backups.path(), Box::new(crate::backup::RenamePersist));
        let pending: Vec<ViolationRecord> = ["c.py", "./a.py", "b.py"]
            .iter()
            .enumerate()
            .map(|(i, f)| ViolationRecord {
                file_path: PathBuf::from(f),
                ..v(i as u64 + 1, 1, "W291")
            })
            .collect();
        let groups = group_pending(pending, repo.path(), 2);
        assert_eq!(groups.len(), 2);
        ctx.run(groups);
        let files: Vec<PathBuf> = ctx.recorder.outcomes().iter().map(|o| o.file_path.clone()).collect();
        assert_eq!(files, vec![PathBuf::from("./a.py"), PathBuf::from("b.py")]);
        let summary = ctx.finish().unwrap();
        assert_eq!((summary.files_processed, summary.fixed), (2, 2));
        assert_eq!(fs::read_to_string(repo.path().join("c.py")).unwrap(), "x = 1 \n");
        let p = ctx
            .patterns
            .get(crate::models::ViolationKind::TrailingWhitespace, "strip-trailing-whitespace")
            .unwrap();
        assert_eq!(p.usage_count, 2);
    }
}
