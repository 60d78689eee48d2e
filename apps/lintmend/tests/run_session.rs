use lintmend::config::{resolve_effective, Overrides};
use lintmend::engine::run_session;
use lintmend::import::parse_report;
use lintmend::models::ViolationStatus;
use lintmend::output::compose_run_json;
use lintmend::store::{JsonStore, Store};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_config(repo: &Path, backups: &Path, extra: &str) {
    let cfg = format!(
        "backup_dir = {:?}\nmax_files = 5\n{}\n",
        backups.to_string_lossy(),
        extra
    );
    fs::write(repo.join("lintmend.toml"), cfg).unwrap();
}

#[test]
fn test_import_then_run_fixes_files_and_persists_history() {
    let repo = tempdir().unwrap();
    let backups = tempdir().unwrap();
    write_config(repo.path(), backups.path(), "");
    fs::write(repo.path().join("a.py"), "a\n   \ndef f():\n  pass\nb").unwrap();
    fs::create_dir_all(repo.path().join("pkg")).unwrap();
    fs::write(repo.path().join("pkg/b.py"), "import os\nx = 1  \n").unwrap();

    let eff = resolve_effective(repo.path().to_str(), &Overrides::default()).unwrap();
    let report = parse_report(
        "./a.py:2:1: W293 blank line contains whitespace\n\
         ./a.py:3:1: E302 expected 2 blank lines, found 1\n\
         ./a.py:5:2: W292 no newline at end of file\n\
         ./pkg/b.py:1:1: F401 'os' imported but unused\n\
         ./pkg/b.py:2:6: W291 trailing whitespace\n",
    );
    let mut store = JsonStore::open(&eff.store_dir).unwrap();
    let stats = store.import_violations(report.violations);
    assert_eq!(stats.added, 5);
    store.flush().unwrap();

    let result = run_session(&mut store, eff.clone()).unwrap();
    let summary = &result.summary;
    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.fixed, 5);
    assert_eq!(summary.files_processed, 2);
    assert!(summary.restored_files.is_empty());

    assert_eq!(
        fs::read_to_string(repo.path().join("a.py")).unwrap(),
        "a\n\n\n\ndef f():\n  pass\nb\n"
    );
    assert_eq!(
        fs::read_to_string(repo.path().join("pkg/b.py")).unwrap(),
        "# import os\nx = 1\n"
    );

    let json = compose_run_json(summary, &result.outcomes, &eff.repo_root);
    assert_eq!(json["summary"]["fixed"], 5);
    assert_eq!(json["results"][0]["file"], "a.py");

    // everything was written through to disk
    let reopened = JsonStore::open(&eff.store_dir).unwrap();
    assert!(reopened.pending().is_empty());
    assert!(reopened
        .violations()
        .iter()
        .all(|v| v.status == ViolationStatus::Fixed));
    assert_eq!(reopened.corrections().len(), 5);
    let sessions = reopened.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].violations_fixed, 5);
    assert_eq!(sessions[0].session_id, summary.session_id);
    let w293 = reopened
        .patterns()
        .into_iter()
        .find(|p| p.kind_code == "W293")
        .unwrap();
    assert_eq!(w293.usage_count, 1);
    assert!(w293.confidence > 0.8);

    // a second run has nothing left to do
    let mut store = reopened;
    let again = run_session(&mut store, eff).unwrap();
    assert_eq!(again.summary.attempted, 0);
    assert_eq!(store.sessions().len(), 2);
}

#[test]
fn test_max_files_and_excluded_files() {
    let repo = tempdir().unwrap();
    let backups = tempdir().unwrap();
    write_config(repo.path(), backups.path(), "exclude = [\"vendor/**\"]");
    for name in ["a.py", "b.py", "z.py"] {
        fs::write(repo.path().join(name), "x = 1 \n").unwrap();
    }
    fs::create_dir_all(repo.path().join("vendor")).unwrap();
    fs::write(repo.path().join("vendor/v.py"), "y = 2 \n").unwrap();

    let cli = Overrides {
        max_files: Some(3),
        ..Overrides::default()
    };
    let eff = resolve_effective(repo.path().to_str(), &cli).unwrap();
    let mut store = JsonStore::open(&eff.store_dir).unwrap();
    store.import_violations(
        parse_report(
            "a.py:1:6: W291 x\nb.py:1:6: W291 x\nz.py:1:6: W291 x\nvendor/v.py:1:6: W291 x\n",
        )
        .violations,
    );

    let result = run_session(&mut store, eff).unwrap();
    // path order: a.py, b.py, vendor/v.py; z.py is beyond the limit
    assert_eq!(result.summary.fixed, 2);
    assert_eq!(result.summary.skipped, 1);
    assert_eq!(fs::read_to_string(repo.path().join("b.py")).unwrap(), "x = 1\n");
    assert_eq!(fs::read_to_string(repo.path().join("vendor/v.py")).unwrap(), "y = 2 \n");
    assert_eq!(fs::read_to_string(repo.path().join("z.py")).unwrap(), "x = 1 \n");
    let pending = store.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].file_path, Path::new("z.py"));
}

#[test]
fn test_backup_root_inside_repo_is_fatal() {
    let repo = tempdir().unwrap();
    let inside = repo.path().join("backups");
    write_config(repo.path(), &inside, "");
    fs::write(repo.path().join("a.py"), "x = 1 \n").unwrap();

    let eff = resolve_effective(repo.path().to_str(), &Overrides::default()).unwrap();
    let mut store = JsonStore::open(&eff.store_dir).unwrap();
    store.import_violations(parse_report("a.py:1:6: W291 x\n").violations);
    assert!(run_session(&mut store, eff).is_err());
    assert_eq!(fs::read_to_string(repo.path().join("a.py")).unwrap(), "x = 1 \n");
}

#[test]
fn test_absolute_and_relative_paths_to_one_file_are_fixed_together() {
    let repo = tempdir().unwrap();
    let backups = tempdir().unwrap();
    write_config(repo.path(), backups.path(), "");
    fs::write(repo.path().join("a.py"), "import os\ndef f():\n    pass\nx = 1  \n").unwrap();

    let eff = resolve_effective(repo.path().to_str(), &Overrides::default()).unwrap();
    let abs = eff.repo_root.join("a.py");
    let text = format!(
        "{}:2:1: E302 expected 2 blank lines, found 0\na.py:4:6: W291 trailing whitespace\n",
        abs.display()
    );
    let mut store = JsonStore::open(&eff.store_dir).unwrap();
    assert_eq!(store.import_violations(parse_report(&text).violations).added, 2);

    let result = run_session(&mut store, eff).unwrap();
    assert_eq!(result.summary.files_processed, 1);
    assert_eq!(result.summary.fixed, 2);
    assert_eq!(
        fs::read_to_string(repo.path().join("a.py")).unwrap(),
        "import os\n\n\ndef f():\n    pass\nx = 1\n"
    );
    assert!(store.pending().is_empty());
}

#[test]
fn test_files_left_by_the_deadline_stay_pending() {
    let repo = tempdir().unwrap();
    let backups = tempdir().unwrap();
    write_config(repo.path(), backups.path(), "");
    fs::write(repo.path().join("a.py"), "x = 1 \n").unwrap();

    let rushed = Overrides {
        timeout_secs: Some(0),
        ..Overrides::default()
    };
    let eff = resolve_effective(repo.path().to_str(), &rushed).unwrap();
    let mut store = JsonStore::open(&eff.store_dir).unwrap();
    store.import_violations(parse_report("a.py:1:6: W291 trailing whitespace\n").violations);

    let result = run_session(&mut store, eff).unwrap();
    assert_eq!(result.summary.fixed, 0);
    assert_eq!(result.summary.timed_out_files.len(), 1);
    assert_eq!(result.outcomes[0].status, ViolationStatus::Pending);
    assert_eq!(fs::read_to_string(repo.path().join("a.py")).unwrap(), "x = 1 \n");
    assert_eq!(store.pending().len(), 1);

    // the next run without a deadline picks the violation up
    let eff = resolve_effective(repo.path().to_str(), &Overrides::default()).unwrap();
    let mut store = JsonStore::open(&eff.store_dir).unwrap();
    assert_eq!(store.pending().len(), 1);
    let result = run_session(&mut store, eff).unwrap();
    assert_eq!(result.summary.fixed, 1);
    assert!(store.pending().is_empty());
    assert_eq!(fs::read_to_string(repo.path().join("a.py")).unwrap(), "x = 1\n");
}
