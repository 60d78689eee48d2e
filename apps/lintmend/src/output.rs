//! Output rendering for run, import, patterns and sessions commands.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-item fields and a top-level summary.

use crate::import::ParsedReport;
use crate::models::{
    CorrectionPattern, FixOutcome, SessionRecord, Summary, ViolationKind, ViolationStatus,
};
use crate::store::ImportStats;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;
use std::path::Path;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

pub fn error_prefix() -> String {
    if colors_enabled() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn note_prefix() -> String {
    if colors_enabled() {
        "note:".yellow().bold().to_string()
    } else {
        "note:".to_string()
    }
}

pub fn info_prefix() -> String {
    if colors_enabled() {
        "info:".blue().bold().to_string()
    } else {
        "info:".to_string()
    }
}

fn print_json(value: &JsonVal) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("{} {}", error_prefix(), e),
    }
}

/// Path as shown to the user: relative to the repo root when possible.
fn display_path(path: &Path, root: &Path) -> String {
    if path.is_absolute() {
        if let Some(rel) = pathdiff::diff_paths(path, root) {
            return rel.to_string_lossy().to_string();
        }
    }
    path.to_string_lossy().to_string()
}

/// Print one run's outcomes and summary.
pub fn print_run(summary: &Summary, outcomes: &[FixOutcome], root: &Path, output: &str) {
    match output {
        "json" => print_json(&compose_run_json(summary, outcomes, root)),
        _ => {
            let color = use_colors(output);
            for o in outcomes {
                let file = format!("{}:{}", display_path(&o.file_path, root), o.line_number);
                let (icon, label) = match o.status {
                    ViolationStatus::Fixed => ("✔", "fixed"),
                    ViolationStatus::Failed => ("✖", "failed"),
                    ViolationStatus::Skipped => ("⏭", "skipped"),
                    ViolationStatus::Pending => ("⏸", "deferred"),
                };
                let detail = match (&o.error, &o.template) {
                    (Some(e), _) => e.clone(),
                    (None, Some(t)) => t.clone(),
                    (None, None) => String::new(),
                };
                if color {
                    let tag = match o.status {
                        ViolationStatus::Fixed => format!("{} {}", icon, label).green().bold().to_string(),
                        ViolationStatus::Failed => format!("{} {}", icon, label).red().bold().to_string(),
                        _ => format!("{} {}", icon, label).bright_black().to_string(),
                    };
                    println!("{} {} ❲{}❳ {}", tag, file.bold(), o.kind_code, detail);
                } else {
                    println!("{} {} {} ❲{}❳ {}", icon, label, file, o.kind_code, detail);
                }
            }
            for path in &summary.restored_files {
                let msg = format!("restored from backup: {}", display_path(path, root));
                if color {
                    println!("{}", msg.yellow());
                } else {
                    println!("{}", msg);
                }
            }
            for f in &summary.file_failures {
                println!("{} {}: {}", error_prefix(), display_path(&f.file, root), f.reason);
            }
            for path in &summary.timed_out_files {
                println!("{} deadline reached, left untouched: {}", note_prefix(), display_path(path, root));
            }
            let line = format!(
                "-- Summary -- attempted={} fixed={} failed={} skipped={} files={} success={:.1}% duration={}ms",
                summary.attempted,
                summary.fixed,
                summary.failed,
                summary.skipped,
                summary.files_processed,
                summary.success_rate(),
                summary.duration_ms
            );
            if color {
                println!("{}", line.bold());
            } else {
                println!("{}", line);
            }
        }
    }
}

/// Compose run JSON object (pure) for testing/snapshot purposes.
pub fn compose_run_json(summary: &Summary, outcomes: &[FixOutcome], root: &Path) -> JsonVal {
    let items: Vec<_> = outcomes
        .iter()
        .map(|o| {
            json!({
                "id": o.violation_id,
                "file": display_path(&o.file_path, root),
                "line": o.line_number,
                "code": o.kind_code,
                "status": o.status.as_str(),
                "template": o.template,
                "original": o.original_line,
                "resulting": o.resulting_line,
                "error": o.error,
            })
        })
        .collect();
    json!({
        "session": summary.session_id,
        "results": items,
        "summary": {
            "attempted": summary.attempted,
            "fixed": summary.fixed,
            "failed": summary.failed,
            "skipped": summary.skipped,
            "files": summary.files_processed,
            "durationMs": summary.duration_ms,
            "successRate": summary.success_rate(),
            "fixedByCode": summary.fixed_by_code,
            "restored": summary.restored_files.iter().map(|p| display_path(p, root)).collect::<Vec<_>>(),
            "fileFailures": summary.file_failures.iter().map(|f| json!({"file": display_path(&f.file, root), "reason": f.reason})).collect::<Vec<_>>(),
            "timedOut": summary.timed_out_files.iter().map(|p| display_path(p, root)).collect::<Vec<_>>(),
        }
    })
}

pub fn print_import(stats: &ImportStats, report: &ParsedReport, output: &str) {
    match output {
        "json" => print_json(&compose_import_json(stats, report)),
        _ => {
            let line = format!(
                "imported={} duplicates={} unparsed={}",
                stats.added, stats.duplicates, report.unparsed
            );
            if use_colors(output) {
                println!("{} {}", "📥 import:".green().bold(), line);
            } else {
                println!("📥 import: {}", line);
            }
        }
    }
}

pub fn compose_import_json(stats: &ImportStats, report: &ParsedReport) -> JsonVal {
    json!({
        "summary": {
            "reported": report.violations.len(),
            "imported": stats.added,
            "duplicates": stats.duplicates,
            "unparsed": report.unparsed,
        }
    })
}

pub fn print_patterns(rows: &[CorrectionPattern], output: &str) {
    match output {
        "json" => print_json(&compose_patterns_json(rows)),
        _ => {
            let color = use_colors(output);
            for p in rows {
                let conf = format!("{:.3}", p.confidence);
                let id = format!("{} {}", p.kind_code, p.template);
                let about = ViolationKind::from_code(&p.kind_code)
                    .map(|k| k.describe())
                    .unwrap_or_default();
                if color {
                    println!(
                        "{} confidence={} used={} success={:.1}% {}",
                        id.bold(),
                        conf.cyan(),
                        p.usage_count,
                        p.success_rate * 100.0,
                        about.bright_black()
                    );
                } else {
                    println!(
                        "{} confidence={} used={} success={:.1}% {}",
                        id,
                        conf,
                        p.usage_count,
                        p.success_rate * 100.0,
                        about
                    );
                }
            }
        }
    }
}

pub fn compose_patterns_json(rows: &[CorrectionPattern]) -> JsonVal {
    json!({ "patterns": rows, "summary": { "total": rows.len() } })
}

pub fn print_sessions(rows: &[SessionRecord], output: &str) {
    match output {
        "json" => print_json(&compose_sessions_json(rows)),
        _ => {
            let color = use_colors(output);
            if rows.is_empty() {
                println!("no sessions recorded");
            }
            for s in rows {
                let when = s.start_time.format("%Y-%m-%d %H:%M:%S").to_string();
                let secs = (s.end_time - s.start_time).num_milliseconds() as f64 / 1000.0;
                if color {
                    println!(
                        "{} {} files={} fixed={} ({:.1}s)",
                        s.session_id.bold(),
                        when.bright_black(),
                        s.files_processed,
                        s.violations_fixed,
                        secs
                    );
                } else {
                    println!(
                        "{} {} files={} fixed={} ({:.1}s)",
                        s.session_id, when, s.files_processed, s.violations_fixed, secs
                    );
                }
            }
        }
    }
}

pub fn compose_sessions_json(rows: &[SessionRecord]) -> JsonVal {
    json!({
        "sessions": rows,
        "summary": {
            "total": rows.len(),
            "fixed": rows.iter().map(|s| s.violations_fixed).sum::<usize>(),
        }
    })
}
