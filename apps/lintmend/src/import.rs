//! Linter collaborator: turn `path:line:col: CODE message` output into
//! reported violations.

use crate::error::ImportError;
use crate::models::ReportedViolation;
use regex::Regex;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

#[derive(Debug, Default, Clone)]
pub struct ParsedReport {
    pub violations: Vec<ReportedViolation>,
    /// Non-empty lines that did not match the report format.
    pub unparsed: usize,
}

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<path>.+?):(?P<line>\d+):(?P<col>\d+):\s+(?P<code>[A-Z]+\d+)\s*(?P<msg>.*)$")
            .expect("report line regex is valid")
    })
}

pub fn parse_report(text: &str) -> ParsedReport {
    let mut report = ParsedReport::default();
    for raw in text.lines() {
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }
        let Some(caps) = line_re().captures(line) else {
            report.unparsed += 1;
            continue;
        };
        let (Ok(line_number), Ok(column)) = (caps["line"].parse::<usize>(), caps["col"].parse::<usize>()) else {
            report.unparsed += 1;
            continue;
        };
        report.violations.push(ReportedViolation {
            file_path: normalize(Path::new(&caps["path"])),
            line_number,
            column,
            kind_code: caps["code"].to_string(),
            message: caps["msg"].trim().to_string(),
        });
    }
    report
}

/// Read a saved report; `-` reads stdin.
pub fn read_report(path: &Path) -> Result<ParsedReport, ImportError> {
    let wrap = |source: io::Error| ImportError::Read {
        path: path.to_path_buf(),
        source,
    };
    let text = if path == Path::new("-") {
        let mut s = String::new();
        io::stdin().read_to_string(&mut s).map_err(wrap)?;
        s
    } else {
        fs::read_to_string(path).map_err(wrap)?
    };
    Ok(parse_report(&text))
}

/// Run the linter through the shell in `cwd` and parse its stdout.
///
/// flake8-style linters exit 1 when they found violations; only other
/// non-zero codes count as a failure.
pub fn run_linter(command: &str, cwd: &Path) -> Result<ParsedReport, ImportError> {
    tracing::info!(command, cwd = %cwd.display(), "running linter");
    let out = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .output()
        .map_err(|source| ImportError::Spawn {
            command: command.to_string(),
            source,
        })?;
    match out.status.code() {
        Some(0) | Some(1) => Ok(parse_report(&String::from_utf8_lossy(&out.stdout))),
        _ => Err(ImportError::LinterFailed {
            command: command.to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }),
    }
}

/// Re-express paths, reported from `cwd`, relative to `root`. Paths that
/// resolve outside `root` stay absolute.
pub fn rebase(report: &mut ParsedReport, cwd: &Path, root: &Path) {
    for v in &mut report.violations {
        let abs = cwd.join(&v.file_path);
        match pathdiff::diff_paths(&abs, root) {
            Some(rel) if !rel.starts_with("..") => v.file_path = normalize(&rel),
            _ if v.file_path.is_absolute() => {}
            _ => v.file_path = normalize(&abs),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
