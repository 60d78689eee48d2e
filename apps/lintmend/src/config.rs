//! Configuration discovery and effective settings resolution.
//!
//! Lintmend reads `lintmend.toml|yaml|yml` from the repository root (or
//! closest ancestor) and merges it with CLI flags to produce an `Effective`
//! config. Defaults:
//! - `store`: `.lintmend` (relative to the repo root)
//! - `backup_dir`: `<system temp>/lintmend/backups`
//! - `output`: `human`
//! - `max_files`: 10
//! - `jobs`: 0 (one worker per core)
//! - `timeout_secs`: none
//! - `retain_backups`: false
//! - `fix.blank_lines_before_def|max_blank_lines`: 2
//! - `fix.min_split_width`: 40
//! - `patterns.learning_step`: 0.1
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::ConfigError;
use crate::fixes::FixOptions;
use crate::patterns::DEFAULT_LEARNING_STEP;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILES: [&str; 3] = ["lintmend.toml", "lintmend.yaml", "lintmend.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Fix tunables under `[fix]`.
pub struct FixCfg {
    pub blank_lines_before_def: Option<usize>,
    pub max_blank_lines: Option<usize>,
    pub min_split_width: Option<usize>,
    /// Replaces the built-in allow-list for unused-import fixes.
    pub safe_imports: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Pattern Store tunables under `[patterns]`.
pub struct PatternsCfg {
    pub learning_step: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `lintmend.toml|yaml`.
pub struct LintmendConfig {
    pub store: Option<String>,
    pub backup_dir: Option<String>,
    pub output: Option<String>,
    pub max_files: Option<usize>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retain_backups: Option<bool>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    pub fix: Option<FixCfg>,
    pub patterns: Option<PatternsCfg>,
}

#[derive(Debug, Default, Clone)]
/// Values given on the command line; `None` defers to config/defaults.
pub struct Overrides {
    pub store: Option<String>,
    pub backup_dir: Option<String>,
    pub output: Option<String>,
    pub max_files: Option<usize>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub retain_backups: Option<bool>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub store_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub output: String,
    pub max_files: usize,
    pub jobs: usize,
    pub timeout_secs: Option<u64>,
    pub retain_backups: bool,
    pub exclude: Vec<String>,
    pub fix: FixOptions,
    pub learning_step: f64,
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `lintmend.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_FILES.iter().any(|f| cur.join(f).exists()) || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `LintmendConfig` from `lintmend.toml` or `lintmend.yaml|yml` if present.
pub fn load_config(root: &Path) -> Result<Option<LintmendConfig>, ConfigError> {
    for name in CONFIG_FILES {
        let path = root.join(name);
        if !path.exists() {
            continue;
        }
        let s = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let parsed: Result<LintmendConfig, String> = if name.ends_with(".toml") {
            toml::from_str(&s).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&s).map_err(|e| e.to_string())
        };
        return parsed
            .map(Some)
            .map_err(|reason| ConfigError::Parse { path, reason });
    }
    Ok(None)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(
    cli_repo_root: Option<&str>,
    cli: &Overrides,
) -> Result<Effective, ConfigError> {
    let start = PathBuf::from(cli_repo_root.unwrap_or("."));
    let start = std::path::absolute(&start).unwrap_or(start);
    let repo_root = detect_repo_root(&start);
    let cfg = load_config(&repo_root)?.unwrap_or_default();

    let store_dir = repo_root.join(
        cli.store
            .clone()
            .or(cfg.store)
            .unwrap_or_else(|| ".lintmend".to_string()),
    );
    let backup_dir = cli
        .backup_dir
        .clone()
        .or(cfg.backup_dir)
        .map(|d| repo_root.join(d))
        .unwrap_or_else(default_backup_dir);

    let output = cli
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());
    if output != "human" && output != "json" {
        return Err(ConfigError::Invalid {
            key: "output",
            reason: format!("expected 'human' or 'json', got '{output}'"),
        });
    }

    let max_files = cli.max_files.or(cfg.max_files).unwrap_or(10);
    if max_files == 0 {
        return Err(ConfigError::Invalid {
            key: "max_files",
            reason: "must be at least 1".into(),
        });
    }
    let jobs = cli.jobs.or(cfg.jobs).unwrap_or(0);
    let timeout_secs = cli.timeout_secs.or(cfg.timeout_secs);
    let retain_backups = cli.retain_backups.or(cfg.retain_backups).unwrap_or(false);
    let exclude = cfg.exclude.unwrap_or_default();
    for pattern in &exclude {
        glob::Pattern::new(pattern).map_err(|e| ConfigError::Invalid {
            key: "exclude",
            reason: format!("'{pattern}': {e}"),
        })?;
    }

    let defaults = FixOptions::default();
    let fix_cfg = cfg.fix.unwrap_or_default();
    let fix = FixOptions {
        blank_lines_before_def: fix_cfg
            .blank_lines_before_def
            .unwrap_or(defaults.blank_lines_before_def),
        max_blank_lines: fix_cfg.max_blank_lines.unwrap_or(defaults.max_blank_lines),
        min_split_width: fix_cfg.min_split_width.unwrap_or(defaults.min_split_width),
        safe_imports: fix_cfg
            .safe_imports
            .map(|v| v.into_iter().collect())
            .unwrap_or(defaults.safe_imports),
    };

    let learning_step = cfg
        .patterns
        .and_then(|p| p.learning_step)
        .unwrap_or(DEFAULT_LEARNING_STEP);
    if !(learning_step > 0.0 && learning_step <= 1.0) {
        return Err(ConfigError::Invalid {
            key: "patterns.learning_step",
            reason: format!("must be in (0, 1], got {learning_step}"),
        });
    }

    Ok(Effective {
        repo_root,
        store_dir,
        backup_dir,
        output,
        max_files,
        jobs,
        timeout_secs,
        retain_backups,
        exclude,
        fix,
        learning_step,
    })
}

pub fn default_backup_dir() -> PathBuf {
    std::env::temp_dir().join("lintmend").join("backups")
}
