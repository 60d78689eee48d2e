//! Lintmend CLI binary entry point.
//! Delegates to the library for import/run/patterns/sessions and prints results.

use clap::Parser;
use lintmend::cli::{Cli, Commands};
use lintmend::config::{self, Effective, Overrides};
use lintmend::engine;
use lintmend::import;
use lintmend::logging;
use lintmend::output::{self, error_prefix, info_prefix, note_prefix};
use lintmend::patterns::PatternStore;
use lintmend::store::{JsonStore, Store, StoreLock};
use std::fmt::Display;
use std::path::Path;

/// Print a fatal error and exit with status 2.
fn or_exit<T, E: Display>(res: Result<T, E>) -> T {
    match res {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{} {}", error_prefix(), e);
            std::process::exit(2);
        }
    }
}

fn resolve(repo_root: Option<&str>, overrides: Overrides) -> Effective {
    let eff = or_exit(config::resolve_effective(repo_root, &overrides));
    // Friendly note if no lintmend config was found
    if eff.output != "json" && matches!(config::load_config(&eff.repo_root), Ok(None)) {
        eprintln!("{} No lintmend.toml found; using defaults.", note_prefix());
    }
    eff
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init_tracing(cli.verbose) {
        eprintln!("{} logging disabled: {}", note_prefix(), e);
    }
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Run {
            repo_root,
            store,
            backup_dir,
            output,
            max_files,
            jobs,
            timeout_secs,
            retain_backups,
        } => {
            let eff = resolve(
                repo_root.as_deref(),
                Overrides {
                    store,
                    backup_dir,
                    output,
                    max_files,
                    jobs,
                    timeout_secs,
                    retain_backups: if retain_backups { Some(true) } else { None },
                },
            );
            let mut lock = or_exit(StoreLock::open(&eff.store_dir));
            let _guard = or_exit(lock.try_acquire());
            let mut db = or_exit(JsonStore::open(&eff.store_dir));
            if db.pending().is_empty() && eff.output != "json" {
                eprintln!(
                    "{} No pending violations; import linter output with `lintmend import`.",
                    info_prefix()
                );
            }
            let root = eff.repo_root.clone();
            let mode = eff.output.clone();
            let report = or_exit(engine::run_session(&mut db, eff));
            output::print_run(&report.summary, &report.outcomes, &root, &mode);
        }
        Commands::Import {
            repo_root,
            store,
            output,
            input,
            command,
        } => {
            let eff = resolve(
                repo_root.as_deref(),
                Overrides {
                    store,
                    output,
                    ..Overrides::default()
                },
            );
            let report = match command {
                Some(cmd) => {
                    let mut report = or_exit(import::run_linter(&cmd, &eff.repo_root));
                    import::rebase(&mut report, &eff.repo_root, &eff.repo_root);
                    report
                }
                None => {
                    let src = input.unwrap_or_else(|| "-".to_string());
                    let mut report = or_exit(import::read_report(Path::new(&src)));
                    let cwd = or_exit(std::env::current_dir());
                    import::rebase(&mut report, &cwd, &eff.repo_root);
                    report
                }
            };
            let mut lock = or_exit(StoreLock::open(&eff.store_dir));
            let _guard = or_exit(lock.try_acquire());
            let mut db = or_exit(JsonStore::open(&eff.store_dir));
            let stats = db.import_violations(report.violations.clone());
            or_exit(db.flush());
            output::print_import(&stats, &report, &eff.output);
        }
        Commands::Patterns {
            repo_root,
            store,
            output,
            code,
        } => {
            let eff = resolve(
                repo_root.as_deref(),
                Overrides {
                    store,
                    output,
                    ..Overrides::default()
                },
            );
            let db = or_exit(JsonStore::open(&eff.store_dir));
            let patterns = PatternStore::from_patterns(db.patterns(), eff.learning_step);
            let rows = patterns.snapshot(code.as_deref());
            if rows.is_empty() {
                if let Some(c) = code {
                    eprintln!("{} No correction templates for {}.", note_prefix(), c);
                }
            }
            output::print_patterns(&rows, &eff.output);
        }
        Commands::Sessions {
            repo_root,
            store,
            output,
            limit,
        } => {
            let eff = resolve(
                repo_root.as_deref(),
                Overrides {
                    store,
                    output,
                    ..Overrides::default()
                },
            );
            let db = or_exit(JsonStore::open(&eff.store_dir));
            let mut rows = db.sessions();
            if let Some(n) = limit {
                let skip = rows.len().saturating_sub(n);
                rows.drain(..skip);
            }
            output::print_sessions(&rows, &eff.output);
        }
    }
}
