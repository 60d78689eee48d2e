//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lintmend",
    version,
    about = "Automatic correction of line-addressed lint violations",
    long_about = "Lintmend imports violations reported by a Python linter, fixes them in place with backups and atomic writes, and learns which correction templates work.\n\nConfiguration precedence: CLI > lintmend.toml > defaults.",
    after_help = "Examples:\n  flake8 . | lintmend import\n  lintmend import --command 'flake8 src'\n  lintmend run --max-files 20\n  lintmend patterns --code E501 --output json",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(long, global = true, action = clap::ArgAction::SetTrue, help = "Print debug diagnostics to stderr")]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands for importing, correcting and inspecting history.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current lintmend version.")]
    Version,
    /// Correct pending violations
    #[command(
        about = "Fix pending violations",
        long_about = "Correct pending violations in up to --max-files files. Every touched file is backed up first and rewritten atomically; a failed write restores the backup.",
        after_help = "Examples:\n  lintmend run\n  lintmend run --max-files 50 --jobs 4 --output json\n  lintmend run --timeout-secs 120 --retain-backups"
    )]
    Run {
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Store directory, relative to the repo root (default: .lintmend)")]
        store: Option<String>,
        #[arg(long, help = "Backup directory outside the repo (default: <temp>/lintmend/backups)")]
        backup_dir: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Maximum number of files to process (default: 10)")]
        max_files: Option<usize>,
        #[arg(long, help = "Worker threads, 0 for one per core (default: 0)")]
        jobs: Option<usize>,
        #[arg(long, help = "Stop starting new files after this many seconds")]
        timeout_secs: Option<u64>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Keep backups of files that were committed cleanly")]
        retain_backups: bool,
    },
    /// Import linter findings
    #[command(
        about = "Import linter output",
        long_about = "Parse `path:line:col: CODE message` lines into pending violations. Reads stdin unless --input or --command is given.",
        after_help = "Examples:\n  flake8 . > report.txt && lintmend import --input report.txt\n  lintmend import --command 'flake8 .'"
    )]
    Import {
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Store directory, relative to the repo root (default: .lintmend)")]
        store: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, conflicts_with = "command", help = "Report file to read ('-' for stdin)")]
        input: Option<String>,
        #[arg(long, help = "Linter command to run from the repo root")]
        command: Option<String>,
    },
    /// List ranked correction templates
    #[command(
        about = "List correction patterns",
        long_about = "Show every correction template with its learned confidence, usage count and success rate, best first."
    )]
    Patterns {
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Store directory, relative to the repo root (default: .lintmend)")]
        store: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Only show templates for this violation code (e.g. E501)")]
        code: Option<String>,
    },
    /// List recorded sessions
    #[command(
        about = "List sessions",
        long_about = "Show recorded correction sessions, most recent last."
    )]
    Sessions {
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Store directory, relative to the repo root (default: .lintmend)")]
        store: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Show only the most recent N sessions")]
        limit: Option<usize>,
    },
}
