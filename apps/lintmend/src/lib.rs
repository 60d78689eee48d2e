//! Lintmend core library.
//!
//! This crate exposes programmatic APIs for correcting line-addressed lint
//! violations in Python sources: importing linter findings, applying fixes
//! in descending line order, backing files up and committing atomically,
//! and learning which correction templates succeed.
//!
//! High-level modules:
//! - `backup`: Per-session snapshots, atomic commit and restore.
//! - `buffer`: Owned line buffer that preserves line terminators.
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `engine`: Fix ordering, per-file passes and full runs.
//! - `error`: Error enums per concern.
//! - `fixes`: One dispatch function per violation kind.
//! - `import`: Parsing linter output into reported violations.
//! - `logging`: Tracing subscriber setup.
//! - `models`: Records shared by the engine, store and printers.
//! - `output`: Human/JSON printers.
//! - `patterns`: Confidence-ranked correction templates.
//! - `session`: Session ids and outcome aggregation.
//! - `store`: JSON-file tables and the run lock.
pub mod backup;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixes;
pub mod import;
pub mod logging;
pub mod models;
pub mod output;
pub mod patterns;
pub mod session;
pub mod store;
