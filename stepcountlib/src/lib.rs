//! # stepcountlib
//!
//! Counts effective source lines ("steps") across directory trees and keeps
//! the counts in an xlsx report that grows run after run.
//!
//! ## Overview
//!
//! A step is a line that is neither blank nor a comment. After removing tabs
//! and spaces, a line is blank when nothing is left and a comment when it
//! starts with one of the configured markers. Everything else counts.
//!
//! Each run:
//!
//! 1. Loads a YAML config naming the report, its sheets and the comment markers
//! 2. Reads the search roots and extensions from the report's settings sheet
//! 3. Walks the roots and collects files whose path ends with an extension
//! 4. Counts the steps of every file
//! 5. Merges the counts into the results sheet: rows already present (same
//!    directory and file name) get their count overwritten, new files are
//!    appended, and no row is ever removed or moved
//! 6. Saves the report, once, only if every previous stage succeeded
//!
//! ## Example
//!
//! ```rust
//! use stepcountlib::{count_steps, is_step, plan_merge, SourceFileRecord};
//! use std::fs;
//! use tempfile::tempdir;
//!
//! assert!(!is_step("   // note", &["//"]));
//!
//! let dir = tempdir().unwrap();
//! let path = dir.path().join("main.go");
//! fs::write(&path, "package main\n\nfunc main() {}\n").unwrap();
//! assert_eq!(count_steps(&path, &["//"]).unwrap(), 2);
//!
//! let prior = vec![SourceFileRecord::new("/a/", "x.go")];
//! let current = vec![SourceFileRecord::new("/a/", "x.go").with_steps(2)];
//! assert_eq!(plan_merge(&current, &prior).updated(), 1);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod reconcile;
pub mod report;
pub mod source;

pub use config::{Config, Settings, SheetNames, DEFAULT_CONFIG_FILE};
pub use data::{count_all, count_reader, count_steps, is_step, SourceFileRecord};
pub use error::StepcountError;
pub use reconcile::{
    plan_merge, run, run_with_config, MergeAction, MergePlan, RunContext, RunOptions, RunSummary,
};
pub use report::{load_results_table, load_settings_table, upsert_results, Cell, ReportDocument, Sheet};
pub use source::{scan, ExtensionFilter};

/// Result type for stepcountlib operations
pub type Result<T> = std::result::Result<T, StepcountError>;
