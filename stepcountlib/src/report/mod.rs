//! Report storage: the xlsx workbook holding settings and results.
//!
//! This module handles both ends of the pipeline - reading the search roots
//! and extensions before the scan, and merging the counts into the results
//! sheet afterwards. It provides:
//!
//! - **Documents**: open and atomically save an `.xlsx` report
//! - **Patching**: write edited cells back into the original package
//! - **Sheets**: an in-memory cell grid per worksheet
//! - **Store**: the fixed settings/results layout and the upsert
//!
//! ## Example
//!
//! ```rust,ignore
//! use stepcountlib::report::{load_results_table, upsert_results, ReportDocument};
//!
//! let mut doc = ReportDocument::open("report.xlsx")?;
//! let prior = load_results_table(&doc, "Results")?;
//! upsert_results(&mut doc, "Results", &current, &prior)?;
//! doc.save()?;
//! ```

pub mod document;
mod patch;
pub mod sheet;
pub mod store;

pub use document::ReportDocument;
pub use sheet::{Cell, CellEdits, Sheet};
pub use store::{
    apply_plan, load_results_table, load_settings_table, upsert_results, RESULTS_DIRECTORY_COL,
    RESULTS_FILE_NAME_COL, RESULTS_FIRST_ROW, RESULTS_ORDINAL_COL, RESULTS_STEPS_COL,
    SETTINGS_EXTENSION_COL, SETTINGS_FIRST_ROW, SETTINGS_ROOT_COL,
};
