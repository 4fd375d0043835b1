//! Source discovery: find files to count.
//!
//! This module handles the first stage of the pipeline - walking the search
//! roots listed in the report's settings sheet and collecting every file
//! whose path ends with a configured extension.
//!
//! ## Example
//!
//! ```rust,ignore
//! use stepcountlib::source::{scan, ExtensionFilter};
//!
//! let filter = ExtensionFilter::new().suffixes([".go", ".rs"]);
//! let records = scan(&["./src", "./cmd"], &filter)?;
//! ```

pub mod scanner;

pub use scanner::{scan, scan_root, ExtensionFilter};
