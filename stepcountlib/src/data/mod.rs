//! Data collection: classify lines and count steps per file.
//!
//! This module handles the second stage of the pipeline - reading the files
//! discovered by [`crate::source`] and turning them into step counts. It
//! provides:
//!
//! - **Classification**: the blank/comment rule applied to each line
//! - **Counting**: per-file and per-batch step counts
//! - **Records**: the `(directory, file_name, steps)` identity records
//!
//! ## Example
//!
//! ```rust,ignore
//! use stepcountlib::data::{count_all, SourceFileRecord};
//!
//! let mut records = vec![SourceFileRecord::new("/src/", "main.go")];
//! count_all(&mut records, &["//"])?;
//! ```

pub mod classifier;
pub mod counter;
pub mod record;

pub use classifier::{is_step, strip_horizontal_whitespace};
pub use counter::{count_all, count_reader, count_steps};
pub use record::SourceFileRecord;
