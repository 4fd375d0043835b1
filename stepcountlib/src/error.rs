//! Error types for stepcountlib

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during a counting run.
///
/// Every variant is fatal for the run that produced it: the pipeline stops
/// at the first error and the report on disk is left untouched.
#[derive(Error, Debug)]
pub enum StepcountError {
    /// Failed to read the configuration file
    #[error("failed to read config '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML or is missing fields
    #[error("failed to parse config '{path}': {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Report workbook is missing or corrupt
    #[error("failed to open report '{path}': {message}")]
    ReportOpen { path: PathBuf, message: String },

    /// Named sheet is absent from the report workbook
    #[error("sheet '{sheet}' not found in report '{path}'")]
    SheetNotFound { path: PathBuf, sheet: String },

    /// A search root is missing or a directory could not be read
    #[error("failed to access directory '{path}': {source}")]
    DirectoryAccess {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A candidate source file could not be opened or read
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Saving the updated report failed
    #[error("failed to write report '{path}': {message}")]
    ReportWrite { path: PathBuf, message: String },
}
