//! Run configuration.
//!
//! A run is configured in two places: a YAML file naming the report and its
//! sheets plus the comment markers, and the report's own settings sheet
//! listing the search roots and extensions. [`Config`] is the former;
//! [`Settings`] combines both into the immutable input of one run.
//!
//! ```yaml
//! file_name: report.xlsx
//! sheet:
//!   setting_sheet: Settings
//!   result_sheet: Results
//! comment: "//,#"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StepcountError;
use crate::source::ExtensionFilter;
use crate::Result;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "data.yaml";

/// Names of the two sheets inside the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetNames {
    /// Sheet holding the search roots and extensions
    pub setting_sheet: String,
    /// Sheet holding the per-file results
    pub result_sheet: String,
}

/// Contents of the YAML configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the report workbook
    pub file_name: PathBuf,
    /// Sheet names
    pub sheet: SheetNames,
    /// Comma-separated comment markers
    #[serde(default)]
    pub comment: String,
}

impl Config {
    /// Load the configuration from a YAML file.
    ///
    /// A relative `file_name` is resolved against the directory holding the
    /// configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| StepcountError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_yaml(&content).map_err(|e| StepcountError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if config.file_name.is_relative() {
            if let Some(dir) = path.parent() {
                config.file_name = dir.join(&config.file_name);
            }
        }

        Ok(config)
    }

    /// Parse the configuration from a YAML string.
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Split the comment setting into markers.
    ///
    /// Markers are kept exactly as written and only empty entries are
    /// dropped, so `"//,#,"` yields `["//", "#"]`. Lines lose their spaces
    /// and tabs before matching, so a marker written with a space (`" #"`,
    /// `"- -"`) never matches anything.
    pub fn comment_markers(&self) -> Vec<String> {
        self.comment
            .split(',')
            .filter(|marker| !marker.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Everything one run needs, fixed once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Report workbook path
    pub report_path: PathBuf,
    /// Settings sheet name
    pub settings_sheet: String,
    /// Results sheet name
    pub results_sheet: String,
    /// Comment markers, empty entries removed
    pub comment_markers: Vec<String>,
    /// Directories to scan, in order
    pub search_roots: Vec<PathBuf>,
    /// Path suffixes to count, in order
    pub extensions: Vec<String>,
}

impl Settings {
    /// Combine the configuration file with the lists read from the report.
    pub fn new(config: &Config, search_roots: Vec<String>, extensions: Vec<String>) -> Self {
        Self {
            report_path: config.file_name.clone(),
            settings_sheet: config.sheet.setting_sheet.clone(),
            results_sheet: config.sheet.result_sheet.clone(),
            comment_markers: config.comment_markers(),
            search_roots: search_roots.into_iter().map(PathBuf::from).collect(),
            extensions,
        }
    }

    /// Extension filter for the scanner.
    pub fn extension_filter(&self) -> ExtensionFilter {
        ExtensionFilter::new().suffixes(self.extensions.iter().cloned())
    }
}
