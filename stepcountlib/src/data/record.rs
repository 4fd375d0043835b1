//! Per-file step records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A source file and its step count.
///
/// `directory` and `file_name` together form the identity key used to match
/// a scanned file against a row already present in the report. `directory`
/// ends with a separator and is written to the report exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileRecord {
    /// Containing directory, ending with a path separator
    pub directory: String,
    /// Base name of the file
    pub file_name: String,
    /// Number of step lines
    pub steps: u64,
}

impl SourceFileRecord {
    /// Create a record with a zero step count.
    pub fn new(directory: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
            steps: 0,
        }
    }

    /// Builder: set the step count.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Identity key: `(directory, file_name)`.
    pub fn identity(&self) -> (&str, &str) {
        (&self.directory, &self.file_name)
    }

    /// Full path of the file on disk.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.directory, self.file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_steps() {
        let a = SourceFileRecord::new("/a/", "x.go").with_steps(10);
        let b = SourceFileRecord::new("/a/", "x.go").with_steps(15);
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a, b);
    }

    #[test]
    fn test_path_joins_directory_and_name() {
        let record = SourceFileRecord::new("/src/pkg/", "main.go");
        assert_eq!(record.path(), PathBuf::from("/src/pkg/main.go"));
    }
}
