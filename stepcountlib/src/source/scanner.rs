//! File discovery with extension suffix matching.
//!
//! Walks the configured search roots and collects every file whose full
//! path ends with one of the configured extensions. The match is a plain
//! string suffix test, so `"o.go"` matches `ConfigFoo.go` just like `".go"`.

use std::fs;
use std::io;
use std::path::{Path, MAIN_SEPARATOR};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::data::SourceFileRecord;
use crate::error::StepcountError;
use crate::Result;

/// Configuration for file filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    /// Path suffixes to accept (e.g. `.go`, `.rs`)
    pub suffixes: Vec<String>,
}

impl ExtensionFilter {
    /// Create a new filter that matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a suffix.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }

    /// Add multiple suffixes.
    pub fn suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suffixes.extend(suffixes.into_iter().map(Into::into));
        self
    }

    /// Check if a path ends with any configured suffix.
    pub fn matches(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.suffixes
            .iter()
            .any(|suffix| path_str.ends_with(suffix.as_str()))
    }
}

/// Lexically clean a path: collapse repeated separators, drop `.`
/// components and resolve `..` against the component before it.
/// An empty result becomes `.`.
fn clean_path(path: &str) -> String {
    let rooted = path.starts_with(MAIN_SEPARATOR);
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split(MAIN_SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join(&MAIN_SEPARATOR.to_string());
    if rooted {
        format!("{MAIN_SEPARATOR}{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Format the directory part of a record's identity key.
///
/// Files directly in the root get the root exactly as configured plus a
/// separator (`src/` gives `src//`, `./src` gives `./src/`). Files in
/// subdirectories get the cleaned path plus a separator (`./src` and `pkg`
/// give `src/pkg/`). Reports filled by earlier versions of the tool use
/// these keys, so rows keep matching.
fn directory_key(root: &Path, parent: &Path) -> String {
    let root_str = root.to_string_lossy();
    match parent.strip_prefix(root) {
        Ok(relative) if relative.as_os_str().is_empty() => format!("{root_str}{MAIN_SEPARATOR}"),
        Ok(relative) => {
            let joined = format!("{root_str}{MAIN_SEPARATOR}{}", relative.to_string_lossy());
            format!("{}{MAIN_SEPARATOR}", clean_path(&joined))
        }
        Err(_) => format!("{}{MAIN_SEPARATOR}", clean_path(&parent.to_string_lossy())),
    }
}

fn directory_error(path: &Path, source: io::Error) -> StepcountError {
    StepcountError::DirectoryAccess {
        path: path.to_path_buf(),
        source,
    }
}

/// Discover matching files below a single root.
///
/// Entries are visited depth-first in file name order. Symlinks are not
/// followed; a symlink is tested against the filter like a regular file.
pub fn scan_root(root: impl AsRef<Path>, filter: &ExtensionFilter) -> Result<Vec<SourceFileRecord>> {
    let root = root.as_ref();

    let metadata = fs::metadata(root).map_err(|e| directory_error(root, e))?;
    if !metadata.is_dir() {
        return Err(directory_error(
            root,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    let mut records = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
            directory_error(&path, source)
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if !filter.matches(path) {
            continue;
        }

        let parent = path.parent().unwrap_or(root);
        let record = SourceFileRecord::new(
            directory_key(root, parent),
            entry.file_name().to_string_lossy(),
        );
        debug!(directory = %record.directory, file = %record.file_name, "found source file");
        records.push(record);
    }

    Ok(records)
}

/// Discover matching files below every root, in root order.
///
/// The first root that cannot be read aborts the whole scan.
pub fn scan<P: AsRef<Path>>(roots: &[P], filter: &ExtensionFilter) -> Result<Vec<SourceFileRecord>> {
    let mut all_records = Vec::new();

    for root in roots {
        let records = scan_root(root, filter)?;
        info!(
            root = %root.as_ref().display(),
            files = records.len(),
            "scanned search root"
        );
        all_records.extend(records);
    }

    Ok(all_records)
}
