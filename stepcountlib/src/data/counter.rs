//! Step counting for individual files.
//!
//! Files are read line by line and every line is run through
//! [`is_step`](super::classifier::is_step). Any failure to open or read a
//! file aborts the count; there is no skip-and-continue.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::StepcountError;
use crate::Result;

use super::classifier::is_step;
use super::record::SourceFileRecord;

/// Count the step lines of a single file.
///
/// Lines end at `\n`; a trailing `\r` is dropped. Bytes that are not valid
/// UTF-8 are decoded lossily so that binary-ish or legacy-encoded sources
/// still produce a count.
///
/// # Example
///
/// ```rust
/// use stepcountlib::count_steps;
/// use std::fs;
/// use tempfile::tempdir;
///
/// let dir = tempdir().unwrap();
/// let path = dir.path().join("main.go");
/// fs::write(&path, "package main\n\n// entry\nfunc main() {\n}\n").unwrap();
///
/// assert_eq!(count_steps(&path, &["//"]).unwrap(), 3);
/// ```
pub fn count_steps<S: AsRef<str>>(path: impl AsRef<Path>, markers: &[S]) -> Result<u64> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| StepcountError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    count_reader(file, markers).map_err(|source| StepcountError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Count the step lines produced by any reader.
pub fn count_reader<R: Read, S: AsRef<str>>(reader: R, markers: &[S]) -> std::io::Result<u64> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut steps = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let mut line: &[u8] = &buf;
        if let Some(rest) = line.strip_suffix(b"\n") {
            line = rest;
        }
        if let Some(rest) = line.strip_suffix(b"\r") {
            line = rest;
        }

        if is_step(&String::from_utf8_lossy(line), markers) {
            steps += 1;
        }
    }

    Ok(steps)
}

/// Fill in the step count of every record, in order.
///
/// Stops at the first file that cannot be read; records before it keep the
/// counts already assigned, records after it are untouched.
pub fn count_all<S: AsRef<str>>(records: &mut [SourceFileRecord], markers: &[S]) -> Result<()> {
    for record in records.iter_mut() {
        let path = record.path();
        record.steps = count_steps(&path, markers)?;
        debug!(path = %path.display(), steps = record.steps, "counted file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MARKERS: [&str; 2] = ["//", "#"];

    #[test]
    fn test_count_reader_mixed_content() {
        let source = "package main\n\n// comment\n\t# hash\nfunc main() {\n\tx := 1\n}\n";
        assert_eq!(count_reader(source.as_bytes(), &MARKERS).unwrap(), 4);
    }

    #[test]
    fn test_count_reader_without_trailing_newline() {
        assert_eq!(count_reader("a\nb".as_bytes(), &MARKERS).unwrap(), 2);
    }

    #[test]
    fn test_count_reader_crlf_lines() {
        let source = "a\r\n\r\n// c\r\nb\r\n";
        assert_eq!(count_reader(source.as_bytes(), &MARKERS).unwrap(), 2);
    }

    #[test]
    fn test_count_reader_empty_input() {
        assert_eq!(count_reader("".as_bytes(), &MARKERS).unwrap(), 0);
    }

    #[test]
    fn test_count_reader_invalid_utf8() {
        let source: &[u8] = b"caf\xe9 = 1\n// \xff\n";
        assert_eq!(count_reader(source, &MARKERS).unwrap(), 1);
    }

    #[test]
    fn test_count_steps_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("lib.rs");
        fs::write(&path, "// header\nfn a() {}\n\nfn b() {}\n").unwrap();

        assert_eq!(count_steps(&path, &MARKERS).unwrap(), 2);
    }

    #[test]
    fn test_count_steps_missing_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing.rs");

        let err = count_steps(&path, &MARKERS).unwrap_err();
        match err {
            StepcountError::FileRead { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected FileRead, got {other:?}"),
        }
    }

    #[test]
    fn test_count_all_sets_counts() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.go"), "a\nb\n").unwrap();
        fs::write(temp.path().join("b.go"), "// only comment\n").unwrap();

        let dir = format!("{}{}", temp.path().display(), std::path::MAIN_SEPARATOR);
        let mut records = vec![
            SourceFileRecord::new(&dir, "a.go"),
            SourceFileRecord::new(&dir, "b.go"),
        ];
        count_all(&mut records, &MARKERS).unwrap();

        assert_eq!(records[0].steps, 2);
        assert_eq!(records[1].steps, 0);
    }

    #[test]
    fn test_count_all_stops_at_first_failure() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.go"), "a\n").unwrap();
        fs::write(temp.path().join("c.go"), "c\n").unwrap();

        let dir = format!("{}{}", temp.path().display(), std::path::MAIN_SEPARATOR);
        let mut records = vec![
            SourceFileRecord::new(&dir, "a.go"),
            SourceFileRecord::new(&dir, "b.go"),
            SourceFileRecord::new(&dir, "c.go"),
        ];

        assert!(count_all(&mut records, &MARKERS).is_err());
        assert_eq!(records[0].steps, 1);
        assert_eq!(records[2].steps, 0);
    }
}
