//! Line classification: decides whether a raw source line is a step.
//!
//! A line is a step when, after removing every tab and space, it is
//! non-empty and does not start with one of the configured comment markers.

/// Remove all horizontal whitespace (tabs and spaces) from a line.
///
/// Other whitespace such as `\r` or form feeds is kept, so a line
/// consisting only of a carriage return is not considered blank.
pub fn strip_horizontal_whitespace(line: &str) -> String {
    line.chars().filter(|c| *c != ' ' && *c != '\t').collect()
}

/// Check whether a single line counts as a step.
///
/// Empty markers are skipped: an empty prefix would otherwise match every
/// line and suppress the whole file.
///
/// # Example
///
/// ```rust
/// use stepcountlib::is_step;
///
/// let markers = ["//", "#"];
/// assert!(is_step("x = 1", &markers));
/// assert!(!is_step("  // comment", &markers));
/// assert!(!is_step("\t\t#x", &markers));
/// assert!(!is_step("   ", &markers));
/// ```
pub fn is_step<S: AsRef<str>>(line: &str, markers: &[S]) -> bool {
    let stripped = strip_horizontal_whitespace(line);

    if stripped.is_empty() {
        return false;
    }

    !markers
        .iter()
        .map(AsRef::as_ref)
        .filter(|marker| !marker.is_empty())
        .any(|marker| stripped.starts_with(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKERS: [&str; 2] = ["//", "#"];

    #[test]
    fn test_code_line_is_step() {
        assert!(is_step("x = 1", &MARKERS));
        assert!(is_step("    return x;", &MARKERS));
        assert!(is_step("}", &MARKERS));
    }

    #[test]
    fn test_comment_lines_are_not_steps() {
        assert!(!is_step("  // comment", &MARKERS));
        assert!(!is_step("\t\t#x", &MARKERS));
        assert!(!is_step("#", &MARKERS));
    }

    #[test]
    fn test_blank_lines_are_not_steps() {
        for line in ["", " ", "\t", " \t \t  ", "\t\t\t"] {
            assert!(!is_step(line, &MARKERS), "{line:?} should be blank");
            assert!(!is_step::<&str>(line, &[]), "{line:?} should be blank");
        }
    }

    #[test]
    fn test_whitespace_inside_marker_is_ignored() {
        // Spaces are stripped before matching, so "/ / x" reads as "//x".
        assert!(!is_step("/ / x", &MARKERS));
    }

    #[test]
    fn test_trailing_comment_still_counts() {
        assert!(is_step("let a = 1; // trailing", &MARKERS));
    }

    #[test]
    fn test_no_markers_counts_every_nonblank_line() {
        assert!(is_step::<&str>("// comment", &[]));
        assert!(is_step::<&str>("code", &[]));
    }

    #[test]
    fn test_empty_marker_is_ignored() {
        let markers = ["", "--"];
        assert!(is_step("select 1", &markers));
        assert!(!is_step("-- note", &markers));
    }

    #[test]
    fn test_marker_order_does_not_matter() {
        let forward = ["#", "//"];
        let reverse = ["//", "#"];
        for line in ["# a", "// b", "c", "  "] {
            assert_eq!(is_step(line, &forward), is_step(line, &reverse));
        }
    }

    #[test]
    fn test_classification_is_repeatable() {
        let line = "  value = compute() ";
        assert_eq!(is_step(line, &MARKERS), is_step(line, &MARKERS));
        assert!(is_step(line, &MARKERS));
    }

    #[test]
    fn test_carriage_return_only_line_counts() {
        assert!(is_step("\r", &MARKERS));
    }

    #[test]
    fn test_strip_horizontal_whitespace() {
        assert_eq!(strip_horizontal_whitespace(" a\tb c "), "abc");
        assert_eq!(strip_horizontal_whitespace("\t \t"), "");
    }
}
