//! Plain-text rendering of a run summary

use console::Style;
use stepcountlib::{MergeAction, RunSummary};

const NAME_WIDTH: usize = 60;
const CELL_WIDTH: usize = 10;

/// Truncate a name to fit within max_len, adding ".." prefix if needed
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() > max_len {
        let tail: String = chars[chars.len() - max_len + 2..].iter().collect();
        format!("..{}", tail)
    } else {
        name.to_string()
    }
}

/// One line per merge action: status, path and step count.
fn action_line(action: &MergeAction) -> String {
    let (status, record) = match action {
        MergeAction::Update { record, .. } => ("updated", record),
        MergeAction::Append { record, .. } => ("new", record),
    };
    let path = format!("{}{}", record.directory, record.file_name);

    format!(
        "{:<8} {:<name$} {:>cell$}\n",
        status,
        truncate_name(&path, NAME_WIDTH),
        record.steps,
        name = NAME_WIDTH,
        cell = CELL_WIDTH,
    )
}

/// Render the summary printed after a run.
///
/// Dry runs also list every planned action, since nothing was written.
pub fn summary(summary: &RunSummary) -> String {
    let bold = Style::new().bold();
    let mut out = String::new();

    if !summary.saved {
        out.push_str(&format!(
            "{}\n",
            bold.apply_to(format!(
                "Dry run: {} not modified",
                summary.report_path.display()
            ))
        ));
        let header = format!(
            "{:<8} {:<name$} {:>cell$}",
            "Status",
            "File",
            "Steps",
            name = NAME_WIDTH,
            cell = CELL_WIDTH,
        );
        out.push_str(&format!("{}\n", bold.apply_to(&header)));
        out.push_str(&format!("{}\n", "-".repeat(header.len())));
        for action in &summary.plan.actions {
            out.push_str(&action_line(action));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Files:    {} in {} root(s)\n",
        summary.file_count, summary.root_count
    ));
    out.push_str(&format!("Steps:    {}\n", summary.total_steps));
    out.push_str(&format!("Updated:  {}\n", summary.updated));
    out.push_str(&format!("Appended: {}\n", summary.appended));
    if summary.saved {
        out.push_str(&format!("Saved:    {}\n", summary.report_path.display()));
    }

    out
}
