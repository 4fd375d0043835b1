//! Fixed-layout access to the settings and results sheets.
//!
//! Settings sheet: search roots in column B and extensions in column C,
//! both listed from row 4 downward. Results sheet: one row per file from
//! row 3 downward, laid out as `[blank, No, directory, file name, steps]`
//! in columns A through E.

use tracing::{debug, info};

use crate::data::SourceFileRecord;
use crate::reconcile::{plan_merge, MergeAction, MergePlan};
use crate::Result;

use super::document::ReportDocument;
use super::sheet::{Cell, Sheet};

/// Settings sheet: first list row (row 4).
pub const SETTINGS_FIRST_ROW: usize = 3;
/// Settings sheet: search root column (B).
pub const SETTINGS_ROOT_COL: usize = 1;
/// Settings sheet: extension column (C).
pub const SETTINGS_EXTENSION_COL: usize = 2;

/// Results sheet: first data row (row 3).
pub const RESULTS_FIRST_ROW: usize = 2;
/// Results sheet: ordinal column (B).
pub const RESULTS_ORDINAL_COL: usize = 1;
/// Results sheet: directory column (C).
pub const RESULTS_DIRECTORY_COL: usize = 2;
/// Results sheet: file name column (D).
pub const RESULTS_FILE_NAME_COL: usize = 3;
/// Results sheet: step count column (E).
pub const RESULTS_STEPS_COL: usize = 4;

/// Read one column downward from `first_row` until the first empty cell.
fn read_list(sheet: &Sheet, first_row: usize, col: usize) -> Vec<String> {
    (first_row..)
        .map(|row| sheet.text(row, col))
        .take_while(|value| !value.is_empty())
        .collect()
}

/// Read the search roots and extensions from the settings sheet.
///
/// Each column ends at its own first blank cell. A blank root cell ends the
/// root list even when the extension column still has a value in that row.
pub fn load_settings_table(
    doc: &ReportDocument,
    sheet_name: &str,
) -> Result<(Vec<String>, Vec<String>)> {
    let sheet = doc.sheet(sheet_name)?;

    let roots = read_list(sheet, SETTINGS_FIRST_ROW, SETTINGS_ROOT_COL);
    let extensions = read_list(sheet, SETTINGS_FIRST_ROW, SETTINGS_EXTENSION_COL);

    info!(
        roots = roots.len(),
        extensions = extensions.len(),
        "loaded settings table"
    );
    Ok((roots, extensions))
}

/// Read the identities of previously reported files.
///
/// Every row from the first data row through the sheet's last row yields one
/// record, blank rows included, so that record index `j` always maps back to
/// row `j + RESULTS_FIRST_ROW`. Step counts are not read.
pub fn load_results_table(doc: &ReportDocument, sheet_name: &str) -> Result<Vec<SourceFileRecord>> {
    let sheet = doc.sheet(sheet_name)?;

    let records: Vec<SourceFileRecord> = (RESULTS_FIRST_ROW..sheet.row_count())
        .map(|row| {
            SourceFileRecord::new(
                sheet.text(row, RESULTS_DIRECTORY_COL),
                sheet.text(row, RESULTS_FILE_NAME_COL),
            )
        })
        .collect();

    info!(rows = records.len(), "loaded results table");
    Ok(records)
}

/// Apply a merge plan to the results sheet in memory.
///
/// Updates only touch the step column of their row; appends add a full row
/// after the current last row. Nothing is saved.
pub fn apply_plan(doc: &mut ReportDocument, sheet_name: &str, plan: &MergePlan) -> Result<()> {
    let sheet = doc.sheet_mut(sheet_name)?;

    for action in &plan.actions {
        match action {
            MergeAction::Update { row, record } => {
                sheet.set(*row, RESULTS_STEPS_COL, Cell::text(record.steps.to_string()));
                debug!(row, steps = record.steps, file = %record.file_name, "updated result row");
            }
            MergeAction::Append { ordinal, record } => {
                let row = sheet.append_row(
                    RESULTS_FIRST_ROW,
                    vec![
                        Cell::Empty,
                        Cell::text(ordinal.to_string()),
                        Cell::text(record.directory.as_str()),
                        Cell::text(record.file_name.as_str()),
                        Cell::text(record.steps.to_string()),
                    ],
                );
                debug!(row, ordinal, file = %record.file_name, "appended result row");
            }
        }
    }

    Ok(())
}

/// Merge current counts into the results sheet.
///
/// Records already present (matched by directory and file name, first match
/// wins) get their step cell overwritten in place; new records are appended.
/// The document is modified in memory only; call
/// [`ReportDocument::save`] afterwards to persist it.
pub fn upsert_results(
    doc: &mut ReportDocument,
    sheet_name: &str,
    current: &[SourceFileRecord],
    prior: &[SourceFileRecord],
) -> Result<MergePlan> {
    let plan = plan_merge(current, prior);
    apply_plan(doc, sheet_name, &plan)?;
    Ok(plan)
}
