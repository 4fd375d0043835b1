//! Report workbook persistence.
//!
//! The workbook is read with calamine into [`Sheet`] grids and mutated in
//! memory. On save, the cells written since opening are patched into the
//! original package (see [`super::patch`]), so formulas, styles, column
//! widths and merged cells are kept. A document built in memory with
//! [`ReportDocument::from_sheets`] has no original and is written from
//! scratch with rust_xlsxwriter.
//!
//! Saving goes through a temporary file in the report's directory that is
//! renamed over the original, so a failed save never leaves a half-written
//! report behind.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Xlsx, XlsxError};
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};

use crate::error::StepcountError;
use crate::Result;

use super::patch::patch_workbook;
use super::sheet::{Cell, CellEdits, Sheet};

/// An open report workbook.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    path: PathBuf,
    sheets: Vec<Sheet>,
    /// Package bytes as read from disk; `None` for documents built in memory
    source: Option<Vec<u8>>,
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(n) => Cell::Number(*n),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        other => Cell::Text(other.to_string()),
    }
}

/// Load every sheet's values from xlsx bytes.
fn read_sheets(source: &[u8]) -> std::result::Result<Vec<Sheet>, String> {
    let mut workbook = Xlsx::new(Cursor::new(source)).map_err(|e: XlsxError| e.to_string())?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e: XlsxError| format!("failed to read sheet '{}': {}", name, e))?;

        let mut sheet = Sheet::new(name);
        // Range start offset (data may not begin at A1)
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        for (row_idx, row) in range.rows().enumerate() {
            for (col_idx, data) in row.iter().enumerate() {
                let cell = to_cell(data);
                if matches!(cell, Cell::Empty) {
                    continue;
                }
                sheet.set(
                    start_row as usize + row_idx,
                    start_col as usize + col_idx,
                    cell,
                );
            }
        }
        sheet.clear_edits();
        sheets.push(sheet);
    }

    Ok(sheets)
}

impl ReportDocument {
    /// Build a document from sheets already in memory.
    ///
    /// Saving it writes a new workbook holding only the sheet values.
    pub fn from_sheets(path: impl Into<PathBuf>, sheets: Vec<Sheet>) -> Self {
        Self {
            path: path.into(),
            sheets,
            source: None,
        }
    }

    /// Open an `.xlsx` report and load every sheet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_error = |message: String| StepcountError::ReportOpen {
            path: path.to_path_buf(),
            message,
        };

        let source = fs::read(path).map_err(|e| open_error(e.to_string()))?;
        let sheets = read_sheets(&source).map_err(open_error)?;

        info!(path = %path.display(), sheets = sheets.len(), "opened report");
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
            source: Some(source),
        })
    }

    /// Path the document was opened from and will be saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All sheets, in workbook order.
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Look up a sheet by name.
    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| self.sheet_not_found(name))
    }

    /// Look up a sheet by name for mutation.
    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        match self.sheets.iter().position(|s| s.name == name) {
            Some(idx) => Ok(&mut self.sheets[idx]),
            None => Err(self.sheet_not_found(name)),
        }
    }

    fn sheet_not_found(&self, name: &str) -> StepcountError {
        StepcountError::SheetNotFound {
            path: self.path.clone(),
            sheet: name.to_string(),
        }
    }

    /// Serialize the workbook to xlsx bytes.
    ///
    /// An opened workbook comes back as the original package with the edited
    /// cells patched in; one built in memory is written from scratch.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            Some(source) => self.patched_bytes(source),
            None => self.new_workbook_bytes(),
        }
    }

    fn patched_bytes(&self, source: &[u8]) -> Result<Vec<u8>> {
        let edits: Vec<(&str, &CellEdits)> = self
            .sheets
            .iter()
            .filter(|sheet| !sheet.edits().is_empty())
            .map(|sheet| (sheet.name.as_str(), sheet.edits()))
            .collect();

        if edits.is_empty() {
            return Ok(source.to_vec());
        }

        debug!(
            sheets = edits.len(),
            cells = edits.iter().map(|(_, cells)| cells.len()).sum::<usize>(),
            "patching edited cells"
        );
        patch_workbook(source, &edits).map_err(|message| StepcountError::ReportWrite {
            path: self.path.clone(),
            message,
        })
    }

    fn new_workbook_bytes(&self) -> Result<Vec<u8>> {
        let write_error = |message: String| StepcountError::ReportWrite {
            path: self.path.clone(),
            message,
        };

        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(&sheet.name)
                .map_err(|e| write_error(format!("failed to create sheet '{}': {}", sheet.name, e)))?;

            for (row, col, cell) in sheet.cells() {
                let (row, col) = (row as u32, col as u16);
                match cell {
                    Cell::Text(s) => worksheet.write_string(row, col, s),
                    Cell::Number(n) => worksheet.write_number(row, col, *n),
                    Cell::Bool(b) => worksheet.write_boolean(row, col, *b),
                    Cell::Empty => continue,
                }
                .map_err(|e| write_error(format!("failed to write cell: {}", e)))?;
            }
        }

        workbook
            .save_to_buffer()
            .map_err(|e| write_error(e.to_string()))
    }

    /// Write the workbook back to its original path.
    ///
    /// The new content is written to a temporary file next to the report and
    /// then renamed over it.
    pub fn save(&self) -> Result<()> {
        let buffer = self.to_bytes()?;
        let write_error = |source: std::io::Error| StepcountError::ReportWrite {
            path: self.path.clone(),
            message: source.to_string(),
        };

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::Builder::new()
            .prefix(".stepcount-")
            .suffix(".xlsx")
            .tempfile_in(dir)
            .map_err(write_error)?;
        temp.write_all(&buffer).map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;

        if let Ok(metadata) = fs::metadata(&self.path) {
            fs::set_permissions(temp.path(), metadata.permissions()).map_err(write_error)?;
        }

        temp.persist(&self.path).map_err(|e| write_error(e.error))?;

        info!(path = %self.path.display(), bytes = buffer.len(), "saved report");
        Ok(())
    }
}
