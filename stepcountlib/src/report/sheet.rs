//! In-memory worksheet grid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// No value
    #[default]
    Empty,
    /// A string value
    Text(String),
    /// A numeric value
    Number(f64),
    /// A boolean value
    Bool(bool),
}

impl Cell {
    /// Create a text cell
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Check if the cell has no visible value.
    ///
    /// A text cell holding an empty string counts as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Cell::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// Cells written since a sheet was loaded, keyed by `(row, col)`.
pub type CellEdits = BTreeMap<(usize, usize), Cell>;

/// A named worksheet stored as absolutely positioned rows.
///
/// Row and column indices are 0-based and match the positions in the
/// workbook file: row 0 is spreadsheet row 1, column 0 is column A.
///
/// Every write is also recorded in an edit log so a save can touch only
/// the cells that changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    /// Sheet name as shown on the workbook tab
    pub name: String,
    rows: Vec<Vec<Cell>>,
    edits: CellEdits,
}

impl Sheet {
    /// Create an empty sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            edits: CellEdits::new(),
        }
    }

    /// Cells written since the sheet was loaded.
    pub fn edits(&self) -> &CellEdits {
        &self.edits
    }

    /// Forget recorded writes; the grid becomes the baseline.
    pub(crate) fn clear_edits(&mut self) {
        self.edits.clear();
    }

    /// Number of rows up to and including the last populated one.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get a cell, if it exists.
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Get the display text of a cell; missing cells read as `""`.
    pub fn text(&self, row: usize, col: usize) -> String {
        self.get(row, col).map(Cell::to_string).unwrap_or_default()
    }

    /// Set a cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, value: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize_with(col + 1, Cell::default);
        }
        cells[col] = value.clone();
        self.edits.insert((row, col), value);
    }

    /// Append a row after the last existing row, never above `min_row`.
    ///
    /// Returns the index of the new row.
    pub fn append_row(&mut self, min_row: usize, cells: Vec<Cell>) -> usize {
        let row = self.rows.len().max(min_row);
        if self.rows.len() < row {
            self.rows.resize_with(row, Vec::new);
        }
        for (col, cell) in cells.iter().enumerate() {
            if !matches!(cell, Cell::Empty) {
                self.edits.insert((row, col), cell.clone());
            }
        }
        self.rows.push(cells);
        row
    }

    /// Iterate over all non-empty cells as `(row, col, cell)`.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &Cell)> {
        self.rows.iter().enumerate().flat_map(|(r, cells)| {
            cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| !matches!(cell, Cell::Empty))
                .map(move |(c, cell)| (r, c, cell))
        })
    }
}
