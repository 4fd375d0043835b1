//! In-place edits of an xlsx package.
//!
//! Only the worksheet parts that hold edited cells are rewritten, and inside
//! them only the edited `<c>` elements (plus any rows they need). Every other
//! byte of the package is copied through, so styles, formulas, column widths,
//! merged ranges and untouched sheets survive a save.
//!
//! Edited text is written as inline strings (`t="inlineStr"`), which keeps
//! the shared string table untouched. A replaced cell keeps its `s` style
//! index.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek, Write};

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::sheet::{Cell, CellEdits};

/// Apply cell edits to the worksheets of an xlsx package.
///
/// `edits` pairs a sheet name (as shown on the tab) with the cells to write.
pub(crate) fn patch_workbook(source: &[u8], edits: &[(&str, &CellEdits)]) -> Result<Vec<u8>, String> {
    let mut archive = ZipArchive::new(Cursor::new(source))
        .map_err(|e| format!("failed to read workbook as ZIP: {}", e))?;

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml")?;
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let paths = worksheet_paths(&workbook_xml, &rels_xml);

    let mut patched: HashMap<String, String> = HashMap::new();
    for (name, cells) in edits {
        if cells.is_empty() {
            continue;
        }
        let path = paths
            .get(*name)
            .ok_or_else(|| format!("no worksheet part for sheet '{}'", name))?;
        let xml = read_zip_file(&mut archive, path)?;
        patched.insert(path.clone(), patch_sheet_xml(&xml, cells)?);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| format!("failed to read ZIP entry {}: {}", i, e))?;
        let name = file.name().to_string();
        let method = match file.compression() {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let options = SimpleFileOptions::default().compression_method(method);

        if file.is_dir() {
            zip.add_directory(name.as_str(), options)
                .map_err(|e| format!("failed to write '{}': {}", name, e))?;
            continue;
        }

        let data = match patched.remove(&name) {
            Some(xml) => xml.into_bytes(),
            None => {
                let mut data = Vec::new();
                file.read_to_end(&mut data)
                    .map_err(|e| format!("failed to read '{}': {}", name, e))?;
                data
            }
        };

        zip.start_file(name.as_str(), options)
            .map_err(|e| format!("failed to write '{}': {}", name, e))?;
        zip.write_all(&data)
            .map_err(|e| format!("failed to write '{}': {}", name, e))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| format!("failed to finish ZIP: {}", e))?;
    Ok(cursor.into_inner())
}

/// Read a file from a ZIP archive.
fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("file '{}' not found in workbook: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("failed to read '{}': {}", path, e))?;
    Ok(content)
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Map sheet names to their worksheet part inside the package.
fn worksheet_paths(workbook_xml: &str, rels_xml: &str) -> HashMap<String, String> {
    let mut name_to_rid: Vec<(String, String)> = Vec::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(e, b"name");
                let rid = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref().ends_with(b":id"))
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                if let (Some(name), Some(rid)) = (name, rid) {
                    name_to_rid.push((name, rid));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr_value(e, b"Id"), attr_value(e, b"Target")) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    name_to_rid
        .into_iter()
        .filter_map(|(name, rid)| {
            let target = rid_to_target.get(&rid)?;
            let path = match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{}", target),
            };
            Some((name, path))
        })
        .collect()
}

/// Convert a 0-based column index to letters (0 → `A`, 26 → `AA`).
fn col_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        letters.push(b'A' + ((n - 1) % 26) as u8);
        n = (n - 1) / 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

fn cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", col_letters(col), row + 1)
}

/// Parse an `A1` style reference into 0-based `(row, col)`.
fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let col = letters.bytes().try_fold(0usize, |acc, b| {
        acc.checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A') as usize + 1)
    })?;
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

/// Namespace prefix of an element name including the colon, or `""`.
fn element_prefix(e: &BytesStart) -> String {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    match name.find(':') {
        Some(idx) => name[..=idx].to_string(),
        None => String::new(),
    }
}

/// Turn the raw text of an empty element (`<row r="3"/>`) into its start tag.
fn open_tag(raw: &str) -> String {
    let inner = raw.trim_end_matches('>').trim_end_matches('/').trim_end();
    format!("{}>", inner)
}

fn write_cell(out: &mut String, prefix: &str, row: usize, col: usize, cell: &Cell, style: Option<&str>) {
    let reference = cell_ref(row, col);
    let style = style.map(|s| format!(" s=\"{}\"", s)).unwrap_or_default();

    match cell {
        Cell::Empty => {
            out.push_str(&format!("<{prefix}c r=\"{reference}\"{style}/>"));
        }
        Cell::Text(text) => {
            out.push_str(&format!(
                "<{prefix}c r=\"{reference}\"{style} t=\"inlineStr\"><{prefix}is><{prefix}t xml:space=\"preserve\">{}</{prefix}t></{prefix}is></{prefix}c>",
                escape(text.as_str())
            ));
        }
        Cell::Number(n) => {
            out.push_str(&format!(
                "<{prefix}c r=\"{reference}\"{style}><{prefix}v>{n}</{prefix}v></{prefix}c>"
            ));
        }
        Cell::Bool(b) => {
            out.push_str(&format!(
                "<{prefix}c r=\"{reference}\"{style} t=\"b\"><{prefix}v>{}</{prefix}v></{prefix}c>",
                u8::from(*b)
            ));
        }
    }
}

fn write_row(out: &mut String, prefix: &str, row: usize, cells: &BTreeMap<usize, &Cell>) {
    out.push_str(&format!("<{prefix}row r=\"{}\">", row + 1));
    for (&col, cell) in cells {
        write_cell(out, prefix, row, col, cell, None);
    }
    out.push_str(&format!("</{prefix}row>"));
}

/// Rewrite `<dimension ref>` so it covers the edited cells too.
fn dimension_tag(e: &BytesStart, edits: &CellEdits) -> Option<String> {
    let reference = attr_value(e, b"ref")?;
    let (first, last) = match reference.split_once(':') {
        Some((first, last)) => (parse_cell_ref(first)?, parse_cell_ref(last)?),
        None => {
            let only = parse_cell_ref(&reference)?;
            (only, only)
        }
    };

    let (mut top, mut left) = first;
    let (mut bottom, mut right) = last;
    for &(row, col) in edits.keys() {
        top = top.min(row);
        left = left.min(col);
        bottom = bottom.max(row);
        right = right.max(col);
    }

    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    Some(format!(
        "<{} ref=\"{}:{}\"/>",
        name,
        cell_ref(top, left),
        cell_ref(bottom, right)
    ))
}

/// Write `edits` into one worksheet's XML.
///
/// Existing cells at edited positions are replaced, missing cells and rows
/// are inserted in order. Rows and cells without an `r` attribute are
/// numbered by position, as spreadsheet programs do.
pub(crate) fn patch_sheet_xml(xml: &str, edits: &CellEdits) -> Result<String, String> {
    let mut pending: BTreeMap<usize, BTreeMap<usize, &Cell>> = BTreeMap::new();
    for (&(row, col), cell) in edits {
        pending.entry(row).or_default().insert(col, cell);
    }

    let mut reader = Reader::from_str(xml);
    let mut out = String::with_capacity(xml.len() + 256);
    // Input bytes before this offset are already in `out`
    let mut copied = 0;
    let mut prefix = String::new();
    let mut next_row = 0;
    let mut next_col = 0;
    let mut open_row: Option<(usize, BTreeMap<usize, &Cell>)> = None;
    let mut replacing = false;

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed worksheet XML at byte {}: {}", start, e))?;
        let end = reader.buffer_position() as usize;

        if replacing {
            if let Event::End(ref e) = event {
                if e.local_name().as_ref() == b"c" {
                    replacing = false;
                    copied = end;
                }
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Empty(ref e) if e.local_name().as_ref() == b"dimension" => {
                if let Some(tag) = dimension_tag(e, edits) {
                    out.push_str(&xml[copied..start]);
                    out.push_str(&tag);
                    copied = end;
                }
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" => {
                prefix = element_prefix(e);
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                prefix = element_prefix(e);
                if !pending.is_empty() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    out.push_str(&xml[copied..start]);
                    out.push_str(&open_tag(&xml[start..end]));
                    for (row, cells) in std::mem::take(&mut pending) {
                        write_row(&mut out, &prefix, row, &cells);
                    }
                    out.push_str(&format!("</{}>", name));
                    copied = end;
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                if !pending.is_empty() {
                    out.push_str(&xml[copied..start]);
                    for (row, cells) in std::mem::take(&mut pending) {
                        write_row(&mut out, &prefix, row, &cells);
                    }
                    copied = start;
                }
            }
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                let row = attr_value(e, b"r")
                    .and_then(|r| r.parse::<usize>().ok())
                    .and_then(|r| r.checked_sub(1))
                    .unwrap_or(next_row);
                next_row = row + 1;

                let later = pending.split_off(&row);
                let earlier = std::mem::replace(&mut pending, later);
                let cells = pending.remove(&row);
                if !earlier.is_empty() || cells.is_some() {
                    out.push_str(&xml[copied..start]);
                    copied = start;
                    for (r, row_cells) in &earlier {
                        write_row(&mut out, &prefix, *r, row_cells);
                    }
                }

                if matches!(event, Event::Empty(_)) {
                    if let Some(cells) = cells {
                        out.push_str(&open_tag(&xml[start..end]));
                        for (&col, cell) in &cells {
                            write_cell(&mut out, &prefix, row, col, cell, None);
                        }
                        out.push_str(&format!("</{}row>", prefix));
                        copied = end;
                    }
                } else {
                    next_col = 0;
                    open_row = cells.map(|cells| (row, cells));
                }
            }
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                let col = attr_value(e, b"r")
                    .and_then(|r| parse_cell_ref(&r))
                    .map(|(_, col)| col)
                    .unwrap_or(next_col);
                next_col = col + 1;

                if let Some((row, cells)) = open_row.as_mut() {
                    let later = cells.split_off(&col);
                    let earlier = std::mem::replace(cells, later);
                    let replacement = cells.remove(&col);
                    if !earlier.is_empty() || replacement.is_some() {
                        out.push_str(&xml[copied..start]);
                        copied = start;
                        for (&c, cell) in &earlier {
                            write_cell(&mut out, &prefix, *row, c, cell, None);
                        }
                    }

                    if let Some(cell) = replacement {
                        let style = attr_value(e, b"s");
                        write_cell(&mut out, &prefix, *row, col, cell, style.as_deref());
                        if matches!(event, Event::Start(_)) {
                            replacing = true;
                        } else {
                            copied = end;
                        }
                    }
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"row" => {
                if let Some((row, cells)) = open_row.take() {
                    if !cells.is_empty() {
                        out.push_str(&xml[copied..start]);
                        copied = start;
                        for (&col, cell) in &cells {
                            write_cell(&mut out, &prefix, row, col, cell, None);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if !pending.is_empty() {
        return Err("worksheet has no sheetData element".to_string());
    }

    out.push_str(&xml[copied..]);
    Ok(out)
}
