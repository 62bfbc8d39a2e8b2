//! Shared plumbing for every spreadsheet and flat-file artifact.
//!
//! Sheets are assembled as plain [`SheetData`] first and rendered afterwards, so the same
//! table can go to a workbook sheet and a CSV file. Every artifact is rendered in memory,
//! written to a temporary sibling and renamed into place, so a failed run never leaves a
//! truncated file behind.
use fxhash::FxHashSet;
use rust_xlsxwriter::{Color, Format, Workbook};
use std::path::{Path, PathBuf};

use super::constants::MAX_SHEET_NAME_LEN;
use super::error::WriteError;

const HIGHLIGHT_COLOR: u32 = 0xFFEB9C;
const INVALID_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Number(v),
            _ => Self::Empty,
        }
    }

    /// Text used in flat files; empty cells become empty fields
    pub fn to_field(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(v) => v.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Empty => String::new(),
        }
    }
}

/// One rectangular table destined for a sheet and/or a flat file
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    highlights: FxHashSet<(usize, usize)>,
}

impl SheetData {
    pub fn new(name: &str, header: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            header,
            rows: Vec::new(),
            highlights: FxHashSet::default(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Mark a single data cell (row index excludes the header)
    pub fn highlight_cell(&mut self, row: usize, col: usize) {
        self.highlights.insert((row, col));
    }

    pub fn highlight_row(&mut self, row: usize) {
        for col in 0..self.header.len() {
            self.highlights.insert((row, col));
        }
    }

    pub fn is_highlighted(&self, row: usize, col: usize) -> bool {
        self.highlights.contains(&(row, col))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

/// Make a name Excel accepts and that is not already taken in this workbook
pub fn sanitize_sheet_name(name: &str, used: &mut FxHashSet<String>) -> String {
    let mut clean: String = name
        .chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    clean = clean.trim_matches('\'').to_string();
    if clean.is_empty() {
        clean = String::from("Sheet");
    }
    let base: String = clean.chars().take(MAX_SHEET_NAME_LEN).collect();
    let mut candidate = base.clone();
    let mut counter = 1;
    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!("_{counter}");
        let keep = MAX_SHEET_NAME_LEN - suffix.len();
        candidate = format!("{}{suffix}", base.chars().take(keep).collect::<String>());
        counter += 1;
    }
    used.insert(candidate.to_lowercase());
    candidate
}

/// Render the sheets into a workbook and place it at `path`
pub fn write_workbook(path: &Path, sheets: &[SheetData]) -> Result<(), WriteError> {
    let header_format = Format::new().set_bold();
    let highlight_format = Format::new().set_background_color(Color::RGB(HIGHLIGHT_COLOR));

    let mut workbook = Workbook::new();
    let mut used = FxHashSet::default();
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sanitize_sheet_name(&sheet.name, &mut used))?;
        for (col, title) in sheet.header.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, title, &header_format)?;
        }
        for (row_idx, row) in sheet.rows.iter().enumerate() {
            let xl_row = (row_idx + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let xl_col = col as u16;
                let highlight = sheet.is_highlighted(row_idx, col);
                match (cell, highlight) {
                    (Cell::Text(s), false) => {
                        worksheet.write_string(xl_row, xl_col, s)?;
                    }
                    (Cell::Text(s), true) => {
                        worksheet.write_string_with_format(xl_row, xl_col, s, &highlight_format)?;
                    }
                    (Cell::Number(v), false) => {
                        worksheet.write_number(xl_row, xl_col, *v)?;
                    }
                    (Cell::Number(v), true) => {
                        worksheet.write_number_with_format(xl_row, xl_col, *v, &highlight_format)?;
                    }
                    (Cell::Bool(b), false) => {
                        worksheet.write_boolean(xl_row, xl_col, *b)?;
                    }
                    (Cell::Bool(b), true) => {
                        worksheet.write_boolean_with_format(xl_row, xl_col, *b, &highlight_format)?;
                    }
                    (Cell::Empty, false) => (),
                    (Cell::Empty, true) => {
                        worksheet.write_blank(xl_row, xl_col, &highlight_format)?;
                    }
                }
            }
        }
        if !sheet.header.is_empty() {
            worksheet.set_freeze_panes(1, 0)?;
        }
    }

    let buffer = workbook.save_to_buffer()?;
    write_atomically(path, &buffer)
}

/// Write a sheet as a CSV file at `path`
pub fn write_flat(path: &Path, sheet: &SheetData) -> Result<(), WriteError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&sheet.header)?;
    for row in sheet.rows.iter() {
        writer.write_record(row.iter().map(Cell::to_field))?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|e| WriteError::IOError(e.into_error()))?;
    write_atomically(path, &buffer)
}

fn temporary_sibling(path: &Path) -> Result<PathBuf, WriteError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| WriteError::BadOutputPath(path.to_path_buf()))?;
    Ok(path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy())))
}

/// Write to a temporary file next to `path`, then rename over it
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => (),
        _ => return Err(WriteError::BadOutputPath(path.to_path_buf())),
    }
    let tmp_path = temporary_sibling(path)?;
    let result = std::fs::write(&tmp_path, bytes).and_then(|_| std::fs::rename(&tmp_path, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(WriteError::IOError(e));
    }
    Ok(())
}
