use fxhash::FxHashMap;
use ndarray::{Array2, ArrayView1};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

use super::constants::{MIN_EPOCH_SECONDS, MISSING_TOKENS, RAW_EXTENSION};
use super::error::RecordFileError;
use super::observer::{Diagnostic, Observer, Stage};

/// The optional trailing column of a sensor dump.
///
/// Numeric columns are interpreted as Unix-epoch seconds. Anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampColumn {
    Epoch(Vec<Option<OffsetDateTime>>),
    Text(Vec<Option<String>>),
}

/// One parsed sensor file: a rectangular rows x channels table of readings plus the optional
/// timestamp column.
///
/// The shape (channel count, timestamp presence) is decided once here and never re-inferred.
/// A reading of `None` is a parse-level missing field (blank, NA, or garbage); zeros are kept
/// as zeros, it is up to the metrics to decide they are not valid readings.
#[derive(Debug, Clone)]
pub struct RecordTable {
    path: PathBuf,
    readings: Array2<Option<f64>>,
    timestamps: Option<TimestampColumn>,
    total_columns: usize,
    malformed_rows: usize,
}

/// Is this token one of the missing-field spellings
fn is_missing_token(token: &str) -> bool {
    token.is_empty() || MISSING_TOKENS.iter().any(|m| token.eq_ignore_ascii_case(m))
}

/// The field at `col`, unless it lies past the detected width or is a missing marker
fn field_at<'a>(row: &[&'a str], col: usize, total_columns: usize) -> Option<&'a str> {
    row.get(col)
        .copied()
        .filter(|token| col < total_columns && !is_missing_token(token))
}

fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Split a line into fields on runs of whitespace. Consecutive tabs still mark an empty field,
/// and a single tab closing the line does not.
fn split_fields(line: &str) -> Vec<&str> {
    if !line.contains('\t') {
        return line.split_whitespace().collect();
    }
    let mut pieces: Vec<&str> = line.split('\t').collect();
    if pieces.len() > 1 && pieces.last().is_some_and(|p| p.trim().is_empty()) {
        pieces.pop();
    }
    let mut fields = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let before = fields.len();
        fields.extend(piece.split_whitespace());
        if fields.len() == before {
            fields.push("");
        }
    }
    fields
}

/// A line is worth keeping if at least one field is a number or an explicit missing marker
fn is_data_line(fields: &[&str]) -> bool {
    fields
        .iter()
        .any(|f| (!f.is_empty() && is_missing_token(f)) || parse_number(f).is_some())
}

/// The most common row width wins; ties go to the wider layout
fn detect_total_columns(rows: &[Vec<&str>]) -> usize {
    let mut widths: FxHashMap<usize, usize> = FxHashMap::default();
    for row in rows {
        *widths.entry(row.len()).or_insert(0) += 1;
    }
    widths
        .into_iter()
        .max_by(|(w1, c1), (w2, c2)| c1.cmp(c2).then(w1.cmp(w2)))
        .map(|(width, _)| width)
        .unwrap_or(0)
}

/// A trailing column looks like a timestamp when every present value is text or a whole
/// number large enough to be epoch seconds
fn looks_like_timestamp(values: &[Option<&str>]) -> bool {
    let mut present = values.iter().flatten().peekable();
    if present.peek().is_none() {
        return false;
    }
    present.all(|token| match parse_number(token) {
        Some(v) => v.fract() == 0.0 && v >= MIN_EPOCH_SECONDS,
        None => true,
    })
}

impl RecordTable {
    /// Read and parse a raw sensor file.
    ///
    /// Fails if the path does not exist or is not a .txt file, if the contents cannot be
    /// decoded, or if no usable rows remain after dropping corrupt lines.
    pub fn read(
        path: &Path,
        channel_ceiling: usize,
        observer: &dyn Observer,
    ) -> Result<Self, RecordFileError> {
        if !path.is_file() {
            return Err(RecordFileError::BadFilePath(path.to_path_buf()));
        }
        let has_raw_extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(RAW_EXTENSION))
            .unwrap_or(false);
        if !has_raw_extension {
            return Err(RecordFileError::BadExtension(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| RecordFileError::ParseError(path.to_path_buf(), e.to_string()))?;
        observer.record(
            Diagnostic::info(
                Stage::Parse,
                format!("Reading {}", human_bytes::human_bytes(bytes.len() as f64)),
            )
            .with_file(path),
        );
        let contents = String::from_utf8(bytes).map_err(|e| {
            RecordFileError::ParseError(path.to_path_buf(), format!("invalid UTF-8: {e}"))
        })?;

        Self::parse_str(path, &contents, channel_ceiling, observer)
    }

    /// Parse already decoded file contents. The path is only used for labeling.
    pub fn parse_str(
        path: &Path,
        contents: &str,
        channel_ceiling: usize,
        observer: &dyn Observer,
    ) -> Result<Self, RecordFileError> {
        let mut corrupt_lines = 0;
        let mut rows: Vec<Vec<&str>> = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_fields(line);
            if is_data_line(&fields) {
                rows.push(fields);
            } else {
                corrupt_lines += 1;
            }
        }

        let total_columns = detect_total_columns(&rows);
        if rows.is_empty() || total_columns == 0 {
            return Err(RecordFileError::EmptyFile(path.to_path_buf()));
        }

        if corrupt_lines > 0 {
            observer.record(
                Diagnostic::warning(
                    Stage::Parse,
                    format!("Skipped {corrupt_lines} line(s) without any numeric field"),
                )
                .with_file(path),
            );
        }

        let ragged_rows = rows.iter().filter(|r| r.len() != total_columns).count();
        if ragged_rows > 0 {
            observer.record(
                Diagnostic::warning(
                    Stage::Parse,
                    format!("{ragged_rows} row(s) padded or truncated to {total_columns} columns"),
                )
                .with_file(path),
            );
        }

        if total_columns < channel_ceiling + 1 {
            observer.record(
                Diagnostic::warning(
                    Stage::Parse,
                    format!(
                        "Found {total_columns} columns; expected {} channels plus a timestamp",
                        channel_ceiling
                    ),
                )
                .with_file(path),
            );
        }

        // Positional roles: a column beyond the ceiling is always the timestamp, otherwise the
        // last column is one only if it looks like it
        let has_timestamp = if total_columns > channel_ceiling {
            true
        } else if total_columns >= 2 {
            let last: Vec<Option<&str>> = rows
                .iter()
                .map(|r| field_at(r, total_columns - 1, total_columns))
                .collect();
            looks_like_timestamp(&last)
        } else {
            false
        };
        let channel_count = if has_timestamp {
            (total_columns - 1).min(channel_ceiling)
        } else {
            total_columns.min(channel_ceiling)
        };

        let mut garbage_readings = 0;
        let mut readings = Array2::<Option<f64>>::from_elem((rows.len(), channel_count), None);
        for (row_idx, row) in rows.iter().enumerate() {
            for col in 0..channel_count {
                if let Some(token) = field_at(row, col, total_columns) {
                    let value = parse_number(token);
                    if value.is_none() {
                        garbage_readings += 1;
                    }
                    readings[[row_idx, col]] = value;
                }
            }
        }
        if garbage_readings > 0 {
            observer.record(
                Diagnostic::warning(
                    Stage::Parse,
                    format!("{garbage_readings} non-numeric reading(s) treated as missing"),
                )
                .with_file(path),
            );
        }

        let timestamps = if has_timestamp {
            let raw: Vec<Option<&str>> = rows
                .iter()
                .map(|r| field_at(r, channel_count, total_columns))
                .collect();
            Some(Self::convert_timestamps(path, &raw, observer))
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            readings,
            timestamps,
            total_columns,
            malformed_rows: ragged_rows + corrupt_lines,
        })
    }

    fn convert_timestamps(
        path: &Path,
        raw: &[Option<&str>],
        observer: &dyn Observer,
    ) -> TimestampColumn {
        let all_numeric = raw.iter().flatten().all(|t| parse_number(t).is_some());
        if all_numeric {
            TimestampColumn::Epoch(
                raw.iter()
                    .map(|t| {
                        t.and_then(parse_number)
                            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs as i64).ok())
                    })
                    .collect(),
            )
        } else {
            observer.record(
                Diagnostic::warning(
                    Stage::Parse,
                    "Timestamp column is not numeric; keeping it as text",
                )
                .with_file(path),
            );
            TimestampColumn::Text(raw.iter().map(|t| t.map(String::from)).collect())
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channel_count(&self) -> usize {
        self.readings.ncols()
    }

    pub fn row_count(&self) -> usize {
        self.readings.nrows()
    }

    pub fn has_timestamp(&self) -> bool {
        self.timestamps.is_some()
    }

    /// Number of columns detected in the file, timestamp included
    pub fn total_columns(&self) -> usize {
        self.total_columns
    }

    /// Rows that were dropped as corrupt or had to be padded/truncated
    pub fn malformed_rows(&self) -> usize {
        self.malformed_rows
    }

    pub fn readings(&self) -> &Array2<Option<f64>> {
        &self.readings
    }

    /// All readings of one channel, in row order
    pub fn channel(&self, index: usize) -> ArrayView1<'_, Option<f64>> {
        self.readings.column(index)
    }

    pub fn timestamps(&self) -> Option<&TimestampColumn> {
        self.timestamps.as_ref()
    }

    /// Add `offset` to every valid reading of a channel. Missing readings and the 0.00
    /// sentinel stay as they are. Returns how many readings moved.
    pub fn shift_channel(&mut self, index: usize, offset: f64) -> usize {
        if index >= self.channel_count() {
            return 0;
        }
        let mut shifted = 0;
        for reading in self.readings.column_mut(index).iter_mut() {
            if let Some(value) = reading.as_mut().filter(|v| **v > 0.0) {
                *value += offset;
                shifted += 1;
            }
        }
        shifted
    }
}
