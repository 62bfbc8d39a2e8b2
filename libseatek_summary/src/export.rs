use std::path::Path;
use time::format_description::well_known::Rfc3339;

use super::constants::TIMESTAMP_HEADER;
use super::error::WriteError;
use super::metrics::channel_id;
use super::record_file::{RecordTable, TimestampColumn};
use super::sheet_writer::{write_workbook, Cell, SheetData};

pub const RAW_SHEET_NAME: &str = "Raw Data";

/// Lay out a parsed file as a sheet: one column per detected channel, then the timestamp
pub fn raw_data_sheet(table: &RecordTable) -> SheetData {
    let mut header: Vec<String> = (0..table.channel_count()).map(channel_id).collect();
    if table.has_timestamp() {
        header.push(String::from(TIMESTAMP_HEADER));
    }
    let mut sheet = SheetData::new(RAW_SHEET_NAME, header);

    for (row_idx, row) in table.readings().rows().into_iter().enumerate() {
        let mut cells: Vec<Cell> = row.iter().map(|r| Cell::from_option(*r)).collect();
        match table.timestamps() {
            Some(TimestampColumn::Epoch(ts)) => {
                let cell = ts[row_idx]
                    .map(|t| {
                        t.format(&Rfc3339)
                            .map(Cell::Text)
                            .unwrap_or_else(|_| Cell::Number(t.unix_timestamp() as f64))
                    })
                    .unwrap_or(Cell::Empty);
                cells.push(cell);
            }
            Some(TimestampColumn::Text(ts)) => {
                cells.push(ts[row_idx].clone().map(Cell::Text).unwrap_or(Cell::Empty));
            }
            None => (),
        }
        sheet.push_row(cells);
    }
    sheet
}

/// Write the verbatim export workbook of one parsed file
pub fn export_record_table(table: &RecordTable, path: &Path) -> Result<(), WriteError> {
    write_workbook(path, &[raw_data_sheet(table)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::MemoryObserver;
    use tempfile::TempDir;

    #[test]
    fn test_raw_sheet_layout() {
        let contents = "1.0 NA 1262304000\n0.00 2.0 1262307600\n";
        let table = RecordTable::parse_str(
            Path::new("P_Y01.txt"),
            contents,
            32,
            &MemoryObserver::new(),
        )
        .unwrap();
        let sheet = raw_data_sheet(&table);
        assert_eq!(sheet.header, vec!["Channel01", "Channel02", "Timestamp"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][1], Cell::Empty);
        assert_eq!(sheet.rows[1][0], Cell::Number(0.0));
        assert_eq!(sheet.rows[0][2], Cell::text("2010-01-01T00:00:00Z"));
    }

    #[test]
    fn test_export_writes_workbook() {
        let dir = TempDir::new().unwrap();
        let table = RecordTable::parse_str(
            Path::new("P_Y01.txt"),
            "1 2 3\n4 5 6\n",
            32,
            &MemoryObserver::new(),
        )
        .unwrap();
        let path = dir.path().join("P_Y01.xlsx");
        export_record_table(&table, &path).unwrap();
        assert!(path.metadata().unwrap().len() > 0);
    }
}
