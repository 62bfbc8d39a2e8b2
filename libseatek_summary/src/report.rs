use fxhash::FxHashMap;
use std::path::PathBuf;

use super::aggregate::{AggregateTable, Aggregates, RankedEntry};
use super::config::Config;
use super::correction::{apply_corrections, Correction};
use super::error::WriteError;
use super::metrics::{channel_id, Metric};
use super::observer::{Diagnostic, Observer, Stage};
use super::outliers::{detect_outliers, year_to_year_differences, OutlierConfig, YearDifference};
use super::sheet_writer::{write_flat, write_workbook, Cell, SheetData};
use super::year::{YearSlice, YearTable};

pub const AGGREGATE_ALL_SHEET: &str = "AggregateAll";
pub const AGGREGATE_SUFFICIENT_SHEET: &str = "AggregateSufficient";
pub const RANKED_TOP_SHEET: &str = "RankedTop";
pub const MAIN_SUMMARY_SHEET: &str = "MainSummary";
pub const YEAR_TO_YEAR_SHEET: &str = "YearToYear";
pub const OUTLIERS_SHEET: &str = "Outliers";
pub const CORRECTIONS_SHEET: &str = "Corrections";
pub const INFO_SHEET: &str = "Info";

const ALL_SUFFIX: &str = "_all";
const SUFFICIENT_SUFFIX: &str = "_sufficient";
const TOP_SUFFIX: &str = "_top_sensors";
const MAIN_SUFFIX: &str = "";
const OUTLIERS_SUFFIX: &str = "_outliers";
const CORRECTIONS_SUFFIX: &str = "_corrections";

const HIGH_VARIABILITY_HEADER: &str = "high_variability";

/// Paths of everything a report run wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFiles {
    pub workbook: PathBuf,
    pub flat_files: Vec<PathBuf>,
    pub corrected_files: Vec<PathBuf>,
}

/// Sheet of one year: channel label, then the four metrics. The row with the largest |delta|
/// is highlighted.
pub fn year_sheet(slice: &YearSlice) -> SheetData {
    let mut header = vec![String::from("Channel")];
    header.extend(Metric::ALL.iter().map(|m| m.name().to_string()));
    let mut sheet = SheetData::new(&slice.label.to_string(), header);
    for (idx, channel) in slice.metrics.channels().iter().enumerate() {
        let mut row = vec![Cell::text(channel_id(idx))];
        row.extend(Metric::ALL.iter().map(|m| Cell::from_option(channel.get(*m))));
        sheet.push_row(row);
    }
    if let Some((idx, _)) = slice.metrics.largest_abs_delta() {
        sheet.highlight_row(idx);
    }
    sheet
}

/// Long aggregate table: channel, metric x statistic, coverage
pub fn aggregate_sheet(name: &str, table: &AggregateTable) -> SheetData {
    let mut sheet = SheetData::new(name, AggregateTable::header());
    for row in table.rows() {
        let mut cells = vec![Cell::text(row.channel_id())];
        for metric in Metric::ALL {
            cells.extend(row.get(metric).values().into_iter().map(Cell::from_option));
        }
        cells.push(Cell::from_option(row.pct_nonmissing));
        sheet.push_row(cells);
    }
    sheet
}

pub fn ranked_sheet(ranked: &[RankedEntry]) -> SheetData {
    let header = RankedEntry::HEADER.iter().map(|h| h.to_string()).collect();
    let mut sheet = SheetData::new(RANKED_TOP_SHEET, header);
    for entry in ranked {
        sheet.push_row(vec![
            Cell::text(entry.channel_id()),
            Cell::from_option(entry.delta_mean),
            Cell::from_option(entry.full_mean_mean),
            Cell::from_option(entry.full_mean_sd),
            Cell::from_option(entry.pct_nonmissing),
        ]);
    }
    sheet
}

/// The sufficient table plus a variability flag, with the ranked channels' delta means marked
pub fn main_summary_sheet(
    sufficient: &AggregateTable,
    ranked: &[RankedEntry],
    variability_threshold: f64,
) -> SheetData {
    let mut sheet = aggregate_sheet(MAIN_SUMMARY_SHEET, sufficient);
    sheet.header.push(String::from(HIGH_VARIABILITY_HEADER));
    let delta_col = sheet.column_index("delta.mean");
    for (row_idx, row) in sufficient.rows().iter().enumerate() {
        let high = row
            .get(Metric::FullMean)
            .sd
            .map(|sd| sd > variability_threshold)
            .unwrap_or(false);
        sheet.rows[row_idx].push(Cell::Bool(high));
        let is_ranked = ranked.iter().any(|e| e.channel == row.channel);
        if let (true, Some(col)) = (is_ranked, delta_col) {
            sheet.highlight_cell(row_idx, col);
        }
    }
    sheet
}

/// Wide table of year-to-year differences: one row per year pair, one column per channel
pub fn year_to_year_sheet(
    years: &YearTable,
    differences: &[YearDifference],
    channel_ceiling: usize,
) -> SheetData {
    let mut header = vec![String::from("Year_Pair")];
    header.extend((0..channel_ceiling).map(channel_id));
    let mut sheet = SheetData::new(YEAR_TO_YEAR_SHEET, header);

    let lookup: FxHashMap<(&str, usize), f64> = differences
        .iter()
        .map(|d| ((d.year_pair.as_str(), d.channel), d.difference))
        .collect();
    let slices: Vec<&YearSlice> = years.iter().collect();
    for pair in slices.windows(2) {
        let year_pair = format!("{}-{}", pair[1].label, pair[0].label);
        let mut row = vec![Cell::text(year_pair.as_str())];
        row.extend(
            (0..channel_ceiling)
                .map(|c| Cell::from_option(lookup.get(&(year_pair.as_str(), c)).copied())),
        );
        sheet.push_row(row);
    }
    sheet
}

pub fn outliers_sheet(outliers: &[YearDifference]) -> SheetData {
    let header = ["Year_Pair", "channel_id", "Difference"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut sheet = SheetData::new(OUTLIERS_SHEET, header);
    for outlier in outliers {
        sheet.push_row(vec![
            Cell::text(outlier.year_pair.as_str()),
            Cell::text(outlier.channel_id()),
            Cell::Number(outlier.difference),
        ]);
    }
    sheet
}

pub fn corrections_sheet(corrections: &[Correction]) -> SheetData {
    let header = Correction::HEADER.iter().map(|h| h.to_string()).collect();
    let mut sheet = SheetData::new(CORRECTIONS_SHEET, header);
    for correction in corrections {
        sheet.push_row(vec![
            Cell::text(correction.year_pair.as_str()),
            Cell::text(correction.channel_id()),
            Cell::Number(correction.original_difference),
            Cell::Number(correction.offset),
            Cell::text(correction.corrected_file.to_string_lossy()),
        ]);
    }
    sheet
}

fn info_sheet(message: &str) -> SheetData {
    let mut sheet = SheetData::new(INFO_SHEET, vec![String::from("Message")]);
    sheet.push_row(vec![Cell::text(message)]);
    sheet
}

/// Renders the per-year tables and the cross-year views to the summary workbook and its
/// companion flat files
#[derive(Debug, Clone)]
pub struct ReportEmitter<'a> {
    config: &'a Config,
}

impl<'a> ReportEmitter<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Year-to-year differences, the flagged ones and the corrections written for them, plus
    /// the corrected workbooks
    fn outlier_sheets(
        &self,
        years: &YearTable,
        outliers: &OutlierConfig,
        observer: &dyn Observer,
    ) -> Result<([SheetData; 3], Vec<PathBuf>), WriteError> {
        let differences = year_to_year_differences(years, self.config.channel_ceiling);
        let flagged = detect_outliers(&differences, outliers);
        observer.record(Diagnostic::info(
            Stage::Report,
            format!(
                "{} of {} year-to-year difference(s) flagged by {:?}",
                flagged.len(),
                differences.len(),
                outliers.method
            ),
        ));
        let corrections = apply_corrections(years, &flagged, self.config, observer)?;
        let mut corrected_files: Vec<PathBuf> = corrections
            .iter()
            .map(|c| c.corrected_file.clone())
            .collect();
        corrected_files.dedup();
        Ok((
            [
                year_to_year_sheet(years, &differences, self.config.channel_ceiling),
                outliers_sheet(&flagged),
                corrections_sheet(&corrections),
            ],
            corrected_files,
        ))
    }

    /// Write the report. An empty year table still gives a workbook, holding only an
    /// informational sheet. Only I/O problems are errors.
    pub fn emit(
        &self,
        years: &YearTable,
        aggregates: &Aggregates,
        observer: &dyn Observer,
    ) -> Result<ReportFiles, WriteError> {
        std::fs::create_dir_all(&self.config.output_path)?;
        let workbook_path = self.config.get_report_file_name();

        if years.is_empty() {
            observer.record(Diagnostic::warning(
                Stage::Report,
                "No years were processed; writing an informational workbook only",
            ));
            write_workbook(
                &workbook_path,
                &[info_sheet("No sensor files were processed successfully.")],
            )?;
            return Ok(ReportFiles {
                workbook: workbook_path,
                ..Default::default()
            });
        }

        let mut sheets: Vec<SheetData> = years.iter().map(year_sheet).collect();
        let all = aggregate_sheet(AGGREGATE_ALL_SHEET, &aggregates.all);
        let sufficient = aggregate_sheet(AGGREGATE_SUFFICIENT_SHEET, &aggregates.sufficient);
        let ranked = ranked_sheet(&aggregates.ranked);
        let main = main_summary_sheet(
            &aggregates.sufficient,
            &aggregates.ranked,
            self.config.variability_threshold,
        );
        let mut flat: Vec<(&str, &SheetData)> = vec![
            (ALL_SUFFIX, &all),
            (SUFFICIENT_SUFFIX, &sufficient),
            (TOP_SUFFIX, &ranked),
            (MAIN_SUFFIX, &main),
        ];

        let outlier_output = match &self.config.outliers {
            Some(o) => Some(self.outlier_sheets(years, o, observer)?),
            None => None,
        };
        if let Some(([_, outliers, corrections], _)) = &outlier_output {
            flat.push((OUTLIERS_SUFFIX, outliers));
            flat.push((CORRECTIONS_SUFFIX, corrections));
        }

        sheets.extend([&all, &sufficient, &ranked, &main].into_iter().cloned());
        if let Some((extra, _)) = &outlier_output {
            sheets.extend(extra.iter().cloned());
        }

        write_workbook(&workbook_path, &sheets)?;
        observer.record(Diagnostic::info(
            Stage::Report,
            format!(
                "Wrote {} with {} sheet(s)",
                workbook_path.to_string_lossy(),
                sheets.len()
            ),
        ));

        let mut flat_files = Vec::with_capacity(flat.len());
        for (suffix, sheet) in flat {
            let path = self.config.get_flat_file_name(suffix);
            write_flat(&path, sheet)?;
            flat_files.push(path);
        }
        observer.record(Diagnostic::info(
            Stage::Report,
            format!("Wrote {} flat table(s)", flat_files.len()),
        ));

        Ok(ReportFiles {
            workbook: workbook_path,
            flat_files,
            corrected_files: outlier_output
                .map(|(_, files)| files)
                .unwrap_or_default(),
        })
    }
}
