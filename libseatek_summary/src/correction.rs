//! Level shifts for flagged year-to-year jumps.
//!
//! Every flagged difference is undone on the later year of its pair: the raw readings of that
//! channel are re-read and moved by `-difference`, and the corrected year is written as its own
//! workbook. All flags that land on the same year go into one corrected file.
use std::path::PathBuf;

use super::config::Config;
use super::error::WriteError;
use super::export::{raw_data_sheet, RAW_SHEET_NAME};
use super::metrics::channel_id;
use super::observer::{Diagnostic, Observer, Stage};
use super::outliers::YearDifference;
use super::record_file::RecordTable;
use super::sheet_writer::write_workbook;
use super::year::{YearLabel, YearTable};

/// One applied offset
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub year_pair: String,
    pub channel: usize,
    pub original_difference: f64,
    pub offset: f64,
    pub corrected_file: PathBuf,
}

impl Correction {
    pub const HEADER: [&'static str; 5] = [
        "Year_Pair",
        "Sensor",
        "OrigDiff",
        "OffsetApplied",
        "CorrectedFile",
    ];

    pub fn channel_id(&self) -> String {
        channel_id(self.channel)
    }
}

/// Flagged differences grouped by the year they correct, in order of first appearance
fn group_by_later_year(flagged: &[YearDifference]) -> Vec<(&YearLabel, Vec<&YearDifference>)> {
    let mut groups: Vec<(&YearLabel, Vec<&YearDifference>)> = Vec::new();
    for difference in flagged {
        match groups.iter_mut().find(|(label, _)| *label == &difference.later) {
            Some((_, members)) => members.push(difference),
            None => groups.push((&difference.later, vec![difference])),
        }
    }
    groups
}

/// Write a corrected copy of every year that carries a flagged jump.
///
/// A year whose raw file can no longer be read is reported and left out, like a skipped
/// file. Only failing to write a corrected workbook is an error.
pub fn apply_corrections(
    years: &YearTable,
    flagged: &[YearDifference],
    config: &Config,
    observer: &dyn Observer,
) -> Result<Vec<Correction>, WriteError> {
    let mut corrections = Vec::new();
    for (label, differences) in group_by_later_year(flagged) {
        let Some(slice) = years.get(label) else {
            observer.record(Diagnostic::warning(
                Stage::Report,
                format!("No processed year {label} to correct"),
            ));
            continue;
        };
        let mut table = match RecordTable::read(&slice.source, config.channel_ceiling, observer)
        {
            Ok(table) => table,
            Err(e) => {
                observer.record(
                    Diagnostic::warning(
                        Stage::Report,
                        format!("Could not re-read year {label} for correction: {e}"),
                    )
                    .with_file(&slice.source),
                );
                continue;
            }
        };

        let corrected_file = config.get_corrected_file_name(&label.to_string());
        let mut applied = Vec::new();
        for difference in differences {
            let offset = -difference.difference;
            if table.shift_channel(difference.channel, offset) == 0 {
                observer.record(
                    Diagnostic::warning(
                        Stage::Report,
                        format!(
                            "{} has no valid readings in {label}; nothing to correct",
                            difference.channel_id()
                        ),
                    )
                    .with_file(&slice.source),
                );
                continue;
            }
            applied.push(Correction {
                year_pair: difference.year_pair.clone(),
                channel: difference.channel,
                original_difference: difference.difference,
                offset,
                corrected_file: corrected_file.clone(),
            });
        }
        if applied.is_empty() {
            continue;
        }

        let mut sheet = raw_data_sheet(&table);
        sheet.name = format!("{RAW_SHEET_NAME} {label}");
        write_workbook(&corrected_file, &[sheet])?;
        observer.record(
            Diagnostic::info(
                Stage::Report,
                format!(
                    "Applied {} correction(s) to {label}, wrote {}",
                    applied.len(),
                    corrected_file.to_string_lossy()
                ),
            )
            .with_file(&slice.source),
        );
        corrections.append(&mut applied);
    }
    Ok(corrections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{MemoryObserver, Severity};
    use crate::outliers::{detect_outliers, year_to_year_differences, OutlierConfig};
    use crate::process::process_corpus;
    use tempfile::TempDir;

    fn corpus(files: &[(&str, &str)]) -> (TempDir, Config, YearTable) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("raw");
        std::fs::create_dir(&input).unwrap();
        for (name, contents) in files {
            std::fs::write(input.join(name), contents).unwrap();
        }
        let mut config = Config::default();
        config.input_path = input;
        config.output_path = dir.path().join("out");
        config.report_name = String::from("S26");
        let years = process_corpus(&config, &MemoryObserver::new()).unwrap().years;
        (dir, config, years)
    }

    #[test]
    fn test_flagged_jump_is_shifted_back() {
        let (_dir, config, years) = corpus(&[
            ("S26_Y01.txt", "1 4\n1 4\n"),
            ("S26_Y02.txt", "3 4\n3 4\n"),
            ("S26_Y03.txt", "3 4.05\n3 4.05\n"),
        ]);
        let differences = year_to_year_differences(&years, config.channel_ceiling);
        let flagged = detect_outliers(&differences, &OutlierConfig::default());
        assert_eq!(flagged.len(), 1);

        let observer = MemoryObserver::new();
        let corrections = apply_corrections(&years, &flagged, &config, &observer).unwrap();
        assert_eq!(corrections.len(), 1);
        let correction = &corrections[0];
        assert_eq!(correction.year_pair, "1996-1995");
        assert_eq!(correction.channel_id(), "Channel01");
        assert_eq!(correction.original_difference, 2.0);
        assert_eq!(correction.offset, -2.0);
        assert_eq!(
            correction.corrected_file,
            config.output_path.join("S26_1996_corrected.xlsx")
        );
        assert!(correction.corrected_file.exists());
        assert!(observer
            .from_stage(Stage::Report)
            .iter()
            .all(|d| d.severity == Severity::Info));
    }

    #[test]
    fn test_flags_on_one_year_share_a_file() {
        let (_dir, config, years) = corpus(&[
            ("S26_Y01.txt", "1 4\n"),
            ("S26_Y02.txt", "3 5\n"),
        ]);
        let differences = year_to_year_differences(&years, config.channel_ceiling);
        let flagged = detect_outliers(&differences, &OutlierConfig::default());
        let corrections =
            apply_corrections(&years, &flagged, &config, &MemoryObserver::new()).unwrap();
        let channels: Vec<usize> = corrections.iter().map(|c| c.channel).collect();
        assert_eq!(channels, vec![0, 1]);
        assert_eq!(corrections[0].corrected_file, corrections[1].corrected_file);
    }

    #[test]
    fn test_unreadable_source_is_left_out() {
        let (_dir, config, years) = corpus(&[
            ("S26_Y01.txt", "1\n"),
            ("S26_Y02.txt", "3\n"),
        ]);
        std::fs::remove_file(config.input_path.join("S26_Y02.txt")).unwrap();
        let differences = year_to_year_differences(&years, config.channel_ceiling);
        let flagged = detect_outliers(&differences, &OutlierConfig::default());
        let observer = MemoryObserver::new();
        let corrections = apply_corrections(&years, &flagged, &config, &observer).unwrap();
        assert!(corrections.is_empty());
        assert_eq!(observer.count(Severity::Warning), 1);
        assert!(!config.output_path.join("S26_1996_corrected.xlsx").exists());
    }
}
