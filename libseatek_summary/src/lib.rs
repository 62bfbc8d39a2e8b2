//! # seatek_summary
//!
//! seatek_summary turns the yearly text dumps of the Seatek riverbed-monitoring array into
//! per-sensor summary statistics. Each input file holds one measurement run (one year) of up
//! to 32 sensor channels, optionally followed by a Unix-epoch timestamp column. The files are
//! parsed tolerantly, reduced to per-channel metrics, rolled up across years and written out
//! as spreadsheet workbooks and flat CSV tables.
//!
//! ## Building & Install
//!
//! To build and install the CLI use `cargo install --path ./seatek_summary_cli` from the top
//! level repository. To use the CLI see the `seatek_summary_cli` documentation.
//!
//! ## Input
//!
//! The input directory is scanned for files matching the configured pattern, by default
//! `<PREFIX>_Y<NN>.txt`. The two digit index `NN` maps to a calendar year as
//! `year_base + NN` (1994 + NN by default, so `Y01` is 1995 and `Y20` is 2014). Indices
//! outside `first_index..=last_index` are labeled by their file name instead.
//!
//! Files are whitespace delimited. `NA` and blank (tab separated) fields are missing; a
//! reading of `0.00` is the instrument's "no reading" and never counts as a measurement.
//! Ragged rows are padded or truncated to the most common row width and lines without any
//! numeric field are dropped. Every such repair is reported in the log.
//!
//! ## Configuration
//!
//! Configuration is a YAML file; missing fields take their defaults. A template can be
//! generated with `seatek_summary_cli -p config.yml new`.
//!
//! ```yml
//! input_path: /data/Series_26/Raw_Data
//! output_path: /data/Series_26/Results
//! export_path: null
//! report_name: Seatek_Summary
//! file_pattern: ^(?P<prefix>.+)_Y(?P<index>\d{2})\.txt$
//! channel_ceiling: 32
//! lead_window: 10
//! trail_window: 5
//! sufficiency_threshold: 5
//! variability_threshold: 2.0
//! top_n: 5
//! year_base: 1994
//! first_index: 1
//! last_index: 20
//! n_threads: 1
//! outliers: null
//! ```
//!
//! The file pattern must contain a named `index` group. Setting `outliers` (for example
//! `outliers: { method: iqr, iqr_factor: 1.5 }`) adds the year-to-year difference, outlier and
//! correction sheets to the report, and writes `<report_name>_<year>_corrected.xlsx` for
//! every year with a flagged jump, its channel shifted back by the jump.
//!
//! ## Output
//!
//! - One verbatim export workbook per input file, `<stem>.xlsx`, in `export_path` (or
//!   `output_path` when unset).
//! - The summary workbook `<report_name>.xlsx`: one sheet per year, then `AggregateAll`,
//!   `AggregateSufficient`, `RankedTop` and `MainSummary`.
//! - Flat tables `<report_name>_all.csv`, `<report_name>_sufficient.csv`,
//!   `<report_name>_top_sensors.csv` and `<report_name>.csv` (the main summary).
//! - The log file `seatek_summary.log`. Every message is tagged with the stage and file it
//!   came from; files that were skipped are listed there with the reason.
//!
//! ### Metrics
//!
//! Per file and channel: `lead_mean` (valid readings among the first `lead_window` rows),
//! `trail_mean` (valid readings among the last `trail_window` rows), `full_mean` (all valid
//! readings) and `delta = full_mean - lead_mean`. Across years each metric gets mean, sample
//! sd, median, median absolute deviation, min, max, count and the mean of the last three
//! values, plus `pct_nonmissing` from the `full_mean` coverage.
pub mod aggregate;
pub mod config;
pub mod constants;
pub mod correction;
pub mod error;
pub mod export;
pub mod metrics;
pub mod observer;
pub mod outliers;
pub mod process;
pub mod record_file;
pub mod report;
pub mod sheet_writer;
pub mod stats;
pub mod worker_status;
pub mod year;
