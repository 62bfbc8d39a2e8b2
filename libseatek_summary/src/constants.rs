// Instrument layout
pub const DEFAULT_CHANNEL_CEILING: usize = 32;
pub const CHANNEL_PREFIX: &str = "Channel";
pub const TIMESTAMP_HEADER: &str = "Timestamp";

// Windowing for the per-file metrics
pub const DEFAULT_LEAD_WINDOW: usize = 10;
pub const DEFAULT_TRAIL_WINDOW: usize = 5;

// Cross-year aggregation
pub const DEFAULT_SUFFICIENCY_THRESHOLD: usize = 5;
pub const DEFAULT_VARIABILITY_THRESHOLD: f64 = 2.0;
pub const DEFAULT_TOP_N: usize = 5;
pub const TRAILING_WINDOW: usize = 3;

// Year labels: calendar year = base + file index
pub const DEFAULT_YEAR_BASE: i32 = 1994;
pub const DEFAULT_FIRST_INDEX: u32 = 1;
pub const DEFAULT_LAST_INDEX: u32 = 20;

/// Default file naming scheme, e.g. `S26_Y01.txt`
pub const DEFAULT_FILE_PATTERN: &str = r"^(?P<prefix>.+)_Y(?P<index>\d{2})\.txt$";
pub const INDEX_GROUP: &str = "index";
pub const RAW_EXTENSION: &str = "txt";
pub const WORKBOOK_EXTENSION: &str = "xlsx";
pub const FLAT_EXTENSION: &str = "csv";

/// Epoch seconds below this are treated as plain readings, not timestamps (~1973)
pub const MIN_EPOCH_SECONDS: f64 = 100_000_000.0;

/// Tokens treated as a missing field when parsing
pub const MISSING_TOKENS: [&str; 3] = ["NA", "NAN", "N/A"];

pub const DEFAULT_REPORT_NAME: &str = "Seatek_Summary";
pub const LOG_FILE_NAME: &str = "seatek_summary.log";

// Outlier detection on year-to-year differences
pub const DEFAULT_ABS_THRESHOLD: f64 = 0.1;
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;
pub const DEFAULT_IQR_FACTOR: f64 = 1.5;

// Excel limits
pub const MAX_SHEET_NAME_LEN: usize = 31;
