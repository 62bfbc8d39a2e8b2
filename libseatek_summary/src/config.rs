use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::*;
use super::error::ConfigError;
use super::outliers::OutlierConfig;

/// Structure representing the application configuration. Contains pathing and analysis parameters.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml. Missing fields
/// take their default values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub export_path: Option<PathBuf>,
    pub report_name: String,
    pub file_pattern: String,
    pub channel_ceiling: usize,
    pub lead_window: usize,
    pub trail_window: usize,
    pub sufficiency_threshold: usize,
    pub variability_threshold: f64,
    pub top_n: usize,
    pub year_base: i32,
    pub first_index: u32,
    pub last_index: u32,
    pub n_threads: i32,
    pub outliers: Option<OutlierConfig>,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid, parameters take the instrument defaults
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            export_path: None,
            report_name: String::from(DEFAULT_REPORT_NAME),
            file_pattern: String::from(DEFAULT_FILE_PATTERN),
            channel_ceiling: DEFAULT_CHANNEL_CEILING,
            lead_window: DEFAULT_LEAD_WINDOW,
            trail_window: DEFAULT_TRAIL_WINDOW,
            sufficiency_threshold: DEFAULT_SUFFICIENCY_THRESHOLD,
            variability_threshold: DEFAULT_VARIABILITY_THRESHOLD,
            top_n: DEFAULT_TOP_N,
            year_base: DEFAULT_YEAR_BASE,
            first_index: DEFAULT_FIRST_INDEX,
            last_index: DEFAULT_LAST_INDEX,
            n_threads: 1,
            outliers: None,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check the parameters for values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_ceiling == 0 {
            return Err(ConfigError::Invalid(String::from(
                "channel_ceiling must be at least 1",
            )));
        }
        if self.lead_window == 0 || self.trail_window == 0 {
            return Err(ConfigError::Invalid(String::from(
                "lead_window and trail_window must be at least 1",
            )));
        }
        if self.first_index > self.last_index {
            return Err(ConfigError::Invalid(format!(
                "first_index {} is greater than last_index {}",
                self.first_index, self.last_index
            )));
        }
        if !self.is_n_threads_valid() {
            return Err(ConfigError::Invalid(String::from(
                "n_threads must be at least 1",
            )));
        }
        if self.report_name.trim().is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "report_name must not be empty",
            )));
        }
        self.compile_pattern()?;
        Ok(())
    }

    /// Compile the file pattern. The pattern must carry a named `index` group.
    pub fn compile_pattern(&self) -> Result<Regex, ConfigError> {
        let pattern = Regex::new(&self.file_pattern)?;
        if !pattern.capture_names().flatten().any(|name| name == INDEX_GROUP) {
            return Err(ConfigError::Invalid(format!(
                "file_pattern {} has no named group `{}`",
                self.file_pattern, INDEX_GROUP
            )));
        }
        Ok(pattern)
    }

    /// Get the directory the verbatim per-file exports go to
    pub fn get_export_directory(&self) -> &Path {
        self.export_path.as_deref().unwrap_or(&self.output_path)
    }

    /// Get the path to the verbatim export of a raw file
    pub fn get_export_file_name(&self, raw_path: &Path) -> PathBuf {
        let stem = raw_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.get_export_directory()
            .join(format!("{stem}.{WORKBOOK_EXTENSION}"))
    }

    /// Get the path to the summary workbook
    pub fn get_report_file_name(&self) -> PathBuf {
        self.output_path
            .join(format!("{}.{WORKBOOK_EXTENSION}", self.report_name))
    }

    /// Get the path to a flat companion table; an empty suffix is the main summary
    pub fn get_flat_file_name(&self, suffix: &str) -> PathBuf {
        self.output_path
            .join(format!("{}{suffix}.{FLAT_EXTENSION}", self.report_name))
    }

    /// Get the path to the corrected copy of one year's raw data
    pub fn get_corrected_file_name(&self, year_label: &str) -> PathBuf {
        self.output_path.join(format!(
            "{}_{year_label}_corrected.{WORKBOOK_EXTENSION}",
            self.report_name
        ))
    }

    /// Get the path to the run log
    pub fn get_log_file_name(&self) -> PathBuf {
        self.output_path.join(LOG_FILE_NAME)
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }
}
