use std::path::PathBuf;
use thiserror::Error;

use super::constants::RAW_EXTENSION;

#[derive(Debug, Error)]
pub enum RecordFileError {
    #[error("Could not open record file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Record file {0:?} does not have the expected .{ext} extension", ext=RAW_EXTENSION)]
    BadExtension(PathBuf),
    #[error("Record file {0:?} could not be read: {1}")]
    ParseError(PathBuf, String),
    #[error("Record file {0:?} contains no rows or no parseable columns")]
    EmptyFile(PathBuf),
}

impl RecordFileError {
    /// Both bad paths and bad extensions are invalid input
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::BadFilePath(_) | Self::BadExtension(_))
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Writer failed due to xlsx error: {0}")]
    XlsxError(#[from] rust_xlsxwriter::XlsxError),
    #[error("Writer failed due to csv error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Writer could not place output at {0:?}")]
    BadOutputPath(PathBuf),
}

#[derive(Debug, Error)]
pub enum FileProcessError {
    #[error("File processing failed due to record file error: {0}")]
    RecordFile(#[from] RecordFileError),
    #[error("File processing failed to write the verbatim export: {0}")]
    Export(#[from] WriteError),
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Corpus directory {0:?} does not exist")]
    DirectoryNotFound(PathBuf),
    #[error("No files in {0:?} matched the pattern {1}")]
    NoMatchingFiles(PathBuf, String),
    #[error("Corpus failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Corpus failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid file pattern: {0}")]
    BadPattern(#[from] regex::Error),
    #[error("Config is invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Corpus error: {0}")]
    CorpusError(#[from] CorpusError),
    #[error("Processor failed while writing the report: {0}")]
    ReportError(#[from] WriteError),
}
