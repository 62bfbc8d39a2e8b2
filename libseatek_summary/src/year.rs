use regex::Regex;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use super::config::Config;
use super::constants::INDEX_GROUP;
use super::error::ConfigError;
use super::metrics::FileMetrics;
use super::observer::{Diagnostic, Observer, Stage};

/// The label a file's results are keyed by: a calendar year when the file index is in range,
/// otherwise the raw file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum YearLabel {
    Calendar(i32),
    Raw(String),
}

impl Display for YearLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calendar(year) => write!(f, "{year:04}"),
            Self::Raw(name) => write!(f, "{name}"),
        }
    }
}

/// Maps year-coded file names (`<PREFIX>_Y<NN>.txt`) to year labels
#[derive(Debug, Clone)]
pub struct YearResolver {
    pattern: Regex,
    year_base: i32,
    first_index: u32,
    last_index: u32,
}

impl YearResolver {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: config.compile_pattern()?,
            year_base: config.year_base,
            first_index: config.first_index,
            last_index: config.last_index,
        })
    }

    /// Does the file name follow the configured pattern
    pub fn matches(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }

    /// The numeric file index embedded in the name, if there is one
    pub fn file_index(&self, file_name: &str) -> Option<u32> {
        self.pattern
            .captures(file_name)?
            .name(INDEX_GROUP)?
            .as_str()
            .parse()
            .ok()
    }

    /// Resolve the label of a file. Indices outside the supported range fall back to the file
    /// name and are reported as a warning.
    pub fn resolve(&self, path: &Path, observer: &dyn Observer) -> YearLabel {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.file_index(&file_name) {
            Some(index) if (self.first_index..=self.last_index).contains(&index) => {
                YearLabel::Calendar(self.year_base + index as i32)
            }
            index => {
                let reason = match index {
                    Some(i) => format!(
                        "File index {i} is outside {}..={}",
                        self.first_index, self.last_index
                    ),
                    None => String::from("File name carries no year index"),
                };
                observer.record(
                    Diagnostic::warning(Stage::Year, format!("{reason}; labeling by file name"))
                        .with_file(path),
                );
                YearLabel::Raw(file_name)
            }
        }
    }
}

/// The metrics of one processed file, tagged with its year label
#[derive(Debug, Clone)]
pub struct YearSlice {
    pub label: YearLabel,
    pub source: PathBuf,
    pub metrics: FileMetrics,
}

/// Year-keyed results of a corpus run, in processing order
#[derive(Debug, Clone, Default)]
pub struct YearTable {
    slices: Vec<YearSlice>,
}

impl YearTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slice. A slice with an already present label replaces the old one in place and
    /// the old one is returned.
    pub fn insert(&mut self, slice: YearSlice) -> Option<YearSlice> {
        match self.slices.iter_mut().find(|s| s.label == slice.label) {
            Some(existing) => Some(std::mem::replace(existing, slice)),
            None => {
                self.slices.push(slice);
                None
            }
        }
    }

    pub fn get(&self, label: &YearLabel) -> Option<&YearSlice> {
        self.slices.iter().find(|s| &s.label == label)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, YearSlice> {
        self.slices.iter()
    }

    pub fn labels(&self) -> Vec<&YearLabel> {
        self.slices.iter().map(|s| &s.label).collect()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

impl<'a> IntoIterator for &'a YearTable {
    type Item = &'a YearSlice;
    type IntoIter = std::slice::Iter<'a, YearSlice>;

    fn into_iter(self) -> Self::IntoIter {
        self.slices.iter()
    }
}
