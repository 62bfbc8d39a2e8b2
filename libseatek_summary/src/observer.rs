//! Diagnostics sink injected into every pipeline stage.
//!
//! Stages never log directly; they hand a [`Diagnostic`] to an [`Observer`]. The
//! [`LogObserver`] forwards to spdlog (and from there to whatever sinks the application set
//! up), while the [`MemoryObserver`] keeps everything in memory for tests and run summaries.
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// The pipeline stage a diagnostic originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Metrics,
    Year,
    Export,
    Corpus,
    Aggregate,
    Report,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::Metrics => "metrics",
            Self::Year => "year",
            Self::Export => "export",
            Self::Corpus => "corpus",
            Self::Aggregate => "aggregate",
            Self::Report => "report",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub file: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity,
            stage,
            file: None,
            message: message.into(),
        }
    }

    pub fn info(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, stage, message)
    }

    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, stage, message)
    }

    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, stage, message)
    }

    /// Attach the file the diagnostic is about
    pub fn with_file(mut self, path: &Path) -> Self {
        self.file = Some(path.to_path_buf());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = self
            .file
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("-"));
        write!(f, "stage={} file={} {}", self.stage, file, self.message)
    }
}

/// Receives diagnostics (and optionally progress) from the pipeline.
///
/// Observers are shared between corpus workers, so they must be `Sync`.
pub trait Observer: Sync {
    fn record(&self, diagnostic: Diagnostic);

    fn progress(&self, _status: WorkerStatus) {}
}

/// Forwards every diagnostic to the spdlog default logger
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn record(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => spdlog::info!("{diagnostic}"),
            Severity::Warning => spdlog::warn!("{diagnostic}"),
            Severity::Error => spdlog::error!("{diagnostic}"),
        }
    }
}

/// Collects diagnostics in memory, in the order they were recorded
#[derive(Debug, Default)]
pub struct MemoryObserver {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// All diagnostics from one stage
    pub fn from_stage(&self, stage: Stage) -> Vec<Diagnostic> {
        self.entries()
            .into_iter()
            .filter(|d| d.stage == stage)
            .collect()
    }
}

impl Observer for MemoryObserver {
    fn record(&self, diagnostic: Diagnostic) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_structured() {
        let diag = Diagnostic::warning(Stage::Parse, "only 5 columns")
            .with_file(Path::new("/raw/S26_Y01.txt"));
        assert_eq!(
            diag.to_string(),
            "stage=parse file=S26_Y01.txt only 5 columns"
        );
        let diag = Diagnostic::info(Stage::Aggregate, "done");
        assert_eq!(diag.to_string(), "stage=aggregate file=- done");
    }

    #[test]
    fn test_memory_observer_counts() {
        let observer = MemoryObserver::new();
        observer.record(Diagnostic::info(Stage::Corpus, "a"));
        observer.record(Diagnostic::error(Stage::Parse, "b"));
        observer.record(Diagnostic::error(Stage::Export, "c"));
        assert_eq!(observer.count(Severity::Error), 2);
        assert_eq!(observer.from_stage(Stage::Parse).len(), 1);
        assert_eq!(observer.entries()[0].message, "a");
    }
}
