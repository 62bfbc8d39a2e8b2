use std::path::{Path, PathBuf};

use super::aggregate::aggregate;
use super::config::Config;
use super::error::{CorpusError, FileProcessError, ProcessorError};
use super::export::export_record_table;
use super::metrics::FileMetrics;
use super::observer::{Diagnostic, Observer, Stage};
use super::record_file::RecordTable;
use super::report::{ReportEmitter, ReportFiles};
use super::worker_status::WorkerStatus;
use super::year::{YearResolver, YearSlice, YearTable};

/// A file that could not be processed, and why
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// The outcome of a corpus run: the per-year results and the files left out
#[derive(Debug, Clone, Default)]
pub struct CorpusRun {
    pub years: YearTable,
    pub skipped: Vec<SkippedFile>,
}

/// What a complete run did
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub years_processed: usize,
    pub sufficient_channels: usize,
    pub skipped: Vec<SkippedFile>,
    pub report: ReportFiles,
}

type FileOutcome = Result<YearSlice, FileProcessError>;

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Get all of the files in the input directory matching the pattern, sorted by name.
/// Zero-padded indices make this the chronological order.
pub fn find_corpus_files(
    config: &Config,
    resolver: &YearResolver,
) -> Result<Vec<PathBuf>, CorpusError> {
    let parent_path = &config.input_path;
    if !parent_path.is_dir() {
        return Err(CorpusError::DirectoryNotFound(parent_path.clone()));
    }

    let mut file_list: Vec<PathBuf> = Vec::new();
    for item in parent_path.read_dir()? {
        let item_path = item?.path();
        if item_path.is_file() && resolver.matches(&file_name_of(&item_path)) {
            file_list.push(item_path);
        }
    }

    if file_list.is_empty() {
        return Err(CorpusError::NoMatchingFiles(
            parent_path.clone(),
            config.file_pattern.clone(),
        ));
    }

    file_list.sort();
    Ok(file_list)
}

/// Parse one file, reduce it to channel metrics, label it and write its verbatim export
pub fn process_file(
    path: &Path,
    config: &Config,
    resolver: &YearResolver,
    observer: &dyn Observer,
) -> Result<YearSlice, FileProcessError> {
    let table = RecordTable::read(path, config.channel_ceiling, observer)?;
    let metrics = FileMetrics::from_table(&table, config);
    let label = resolver.resolve(path, observer);

    let export_path = config.get_export_file_name(path);
    export_record_table(&table, &export_path)?;
    observer.record(
        Diagnostic::info(
            Stage::Export,
            format!("Wrote verbatim export {}", export_path.to_string_lossy()),
        )
        .with_file(path),
    );

    observer.record(
        Diagnostic::info(
            Stage::Metrics,
            format!(
                "{} rows, {} channels, timestamp: {} -> year {}",
                table.row_count(),
                metrics.channel_count(),
                table.has_timestamp(),
                label
            ),
        )
        .with_file(path),
    );

    Ok(YearSlice {
        label,
        source: path.to_path_buf(),
        metrics,
    })
}

/// Process a subset of the corpus (given as indices into `files`)
fn process_subset(
    subset: &[usize],
    files: &[PathBuf],
    config: &Config,
    resolver: &YearResolver,
    observer: &dyn Observer,
    worker_id: usize,
) -> Vec<(usize, FileOutcome)> {
    let mut outcomes = Vec::with_capacity(subset.len());
    for (done, idx) in subset.iter().enumerate() {
        let path = &files[*idx];
        outcomes.push((*idx, process_file(path, config, resolver, observer)));
        observer.progress(WorkerStatus::new(
            (done + 1) as f32 / subset.len() as f32,
            &file_name_of(path),
            worker_id,
        ));
    }
    outcomes
}

/// Divide the files in to a set of subsets (per thread/worker). There are never more workers
/// than files.
pub fn create_subsets(n_files: usize, n_threads: i32) -> Vec<Vec<usize>> {
    let n_workers = (n_threads.max(1) as usize).min(n_files.max(1));
    let mut subsets: Vec<Vec<usize>> = vec![Vec::new(); n_workers];
    let n_subsets = subsets.len();

    for idx in 0..n_files {
        subsets[idx % n_subsets].push(idx)
    }

    subsets
}

/// The main loop of the corpus stage.
///
/// Finds every matching file in the input directory and processes each one independently. A
/// file that fails is logged and skipped; only directory-level problems abort the run. With
/// `n_threads > 1` the files are spread over scoped worker threads and the results are merged
/// back in file order once every worker is done.
pub fn process_corpus(
    config: &Config,
    observer: &dyn Observer,
) -> Result<CorpusRun, CorpusError> {
    let resolver = YearResolver::new(config)?;
    let files = find_corpus_files(config, &resolver)?;
    observer.record(Diagnostic::info(
        Stage::Corpus,
        format!(
            "Found {} file(s) in {}",
            files.len(),
            config.input_path.to_string_lossy()
        ),
    ));
    std::fs::create_dir_all(config.get_export_directory())?;

    let mut outcomes: Vec<Option<FileOutcome>> = Vec::new();
    outcomes.resize_with(files.len(), || None);

    let subsets = create_subsets(files.len(), config.n_threads);
    if subsets.len() == 1 {
        let finished = process_subset(&subsets[0], &files, config, &resolver, observer, 0);
        for (idx, outcome) in finished {
            outcomes[idx] = Some(outcome);
        }
    } else {
        let files_ref = &files;
        let resolver_ref = &resolver;
        let finished = std::thread::scope(|scope| {
            let handles: Vec<_> = subsets
                .iter()
                .enumerate()
                .map(|(worker_id, subset)| {
                    scope.spawn(move || {
                        process_subset(subset, files_ref, config, resolver_ref, observer, worker_id)
                    })
                })
                .collect();
            let mut finished = Vec::new();
            for handle in handles {
                match handle.join() {
                    Ok(mut result) => finished.append(&mut result),
                    Err(_) => observer.record(Diagnostic::error(
                        Stage::Corpus,
                        "A corpus worker panicked; its unfinished files are skipped",
                    )),
                }
            }
            finished
        });
        for (idx, outcome) in finished {
            outcomes[idx] = Some(outcome);
        }
    }

    let mut run = CorpusRun::default();
    for (path, outcome) in files.iter().zip(outcomes) {
        match outcome {
            Some(Ok(slice)) => {
                let label = slice.label.clone();
                if let Some(old) = run.years.insert(slice) {
                    observer.record(
                        Diagnostic::warning(
                            Stage::Corpus,
                            format!(
                                "Year {label} was already produced by {}; keeping this file",
                                file_name_of(&old.source)
                            ),
                        )
                        .with_file(path),
                    );
                }
            }
            Some(Err(e)) => {
                observer.record(
                    Diagnostic::error(Stage::Corpus, format!("Skipping file: {e}"))
                        .with_file(path),
                );
                run.skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
            None => run.skipped.push(SkippedFile {
                path: path.clone(),
                reason: String::from("worker did not finish"),
            }),
        }
    }

    observer.record(Diagnostic::info(
        Stage::Corpus,
        format!(
            "Processed {} of {} file(s); {} skipped",
            files.len() - run.skipped.len(),
            files.len(),
            run.skipped.len()
        ),
    ));
    Ok(run)
}

/// The full pipeline: corpus, cross-year aggregation, report.
///
/// Validates the config first. Only configuration, directory-level and report I/O problems
/// are errors; bad files are skipped and listed in the summary.
pub fn process(config: &Config, observer: &dyn Observer) -> Result<RunSummary, ProcessorError> {
    config.validate()?;
    let corpus = process_corpus(config, observer)?;

    let aggregates = aggregate(&corpus.years, config);
    observer.record(Diagnostic::info(
        Stage::Aggregate,
        format!(
            "{} of {} channel(s) have at least {} years of data; {} ranked",
            aggregates.sufficient.len(),
            aggregates.all.len(),
            config.sufficiency_threshold,
            aggregates.ranked.len()
        ),
    ));

    let report = ReportEmitter::new(config).emit(&corpus.years, &aggregates, observer)?;

    Ok(RunSummary {
        years_processed: aggregates.years_processed,
        sufficient_channels: aggregates.sufficient.len(),
        skipped: corpus.skipped,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordFileError;
    use crate::observer::{MemoryObserver, Severity};
    use crate::outliers::OutlierConfig;
    use crate::year::YearLabel;
    use tempfile::TempDir;

    fn setup(files: &[(&str, &str)]) -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("raw");
        std::fs::create_dir(&input).unwrap();
        for (name, contents) in files {
            std::fs::write(input.join(name), contents).unwrap();
        }
        let mut config = Config::default();
        config.input_path = input;
        config.output_path = dir.path().join("out");
        (dir, config)
    }

    fn full_mean(run: &CorpusRun, year: i32) -> Option<f64> {
        run.years
            .get(&YearLabel::Calendar(year))
            .and_then(|s| s.metrics.get(0))
            .and_then(|m| m.full_mean)
    }

    #[test]
    fn test_three_file_corpus() {
        let (_dir, config) = setup(&[
            ("P_Y03.txt", "7\n8\n9\n"),
            ("P_Y01.txt", "1\n2\n3\n"),
            ("P_Y02.txt", "4\n5\n6\n"),
            ("notes.txt", "not a sensor file"),
        ]);
        let observer = MemoryObserver::new();
        let run = process_corpus(&config, &observer).unwrap();

        assert!(run.skipped.is_empty());
        let labels: Vec<String> = run.years.labels().iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, vec!["1995", "1996", "1997"]);
        assert_eq!(full_mean(&run, 1995), Some(2.0));
        assert_eq!(full_mean(&run, 1996), Some(5.0));
        assert_eq!(full_mean(&run, 1997), Some(8.0));
        for slice in run.years.iter() {
            let m = slice.metrics.get(0).unwrap();
            assert_eq!(m.lead_mean, m.full_mean);
        }
        for name in ["P_Y01.xlsx", "P_Y02.xlsx", "P_Y03.xlsx"] {
            assert!(config.output_path.join(name).exists());
        }
    }

    #[test]
    fn test_bad_file_is_skipped_not_fatal() {
        let (_dir, config) = setup(&[
            ("P_Y01.txt", "1\n2\n3\n"),
            ("P_Y02.txt", ""),
            ("P_Y03.txt", "7\n8\n9\n"),
        ]);
        let observer = MemoryObserver::new();
        let run = process_corpus(&config, &observer).unwrap();
        assert_eq!(run.years.len(), 2);
        assert_eq!(run.skipped.len(), 1);
        assert!(run.skipped[0].path.ends_with("P_Y02.txt"));
        let errors: Vec<_> = observer
            .entries()
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].stage, Stage::Corpus);
        assert!(errors[0].file.as_ref().unwrap().ends_with("P_Y02.txt"));
    }

    #[test]
    fn test_empty_file_error_surfaces_from_process_file() {
        let (_dir, config) = setup(&[("P_Y01.txt", "")]);
        let resolver = YearResolver::new(&config).unwrap();
        let err = process_file(
            &config.input_path.join("P_Y01.txt"),
            &config,
            &resolver,
            &MemoryObserver::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FileProcessError::RecordFile(RecordFileError::EmptyFile(_))
        ));
    }

    #[test]
    fn test_directory_level_failures() {
        let (_dir, mut config) = setup(&[("readme.md", "hello")]);
        let observer = MemoryObserver::new();
        assert!(matches!(
            process_corpus(&config, &observer),
            Err(CorpusError::NoMatchingFiles(_, _))
        ));
        config.input_path = config.input_path.join("missing");
        assert!(matches!(
            process_corpus(&config, &observer),
            Err(CorpusError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_threaded_run_matches_sequential() {
        let files: Vec<(String, String)> = (1..=7)
            .map(|i| (format!("P_Y{i:02}.txt"), format!("{i}\n{}\n", i * 2)))
            .collect();
        let borrowed: Vec<(&str, &str)> = files
            .iter()
            .map(|(n, c)| (n.as_str(), c.as_str()))
            .collect();
        let (_dir, mut config) = setup(&borrowed);
        let sequential = process_corpus(&config, &MemoryObserver::new()).unwrap();
        config.n_threads = 3;
        let threaded = process_corpus(&config, &MemoryObserver::new()).unwrap();
        assert_eq!(sequential.years.labels(), threaded.years.labels());
        for (a, b) in sequential.years.iter().zip(threaded.years.iter()) {
            assert_eq!(a.metrics, b.metrics);
        }
    }

    #[test]
    fn test_threaded_failures_do_not_cancel_other_workers() {
        let files: Vec<(String, String)> = (1..=7)
            .filter(|i| *i != 5)
            .map(|i| {
                let contents = if i == 3 {
                    String::new()
                } else {
                    format!("{i}\n{}\n", i * 2)
                };
                (format!("P_Y{i:02}.txt"), contents)
            })
            .collect();
        let borrowed: Vec<(&str, &str)> = files
            .iter()
            .map(|(n, c)| (n.as_str(), c.as_str()))
            .collect();
        let (_dir, mut config) = setup(&borrowed);
        std::fs::write(config.input_path.join("P_Y05.txt"), [0xff, 0xfe, 0x00, 0x31]).unwrap();
        config.n_threads = 3;

        let observer = MemoryObserver::new();
        let run = process_corpus(&config, &observer).unwrap();

        let skipped: Vec<String> = run.skipped.iter().map(|s| file_name_of(&s.path)).collect();
        assert_eq!(skipped, vec!["P_Y03.txt", "P_Y05.txt"]);
        let labels: Vec<String> = run.years.labels().iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, vec!["1995", "1996", "1998", "2000", "2001"]);
        assert_eq!(full_mean(&run, 2001), Some(10.5));
        assert_eq!(observer.count(Severity::Error), 2);
    }

    #[derive(Default)]
    struct ProgressLog {
        statuses: std::sync::Mutex<Vec<WorkerStatus>>,
    }

    impl Observer for ProgressLog {
        fn record(&self, _diagnostic: Diagnostic) {}

        fn progress(&self, status: WorkerStatus) {
            self.statuses.lock().unwrap().push(status);
        }
    }

    #[test]
    fn test_workers_report_fractional_progress() {
        let (_dir, mut config) = setup(&[
            ("P_Y01.txt", "1\n"),
            ("P_Y02.txt", "2\n"),
            ("P_Y03.txt", "3\n"),
        ]);
        config.n_threads = 2;
        let log = ProgressLog::default();
        process_corpus(&config, &log).unwrap();

        let statuses = log.statuses.lock().unwrap();
        assert_eq!(statuses.len(), 3);
        // Worker 0 holds files 0 and 2, worker 1 holds file 1
        let worker0: Vec<f32> = statuses
            .iter()
            .filter(|s| s.worker_id == 0)
            .map(|s| s.progress)
            .collect();
        assert_eq!(worker0, vec![0.5, 1.0]);
        assert!(statuses
            .iter()
            .any(|s| s.worker_id == 1 && s.progress == 1.0 && s.file_name == "P_Y02.txt"));
    }

    #[test]
    fn test_full_pipeline() {
        let (_dir, config) = setup(&[
            ("P_Y01.txt", "1\n2\n3\n"),
            ("P_Y02.txt", "4\n5\n6\n"),
            ("P_Y03.txt", "7\n8\n9\n"),
            ("P_Y04.txt", "0 0\n"),
        ]);
        let summary = process(&config, &MemoryObserver::new()).unwrap();
        assert_eq!(summary.years_processed, 4);
        // Three years of data is below the sufficiency threshold
        assert_eq!(summary.sufficient_channels, 0);
        assert!(summary.skipped.is_empty());
        assert!(summary.report.workbook.exists());
        assert_eq!(summary.report.flat_files.len(), 4);

        let all = std::fs::read_to_string(config.output_path.join("Seatek_Summary_all.csv"))
            .unwrap();
        let channel01 = all.lines().nth(1).unwrap();
        let fields: Vec<&str> = channel01.split(',').collect();
        // full_mean.mean is column 1 + 2 * 8, full_mean.count six further
        assert_eq!(fields[0], "Channel01");
        assert_eq!(fields[17], "5");
        assert_eq!(fields[23], "3");
        assert_eq!(fields[fields.len() - 1], "75");
    }

    #[test]
    fn test_full_pipeline_with_corrections() {
        let (_dir, mut config) = setup(&[("P_Y01.txt", "1\n1\n"), ("P_Y02.txt", "3\n3\n")]);
        config.outliers = Some(OutlierConfig::default());
        let summary = process(&config, &MemoryObserver::new()).unwrap();

        let corrected = config.output_path.join("Seatek_Summary_1996_corrected.xlsx");
        assert_eq!(summary.report.corrected_files, vec![corrected.clone()]);
        assert!(corrected.exists());
        assert_eq!(summary.report.flat_files.len(), 6);
        let corrections = std::fs::read_to_string(
            config.output_path.join("Seatek_Summary_corrections.csv"),
        )
        .unwrap();
        let row = corrections.lines().nth(1).unwrap();
        assert!(row.starts_with("1996-1995,Channel01,2,-2,"));
    }

    #[test]
    fn test_create_subsets_round_robin() {
        let subsets = create_subsets(5, 2);
        assert_eq!(subsets, vec![vec![0, 2, 4], vec![1, 3]]);
        assert_eq!(create_subsets(2, 4), vec![vec![0], vec![1]]);
        assert_eq!(create_subsets(3, 1_000_000).len(), 3);
        assert_eq!(create_subsets(0, 4), vec![Vec::<usize>::new()]);
    }
}
