use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use libseatek_summary::config::Config;
use libseatek_summary::error::ConfigError;
use libseatek_summary::observer::{Diagnostic, LogObserver, Observer, Severity};
use libseatek_summary::process::process;
use libseatek_summary::worker_status::WorkerStatus;

/// Logs to the run log and mirrors problems plus per-worker progress onto the terminal
struct ProgressObserver {
    pb_manager: MultiProgress,
    bars: Mutex<Vec<ProgressBar>>,
    inner: LogObserver,
}

impl ProgressObserver {
    fn new(pb_manager: MultiProgress) -> Self {
        Self {
            pb_manager,
            bars: Mutex::new(Vec::new()),
            inner: LogObserver,
        }
    }

    fn finish(&self) {
        if let Ok(bars) = self.bars.lock() {
            for bar in bars.iter() {
                bar.finish_and_clear();
            }
        }
    }
}

impl Observer for ProgressObserver {
    fn record(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => log::error!("{diagnostic}"),
            Severity::Info => (),
        }
        self.inner.record(diagnostic);
    }

    fn progress(&self, status: WorkerStatus) {
        let mut bars = match self.bars.lock() {
            Ok(bars) => bars,
            Err(e) => {
                log::error!("{e}");
                return;
            }
        };
        while bars.len() <= status.worker_id {
            let bar = self.pb_manager.add(ProgressBar::new(100));
            bar.set_style(
                ProgressStyle::with_template("worker {prefix} [{bar:40}] {pos}% {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_prefix(bars.len().to_string());
            bars.push(bar);
        }
        let bar = &bars[status.worker_id];
        bar.set_position((status.progress * 100.0) as u64);
        bar.set_message(status.file_name);
    }
}

fn make_template_config(path: &Path) -> Result<(), ConfigError> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

/// Send spdlog output to a log file in the output directory, appending across runs
fn init_run_log(config: &Config) -> spdlog::Result<()> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(config.get_log_file_name())
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(false)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

fn main() {
    // Create a cli
    let matches = Command::new("seatek_summary_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match make_template_config(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(1);
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Input Path: {}", config.input_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!(
        "Export Path: {}",
        config.get_export_directory().to_string_lossy()
    );
    log::info!(
        "Year Base: {} Indices: {}..={}",
        config.year_base,
        config.first_index,
        config.last_index
    );
    log::info!("Number of Threads: {}", config.n_threads);

    if let Err(e) = std::fs::create_dir_all(&config.output_path) {
        log::error!("Could not create output directory: {e}");
        std::process::exit(1);
    }
    if let Err(e) = init_run_log(&config) {
        log::error!("Could not open run log: {e}");
        std::process::exit(1);
    }
    log::info!(
        "Run log at {}",
        config.get_log_file_name().to_string_lossy()
    );

    // Progress bars are created per worker as they report
    let observer = ProgressObserver::new(pb_manager.clone());

    let result = process(&config, &observer);
    observer.finish();

    match result {
        Ok(summary) => {
            log::info!("Years processed: {}", summary.years_processed);
            log::info!(
                "Channels with sufficient data: {}",
                summary.sufficient_channels
            );
            if !summary.skipped.is_empty() {
                log::warn!("Skipped {} file(s):", summary.skipped.len());
                for skipped in summary.skipped.iter() {
                    log::warn!("  {}: {}", skipped.path.to_string_lossy(), skipped.reason);
                }
            }
            log::info!(
                "Workbook: {}",
                summary.report.workbook.to_string_lossy()
            );
            for flat in summary.report.flat_files.iter() {
                log::info!("Flat file: {}", flat.to_string_lossy());
            }
            for corrected in summary.report.corrected_files.iter() {
                log::info!("Corrected workbook: {}", corrected.to_string_lossy());
            }
        }
        Err(e) => {
            log::error!("Summary failed with error: {e}");
            spdlog::default_logger().flush();
            std::process::exit(1);
        }
    }

    spdlog::default_logger().flush();
    log::info!("Done.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;

    #[test]
    fn test_worker_progress_sets_bar_position() {
        let observer =
            ProgressObserver::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()));
        observer.progress(WorkerStatus::new(0.5, "P_Y03.txt", 1));
        observer.progress(WorkerStatus::new(0.25, "P_Y01.txt", 0));
        observer.progress(WorkerStatus::new(1.0, "P_Y05.txt", 1));

        let bars = observer.bars.lock().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].position(), 25);
        assert_eq!(bars[1].position(), 100);
        assert_eq!(bars[1].message(), "P_Y05.txt");
    }
}
