// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::adapters::AdapterSet;
use crate::app_config::{Config, OutputMode};
use crate::file_utils::FileManager;
use crate::pipeline::{JobKind, PipelineOrchestrator};
use crate::prompt_parser::PromptBlockParser;
use crate::script_parser::ScriptParser;

mod adapters;
mod app_config;
mod errors;
mod file_utils;
mod pipeline;
mod prompt_parser;
mod retry;
mod script_parser;

/// CLI Wrapper for OutputMode to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliOutputMode {
    Bundle,
    Render,
}

impl From<CliOutputMode> for OutputMode {
    fn from(cli_mode: CliOutputMode) -> Self {
        match cli_mode {
            CliOutputMode::Bundle => OutputMode::Bundle,
            CliOutputMode::Render => OutputMode::Render,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// ScriptReel - dialogue scripts to synchronized media bundles
///
/// Turns a two-speaker dialogue script into per-line narration audio,
/// per-scene images, background music sized to the narration runtime, and
/// an editing-ready timeline.
#[derive(Parser, Debug)]
#[command(name = "scriptreel")]
#[command(version = "0.1.0")]
#[command(about = "Dialogue script to synchronized media bundle")]
#[command(long_about = "ScriptReel parses a dialogue script and a timestamped image-prompt block,
generates narration audio, scene images, background music and optional stock
footage through external services, and writes a time-indexed bundle.

EXAMPLES:
    scriptreel script.txt prompts.txt              # Generate with default config
    scriptreel script.txt prompts.txt -o renders   # Write runs under ./renders
    scriptreel script.txt prompts.txt -m render    # Emit a render manifest instead of a bundle
    scriptreel script.txt                          # Narration and BGM only (no prompt block)
    scriptreel --log-level debug script.txt prompts.txt

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default
    one will be created automatically; API keys must then be filled in before
    the next run.

OUTPUT:
    Each run writes into a fresh timestamped directory under the output
    directory, with audio/, images/, bgm/ and stock/ subdirectories plus
    timeline.csv (bundle mode) or render_manifest.json (render mode).")]
struct CommandLineOptions {
    /// Dialogue script file to process
    #[arg(value_name = "SCRIPT_PATH")]
    script_path: PathBuf,

    /// Timestamped image-prompt file (omit to skip scene images)
    #[arg(value_name = "PROMPTS_PATH")]
    prompts_path: Option<PathBuf>,

    /// Base output directory; each run gets a timestamped subdirectory
    #[arg(short, long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Output mode
    #[arg(short, long, value_enum)]
    mode: Option<CliOutputMode>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let mut stderr = std::io::stderr();

            let _ = match record.level() {
                Level::Error => {
                    writeln!(stderr, "\x1B[1;31m{} ERROR {}\x1B[0m", now, record.args())
                }
                Level::Warn => {
                    writeln!(stderr, "\x1B[1;33m{} WARN  {}\x1B[0m", now, record.args())
                }
                Level::Info => {
                    writeln!(stderr, "\x1B[1;32m{} INFO  {}\x1B[0m", now, record.args())
                }
                Level::Debug => {
                    writeln!(stderr, "\x1B[1;36m{} DEBUG {}\x1B[0m", now, record.args())
                }
                Level::Trace => {
                    writeln!(stderr, "\x1B[1;35m{} TRACE {}\x1B[0m", now, record.args())
                }
            };
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

// @struct: One progress bar per generation stage, fed by the orchestrator
struct StageBars {
    bars: HashMap<JobKind, ProgressBar>,
}

impl StageBars {
    fn new(multi: &MultiProgress, totals: &[(JobKind, usize)]) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let mut bars = HashMap::new();
        for (kind, total) in totals {
            if *total == 0 {
                continue;
            }
            let bar = multi.add(ProgressBar::new(*total as u64));
            bar.set_style(style.clone().progress_chars("█▓▒░"));
            bar.set_message(kind.to_string());
            bars.insert(*kind, bar);
        }
        Self { bars }
    }

    fn update(&self, kind: JobKind, completed: usize) {
        if let Some(bar) = self.bars.get(&kind) {
            bar.set_position(completed as u64);
            if completed as u64 >= bar.length().unwrap_or(0) {
                bar.finish();
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    let options = CommandLineOptions::parse();

    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level_filter(&config_log_level));
    }

    // Load or create configuration
    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        config
            .save(config_path)
            .with_context(|| format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    // Override config with CLI options if provided
    if let Some(mode) = &options.mode {
        config.output_mode = mode.clone().into();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if options.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }

    // Parse inputs up front; a malformed line is a whole-run error
    let script_text = std::fs::read_to_string(&options.script_path)
        .with_context(|| format!("Failed to read script file: {:?}", options.script_path))?;
    let utterances = ScriptParser::parse(&script_text)
        .with_context(|| format!("Failed to parse script file: {:?}", options.script_path))?;
    if utterances.is_empty() {
        return Err(anyhow!("Script file contains no dialogue lines: {:?}", options.script_path));
    }

    let scenes = match &options.prompts_path {
        Some(path) => {
            let prompt_text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read prompt file: {:?}", path))?;
            PromptBlockParser::parse(&prompt_text)
                .with_context(|| format!("Failed to parse prompt file: {:?}", path))?
        }
        None => {
            if config.image.enabled {
                warn!("No prompt file given, skipping the image stage");
                config.image.enabled = false;
            }
            Vec::new()
        }
    };

    info!("Parsed {} dialogue lines and {} scene prompts", utterances.len(), scenes.len());

    let run_dir = FileManager::timestamped_run_dir(&options.output_dir);

    let multi_progress = MultiProgress::new();
    let bars = Arc::new(StageBars::new(
        &multi_progress,
        &[
            (JobKind::Audio, utterances.len()),
            (JobKind::Image, if config.image.enabled { scenes.len() } else { 0 }),
            (JobKind::Stock, if config.stock.enabled { config.stock.units.len() } else { 0 }),
            (JobKind::Bgm, usize::from(config.bgm.enabled)),
        ],
    ));
    let progress_bars = bars.clone();

    let adapters = AdapterSet::from_config(&config);
    let orchestrator = PipelineOrchestrator::new(config, adapters)
        .with_progress(Arc::new(move |kind, completed, _total| {
            progress_bars.update(kind, completed);
        }));

    // Ctrl-C stops dispatch of new jobs; in-flight jobs finish and the
    // partial bundle stays usable
    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested, finishing in-flight jobs");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let outcome = orchestrator.run(&utterances, &scenes, &run_dir).await?;

    info!("Artifacts written to {:?}", outcome.run_dir);
    if outcome.all_ok {
        Ok(())
    } else {
        for unit in &outcome.failed_units {
            warn!("Failed unit: {} {} ({})", unit.kind, unit.sequence_index, unit.error);
        }
        Err(anyhow!("{} unit(s) did not complete; see timeline for details", {
            let (_, failed, skipped) = outcome.timeline.status_counts();
            failed + skipped
        }))
    }
}
