//! Source Code Metrics Collector
//!
//! Walks a source tree, analyzes every recognised file on a pool of worker
//! threads, and reports per-language line counts (code, comment, blank),
//! character counts, function and class declarations, and the largest files.
//!
//! Classification is heuristic and line-oriented: each line is matched against
//! the language's regular expressions on its own, without tracking block
//! comments or strings across lines.

mod aggregate;
mod analyzer;
mod classify;
mod error;
mod language;
mod progress;
mod ranking;
mod report;
mod walk;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{ArgAction, Parser, ValueEnum};
use colored::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::aggregate::{Aggregator, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::error::{Error, Result};
use crate::language::LanguageRegistry;
use crate::progress::PerformanceMetrics;
use crate::report::{
    build_json_report, build_language_list, build_table_report, path_column_width, ReportOptions,
};
use crate::walk::{PathFilter, Walker, DEFAULT_MAX_DEPTH};

const LOG_ENV_VAR: &str = "CODEWALK_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Per-language source code metrics, collected concurrently",
    long_about = "Counts lines of code, comments and blank lines, characters, functions and classes per language across a source tree, and ranks the largest files. Set CODEWALK_LOG to control log output (e.g. CODEWALK_LOG=debug)."
)]
struct Args {
    #[arg(default_value = ".")]
    path: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Do not print progress while analyzing
    #[arg(long)]
    no_progress: bool,

    /// Show the top N files by lines (0 disables)
    #[arg(short, long, default_value_t = 10)]
    top: usize,

    /// List statistics for every file
    #[arg(long)]
    detailed: bool,

    /// Break results down by directory
    #[arg(long)]
    by_dir: bool,

    /// Glob patterns to exclude, comma-separated; added to the built-in excludes
    #[arg(short, long, value_delimiter = ',', action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Only analyze files whose name matches one of these glob patterns
    #[arg(short, long, value_delimiter = ',', action = ArgAction::Append)]
    include: Vec<String>,

    #[arg(short = 'j', long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_size: usize,

    #[arg(short = 'd', long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// List supported languages and exit
    #[arg(short, long)]
    languages: bool,

    #[arg(short, long)]
    verbose: bool,
}

/// Validated settings for one run.
#[derive(Debug)]
struct Config {
    root: PathBuf,
    format: OutputFormat,
    progress: bool,
    top: usize,
    detailed: bool,
    by_dir: bool,
    filter: PathFilter,
    workers: usize,
    queue_capacity: usize,
    max_depth: usize,
}

impl Config {
    fn from_args(args: &Args) -> Result<Self> {
        Ok(Config {
            root: PathBuf::from(&args.path),
            format: args.format,
            progress: !args.no_progress && args.format == OutputFormat::Table,
            top: args.top,
            detailed: args.detailed,
            by_dir: args.by_dir,
            filter: PathFilter::new(&args.exclude, &args.include)?,
            workers: args.workers,
            queue_capacity: args.queue_size,
            max_depth: args.max_depth,
        })
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(&args) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {}", "Error".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<String> {
    let registry = LanguageRegistry::builtin()?;
    debug!("loaded {} language profiles", registry.len());
    if args.languages {
        return Ok(build_language_list(&registry));
    }

    let config = Config::from_args(args)?;
    match fs::metadata(&config.root) {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(Error::MissingRoot(config.root));
        }
        Err(err) => return Err(Error::io(&config.root, err)),
    }

    if config.progress {
        eprintln!(
            "{} {}",
            env!("CARGO_PKG_NAME").bright_cyan().bold(),
            format!("v{}", env!("CARGO_PKG_VERSION")).bright_yellow()
        );
        eprintln!(
            "{}",
            format!("Analyzing codebase at: {}", config.root.display()).bright_black()
        );
    }
    info!("analyzing {}", config.root.display());

    let mut metrics = PerformanceMetrics::new(config.progress);
    let walker = Walker::new(&registry, &config.filter).max_depth(config.max_depth);
    let (aggregation, walk_errors) = Aggregator::new(&registry)
        .workers(config.workers)
        .queue_capacity(config.queue_capacity)
        .run_with_progress(
            |sink| walker.walk(&config.root, sink),
            |record| metrics.record(record),
        );
    metrics.print_final_stats();
    info!(
        "merged {} files ({} lines), {} failures, {} walk errors",
        metrics.files_processed(),
        metrics.lines_processed(),
        aggregation.failures.len(),
        walk_errors.len()
    );

    let options = ReportOptions {
        top: config.top,
        detailed: config.detailed,
        by_dir: config.by_dir,
        path_width: path_column_width(),
        ..ReportOptions::new(&config.root)
    };
    match config.format {
        OutputFormat::Table => Ok(build_table_report(
            &aggregation,
            &walk_errors,
            &options,
            Local::now(),
        )),
        OutputFormat::Json => build_json_report(&aggregation, &walk_errors, &options, Local::now()),
    }
}
