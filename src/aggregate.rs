//! Fan-out/fan-in aggregation of file statistics.
//!
//! A producer thread feeds paths into a bounded queue, a fixed pool of worker
//! threads analyzes them. The per-language map is owned by the calling thread,
//! which merges each finished file as it arrives on the outcome channel.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{bounded, Sender};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analyzer::{analyze_file, Analysis, FileFailure, FileRecord};
use crate::language::LanguageRegistry;

pub const DEFAULT_WORKERS: usize = 20;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Running sums for one language within a single run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LanguageAggregate {
    #[serde(skip)]
    pub language: String,
    pub files: u64,
    pub lines: u64,
    pub code_lines: u64,
    pub comment_lines: u64,
    pub blank_lines: u64,
    pub characters: u64,
    pub functions: u64,
    pub classes: u64,
    pub size: u64,
    /// Contributing files in arrival order, which varies between runs.
    #[serde(skip)]
    pub records: Vec<FileRecord>,
}

impl LanguageAggregate {
    pub fn new(language: impl Into<String>) -> Self {
        LanguageAggregate {
            language: language.into(),
            ..LanguageAggregate::default()
        }
    }

    pub fn add(&mut self, record: FileRecord) {
        self.files += 1;
        self.lines += record.lines;
        self.code_lines += record.code_lines;
        self.comment_lines += record.comment_lines;
        self.blank_lines += record.blank_lines;
        self.characters += record.characters;
        self.functions += record.functions;
        self.classes += record.classes;
        self.size += record.size;
        self.records.push(record);
    }
}

/// Element-wise sum over any set of aggregates or records. Computed on demand
/// by renderers; the aggregator never stores one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub files: u64,
    pub lines: u64,
    pub code_lines: u64,
    pub comment_lines: u64,
    pub blank_lines: u64,
    pub characters: u64,
    pub functions: u64,
    pub classes: u64,
    pub size: u64,
}

impl Totals {
    pub fn sum<'a>(aggregates: impl IntoIterator<Item = &'a LanguageAggregate>) -> Self {
        aggregates
            .into_iter()
            .fold(Totals::default(), |mut totals, agg| {
                totals.files += agg.files;
                totals.lines += agg.lines;
                totals.code_lines += agg.code_lines;
                totals.comment_lines += agg.comment_lines;
                totals.blank_lines += agg.blank_lines;
                totals.characters += agg.characters;
                totals.functions += agg.functions;
                totals.classes += agg.classes;
                totals.size += agg.size;
                totals
            })
    }

    pub fn add_record(&mut self, record: &FileRecord) {
        self.files += 1;
        self.lines += record.lines;
        self.code_lines += record.code_lines;
        self.comment_lines += record.comment_lines;
        self.blank_lines += record.blank_lines;
        self.characters += record.characters;
        self.functions += record.functions;
        self.classes += record.classes;
        self.size += record.size;
    }

    pub fn code_ratio(&self) -> f64 {
        if self.lines == 0 {
            0.0
        } else {
            self.code_lines as f64 / self.lines as f64 * 100.0
        }
    }

    pub fn avg_lines_per_function(&self) -> Option<f64> {
        (self.functions > 0).then(|| self.code_lines as f64 / self.functions as f64)
    }
}

/// The completed result of one run.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub languages: BTreeMap<String, LanguageAggregate>,
    /// Files that failed to open or read. They are still counted in `languages`.
    pub failures: Vec<FileFailure>,
    /// Paths whose name resolved to no language.
    pub skipped: u64,
}

impl Aggregation {
    pub fn totals(&self) -> Totals {
        Totals::sum(self.languages.values())
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.languages.values().flat_map(|agg| agg.records.iter())
    }

    fn merge(&mut self, outcome: Outcome<'_>) {
        match outcome {
            Outcome::Skipped(path) => {
                debug!("no language for {}", path.display());
                self.skipped += 1;
            }
            Outcome::Analyzed { language, analysis } => {
                if let Some(failure) = analysis.failure {
                    warn!(
                        "failed to {} {}: {}",
                        failure.kind.as_str(),
                        failure.path.display(),
                        failure.error
                    );
                    self.failures.push(failure);
                }
                self.languages
                    .entry(language.to_string())
                    .or_insert_with(|| LanguageAggregate::new(language))
                    .add(analysis.record);
            }
        }
    }
}

/// Sending half of the path queue, lent to the producer for the duration of a run.
pub struct PathSink {
    tx: Sender<PathBuf>,
}

impl PathSink {
    /// Queue a path, blocking while the queue is full. Returns `false` if no
    /// worker is left to receive it.
    pub fn submit(&self, path: impl Into<PathBuf>) -> bool {
        self.tx.send(path.into()).is_ok()
    }
}

enum Outcome<'r> {
    Skipped(PathBuf),
    Analyzed {
        language: &'r str,
        analysis: Analysis,
    },
}

pub struct Aggregator<'r> {
    registry: &'r LanguageRegistry,
    workers: usize,
    queue_capacity: usize,
}

impl<'r> Aggregator<'r> {
    pub fn new(registry: &'r LanguageRegistry) -> Self {
        Aggregator {
            registry,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    #[cfg(test)]
    pub fn run_paths<I>(&self, paths: I) -> Aggregation
    where
        I: IntoIterator<Item = PathBuf>,
        I::IntoIter: Send,
    {
        let paths = paths.into_iter();
        let (aggregation, ()) = self.run(move |sink| {
            for path in paths {
                if !sink.submit(path) {
                    break;
                }
            }
        });
        aggregation
    }

    #[cfg(test)]
    pub fn run<F, R>(&self, produce: F) -> (Aggregation, R)
    where
        F: FnOnce(&PathSink) -> R + Send,
        R: Send,
    {
        self.run_with_progress(produce, |_| {})
    }

    /// Run `produce` on its own thread and analyze every path it submits.
    ///
    /// The queue closes when `produce` returns, and this call returns only
    /// after every submitted path has been merged. `on_record` is called on
    /// the merging thread once per merged file.
    pub fn run_with_progress<F, R, P>(&self, produce: F, mut on_record: P) -> (Aggregation, R)
    where
        F: FnOnce(&PathSink) -> R + Send,
        R: Send,
        P: FnMut(&FileRecord),
    {
        info!(
            "starting analysis with {} workers (queue capacity {})",
            self.workers, self.queue_capacity
        );

        let (path_tx, path_rx) = bounded::<PathBuf>(self.queue_capacity);
        let (outcome_tx, outcome_rx) = bounded::<Outcome<'r>>(self.queue_capacity);
        let mut aggregation = Aggregation::default();

        let produced = thread::scope(|scope| {
            let producer = scope.spawn(move || {
                let sink = PathSink { tx: path_tx };
                produce(&sink)
            });

            for _ in 0..self.workers {
                let paths = path_rx.clone();
                let outcomes = outcome_tx.clone();
                let registry = self.registry;
                scope.spawn(move || {
                    for path in paths.iter() {
                        let outcome = match registry.resolve_path(&path) {
                            Some(profile) => Outcome::Analyzed {
                                language: profile.name(),
                                analysis: analyze_file(&path, profile),
                            },
                            None => Outcome::Skipped(path),
                        };
                        if outcomes.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
            // Only the workers hold these now, so the outcome stream ends when they do.
            drop(path_rx);
            drop(outcome_tx);

            for outcome in outcome_rx.iter() {
                if let Outcome::Analyzed { analysis, .. } = &outcome {
                    on_record(&analysis.record);
                }
                aggregation.merge(outcome);
            }

            match producer.join() {
                Ok(produced) => produced,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        info!(
            "analysis finished: {} languages, {} failures, {} skipped",
            aggregation.languages.len(),
            aggregation.failures.len(),
            aggregation.skipped
        );
        (aggregation, produced)
    }
}
