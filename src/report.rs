//! Table and JSON rendering of a finished aggregation.

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use colored::*;
use serde::Serialize;

use crate::aggregate::{Aggregation, LanguageAggregate, Totals};
use crate::analyzer::{FileFailure, FileRecord};
use crate::error::Result;
use crate::language::LanguageRegistry;
use crate::ranking::{by_directory, top_files};
use crate::walk::WalkError;

const RULE_WIDTH: usize = 120;
const DIR_WIDTH: usize = 40;
const LANG_WIDTH: usize = 15;
const DEFAULT_PATH_WIDTH: usize = 55;
// "NN. " prefix plus the lines and chars columns of the top-files list
const TOP_FILES_FIXED_WIDTH: usize = 4 + 1 + 16 + 1 + 18;

pub struct ReportOptions<'a> {
    pub root: &'a Path,
    pub top: usize,
    pub detailed: bool,
    pub by_dir: bool,
    pub path_width: usize,
}

impl<'a> ReportOptions<'a> {
    pub fn new(root: &'a Path) -> Self {
        ReportOptions {
            root,
            top: 10,
            detailed: false,
            by_dir: false,
            path_width: DEFAULT_PATH_WIDTH,
        }
    }
}

/// Width available for paths in the top-files list, from the terminal when known.
pub fn path_column_width() -> usize {
    terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| usize::from(w))
        .filter(|&w| w > TOP_FILES_FIXED_WIDTH + 20)
        .map(|w| w - TOP_FILES_FIXED_WIDTH)
        .unwrap_or(DEFAULT_PATH_WIDTH)
}

/// Truncates to at most `max_len` characters, keeping the end of the string
/// behind a "..." prefix.
pub fn truncate_start(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else {
        let skip_count = char_count - max_len.saturating_sub(3);
        let truncated: String = s.chars().skip(skip_count).collect();
        format!("...{}", truncated)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = "KMGTPE".chars().nth(exp).unwrap_or('E');
    format!("{:.1} {}B", bytes as f64 / div as f64, unit)
}

fn display_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(p) if p.as_os_str().is_empty() => ".".to_string(),
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Languages by line count, largest first, ties by name.
fn sorted_languages(aggregation: &Aggregation) -> Vec<&LanguageAggregate> {
    let mut sorted: Vec<&LanguageAggregate> = aggregation.languages.values().collect();
    sorted.sort_by(|a, b| b.lines.cmp(&a.lines).then_with(|| a.language.cmp(&b.language)));
    sorted
}

fn format_totals_line(label: &str, totals: &Totals) -> String {
    format!(
        "{:<width$} {:>8} {:>12} {:>12} {:>12} {:>8} {:>12} {:>8} {:>10}",
        label,
        totals.files,
        totals.lines,
        totals.code_lines,
        totals.comment_lines,
        totals.blank_lines,
        totals.characters,
        totals.functions,
        totals.classes,
        width = LANG_WIDTH
    )
}

pub fn build_table_report(
    aggregation: &Aggregation,
    walk_errors: &[WalkError],
    options: &ReportOptions<'_>,
    generated_at: DateTime<Local>,
) -> String {
    let mut output = String::new();

    if aggregation.languages.is_empty() {
        let _ = writeln!(output, "{}", "No supported code files found!".yellow());
        write_warnings(&mut output, aggregation, walk_errors);
        return output;
    }

    let _ = writeln!(output, "\n{}", "Code Analysis Results".cyan());
    let _ = writeln!(
        output,
        "{}",
        format!("Generated on: {}", generated_at.format("%Y-%m-%d %H:%M:%S")).bright_black()
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{:<width$} {:>8} {:>12} {:>12} {:>12} {:>8} {:>12} {:>8} {:>10}",
        "LANGUAGE",
        "FILES",
        "LINES",
        "CODE",
        "COMMENTS",
        "BLANK",
        "CHARS",
        "FUNCS",
        "CLASSES",
        width = LANG_WIDTH
    );
    let _ = writeln!(output, "{}", "─".repeat(RULE_WIDTH));

    for agg in sorted_languages(aggregation) {
        let line = format_totals_line(&agg.language, &Totals::sum([agg]));
        let _ = writeln!(output, "{}", line);
    }

    let totals = aggregation.totals();
    let _ = writeln!(output, "{}", "─".repeat(RULE_WIDTH));
    let _ = writeln!(output, "{}", format_totals_line("TOTAL", &totals));

    if options.top > 0 {
        write_top_files(&mut output, aggregation, options);
    }
    if options.by_dir {
        write_directories(&mut output, aggregation, options.root);
    }
    if options.detailed {
        write_detailed(&mut output, aggregation, options);
    }

    let _ = writeln!(output, "\n {}", "Summary:".blue().bold());
    let _ = writeln!(
        output,
        "   Total Size: {}",
        format_bytes(totals.size).bright_yellow()
    );
    let _ = writeln!(
        output,
        "   Code Ratio: {}",
        format!("{:.1}%", totals.code_ratio()).bright_yellow()
    );
    if let Some(avg) = totals.avg_lines_per_function() {
        let _ = writeln!(
            output,
            "   Avg Lines/Function: {}",
            format!("{:.1}", avg).bright_yellow()
        );
    }
    write_warnings(&mut output, aggregation, walk_errors);

    output
}

fn write_top_files(output: &mut String, aggregation: &Aggregation, options: &ReportOptions<'_>) {
    let width = options.path_width.max(10);
    let _ = writeln!(output, "\n Top {} Files by Lines:", options.top);
    for (i, file) in top_files(aggregation.records(), options.top)
        .into_iter()
        .enumerate()
    {
        let _ = writeln!(
            output,
            "{:2}. {:<width$} {:>10} lines {:>12} chars",
            i + 1,
            truncate_start(&display_path(&file.path, options.root), width),
            file.lines,
            file.characters,
            width = width
        );
    }
}

fn write_directories(output: &mut String, aggregation: &Aggregation, root: &Path) {
    let _ = writeln!(output, "\n Breakdown by directory:");
    let _ = writeln!(
        output,
        "{:<40} {:<width$} {:>8} {:>12} {:>12} {:>12} {:>8}",
        "DIRECTORY",
        "LANGUAGE",
        "FILES",
        "LINES",
        "CODE",
        "COMMENTS",
        "BLANK",
        width = LANG_WIDTH
    );
    let _ = writeln!(output, "{}", "─".repeat(RULE_WIDTH));
    for (dir, languages) in by_directory(aggregation.languages.values()) {
        let display = truncate_start(&display_path(&dir, root), DIR_WIDTH);
        for (lang, totals) in languages {
            let _ = writeln!(
                output,
                "{:<40} {:<width$} {:>8} {:>12} {:>12} {:>12} {:>8}",
                display,
                lang,
                totals.files,
                totals.lines,
                totals.code_lines,
                totals.comment_lines,
                totals.blank_lines,
                width = LANG_WIDTH
            );
        }
    }
}

fn write_detailed(output: &mut String, aggregation: &Aggregation, options: &ReportOptions<'_>) {
    let width = options.path_width.max(10);
    let _ = writeln!(output, "\n Files:");
    for agg in aggregation.languages.values() {
        let _ = writeln!(output, " {}", agg.language.bold());
        let mut records: Vec<&FileRecord> = agg.records.iter().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        for record in records {
            let _ = writeln!(
                output,
                "   {:<width$} {:>8} lines {:>8} code {:>8} comments {:>8} blank {:>6} funcs {:>6} classes",
                truncate_start(&display_path(&record.path, options.root), width),
                record.lines,
                record.code_lines,
                record.comment_lines,
                record.blank_lines,
                record.functions,
                record.classes,
                width = width
            );
        }
    }
}

fn write_warnings(output: &mut String, aggregation: &Aggregation, walk_errors: &[WalkError]) {
    let count = aggregation.failures.len() + walk_errors.len();
    if count > 0 {
        let _ = writeln!(
            output,
            "\n{}: {} files or directories could not be read",
            "Warning".red().bold(),
            count.to_string().bright_yellow()
        );
    }
}

#[derive(Serialize)]
struct JsonSummary {
    total_files: u64,
    total_lines: u64,
    total_code_lines: u64,
    total_comment_lines: u64,
    total_blank_lines: u64,
    total_characters: u64,
    total_functions: u64,
    total_classes: u64,
    total_size: u64,
    code_ratio: f64,
    avg_lines_per_function: Option<f64>,
}

impl From<Totals> for JsonSummary {
    fn from(totals: Totals) -> Self {
        JsonSummary {
            total_files: totals.files,
            total_lines: totals.lines,
            total_code_lines: totals.code_lines,
            total_comment_lines: totals.comment_lines,
            total_blank_lines: totals.blank_lines,
            total_characters: totals.characters,
            total_functions: totals.functions,
            total_classes: totals.classes,
            total_size: totals.size,
            code_ratio: totals.code_ratio(),
            avg_lines_per_function: totals.avg_lines_per_function(),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Local>,
    languages: &'a BTreeMap<String, LanguageAggregate>,
    summary: JsonSummary,
    top_files: Vec<&'a FileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    directories: Option<BTreeMap<String, BTreeMap<String, Totals>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<&'a FileRecord>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<&'a FileFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    walk_errors: Vec<String>,
}

pub fn build_json_report(
    aggregation: &Aggregation,
    walk_errors: &[WalkError],
    options: &ReportOptions<'_>,
    generated_at: DateTime<Local>,
) -> Result<String> {
    let directories = options.by_dir.then(|| {
        by_directory(aggregation.languages.values())
            .into_iter()
            .map(|(dir, langs): (PathBuf, _)| (display_path(&dir, options.root), langs))
            .collect()
    });
    let files = options.detailed.then(|| {
        let mut records: Vec<&FileRecord> = aggregation.records().collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    });

    let report = JsonReport {
        generated_at,
        languages: &aggregation.languages,
        summary: aggregation.totals().into(),
        top_files: top_files(aggregation.records(), options.top),
        directories,
        files,
        failures: aggregation.failures.iter().collect(),
        walk_errors: walk_errors.iter().map(|e| e.to_string()).collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn build_language_list(registry: &LanguageRegistry) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Supported languages:");
    for profile in registry.profiles() {
        let _ = writeln!(
            output,
            "  {:<width$} {}",
            profile.name(),
            profile.extensions().join(" "),
            width = LANG_WIDTH
        );
    }
    for conflict in registry.conflicts() {
        let _ = writeln!(
            output,
            "Note: {} is claimed by {} and {}; using {}",
            conflict.key, conflict.previous, conflict.winner, conflict.winner
        );
    }
    output
}
