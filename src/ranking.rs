use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::aggregate::{LanguageAggregate, Totals};
use crate::analyzer::FileRecord;

/// Largest files first: lines descending, then path ascending, then
/// characters descending. Input order never affects the result.
fn rank(a: &FileRecord, b: &FileRecord) -> Ordering {
    b.lines
        .cmp(&a.lines)
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| b.characters.cmp(&a.characters))
}

pub fn top_files<'a>(
    records: impl IntoIterator<Item = &'a FileRecord>,
    n: usize,
) -> Vec<&'a FileRecord> {
    if n == 0 {
        return Vec::new();
    }
    let mut ranked: Vec<&FileRecord> = records.into_iter().collect();
    ranked.sort_by(|a, b| rank(a, b));
    ranked.truncate(n);
    ranked
}

/// Per-directory, per-language totals keyed by each file's parent directory.
pub fn by_directory<'a>(
    aggregates: impl IntoIterator<Item = &'a LanguageAggregate>,
) -> BTreeMap<PathBuf, BTreeMap<String, Totals>> {
    let mut dirs: BTreeMap<PathBuf, BTreeMap<String, Totals>> = BTreeMap::new();
    for agg in aggregates {
        for record in &agg.records {
            let dir = record
                .path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_default();
            dirs.entry(dir)
                .or_default()
                .entry(agg.language.clone())
                .or_default()
                .add_record(record);
        }
    }
    dirs
}
