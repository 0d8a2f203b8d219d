//! Directory traversal feeding candidate paths to the aggregator.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};

use crate::aggregate::PathSink;
use crate::error::{Error, Result};
use crate::language::LanguageRegistry;

pub const DEFAULT_MAX_DEPTH: usize = 100;

pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    ".idea",
    ".vscode",
    ".vs",
    "*.exe",
    "*.dll",
    "*.so",
    "*.dylib",
    "*.jar",
    "*.war",
    "*.class",
    "*.pyc",
    "*.pyo",
    "__pycache__",
    ".DS_Store",
    "Thumbs.db",
];

/// A directory or entry the walk could not read. The walk carries on past it.
#[derive(Debug)]
pub struct WalkError {
    pub path: PathBuf,
    pub message: String,
}

impl WalkError {
    fn new(path: &Path, message: impl Into<String>) -> Self {
        WalkError {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    fn io(path: &Path, context: &str, err: &io::Error) -> Self {
        WalkError::new(path, format!("{context}: {err}"))
    }
}

impl fmt::Display for WalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Include/exclude rules deciding which files are handed to the aggregator.
#[derive(Debug, Default)]
pub struct PathFilter {
    exclude_names: Vec<Pattern>,
    exclude_paths: Vec<Pattern>,
    include: Vec<Pattern>,
}

impl PathFilter {
    /// User excludes are checked first, then [`DEFAULT_EXCLUDES`].
    pub fn new(exclude: &[String], include: &[String]) -> Result<Self> {
        let mut filter = PathFilter::default();
        let excludes = exclude
            .iter()
            .map(String::as_str)
            .chain(DEFAULT_EXCLUDES.iter().copied());
        for raw in excludes {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let pattern = compile(raw)?;
            if raw.contains('/') {
                filter.exclude_paths.push(pattern);
            } else {
                filter.exclude_names.push(pattern);
            }
        }
        for raw in include {
            let raw = raw.trim();
            if !raw.is_empty() {
                filter.include.push(compile(raw)?);
            }
        }
        Ok(filter)
    }

    pub fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let name_match = path.file_name().is_some_and(|name| {
            let name = name.to_string_lossy();
            self.exclude_names.iter().any(|p| p.matches(&name))
        });
        if name_match {
            return true;
        }
        if self.exclude_paths.is_empty() {
            return false;
        }
        relative_str(root, path)
            .is_some_and(|rel| self.exclude_paths.iter().any(|p| p.matches(&rel)))
    }

    /// Whether a (non-excluded) file should be analyzed.
    pub fn is_eligible(&self, registry: &LanguageRegistry, path: &Path) -> bool {
        if self.include.is_empty() {
            return registry.resolve_path(path).is_some();
        }
        path.file_name().is_some_and(|name| {
            let name = name.to_string_lossy();
            self.include.iter().any(|p| p.matches(&name))
        })
    }
}

fn compile(raw: &str) -> Result<Pattern> {
    Pattern::new(raw).map_err(|source| Error::Pattern {
        pattern: raw.to_string(),
        source,
    })
}

fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    Some(relative.to_string_lossy().replace('\\', "/"))
}

pub struct Walker<'a> {
    registry: &'a LanguageRegistry,
    filter: &'a PathFilter,
    max_depth: usize,
}

impl<'a> Walker<'a> {
    pub fn new(registry: &'a LanguageRegistry, filter: &'a PathFilter) -> Self {
        Walker {
            registry,
            filter,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Submit every eligible file under `root`. Errors are collected and
    /// returned once the walk is complete.
    pub fn walk(&self, root: &Path, sink: &PathSink) -> Vec<WalkError> {
        let mut errors = Vec::new();
        match fs::metadata(root) {
            Ok(meta) if meta.is_file() => {
                let base = root.parent().unwrap_or(root);
                if self.filter.is_excluded(base, root) {
                    debug!("excluded {}", root.display());
                } else if self.filter.is_eligible(self.registry, root) {
                    sink.submit(root);
                }
            }
            Ok(_) => self.walk_dir(root, root, 0, sink, &mut errors),
            Err(err) => errors.push(WalkError::io(root, "Error reading metadata", &err)),
        }
        errors
    }

    fn walk_dir(
        &self,
        root: &Path,
        dir: &Path,
        depth: usize,
        sink: &PathSink,
        errors: &mut Vec<WalkError>,
    ) {
        if depth > self.max_depth {
            warn!(
                "maximum directory depth ({}) reached at {}",
                self.max_depth,
                dir.display()
            );
            errors.push(WalkError::new(
                dir,
                format!("Maximum directory depth ({}) reached", self.max_depth),
            ));
            return;
        }

        let read_dir = match fs::read_dir(dir) {
            Ok(iter) => iter,
            Err(err) => {
                warn!("error reading directory {}: {}", dir.display(), err);
                errors.push(WalkError::io(dir, "Error reading directory", &err));
                return;
            }
        };

        let mut entries = Vec::new();
        for entry_result in read_dir {
            match entry_result {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    warn!("error reading entry in {}: {}", dir.display(), err);
                    errors.push(WalkError::io(dir, "Error reading entry", &err));
                }
            }
        }
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let entry_path = entry.path();
            if self.filter.is_excluded(root, &entry_path) {
                debug!("excluded {}", entry_path.display());
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(err) => {
                    warn!("error reading type for {}: {}", entry_path.display(), err);
                    errors.push(WalkError::io(&entry_path, "Error reading file type", &err));
                    continue;
                }
            };

            if file_type.is_dir() {
                self.walk_dir(root, &entry_path, depth + 1, sink, errors);
            } else if file_type.is_symlink() {
                // follow links to files, never links to directories
                if entry_path.is_dir() {
                    debug!("not following directory link {}", entry_path.display());
                } else if self.filter.is_eligible(self.registry, &entry_path)
                    && !sink.submit(entry_path)
                {
                    return;
                }
            } else if file_type.is_file()
                && self.filter.is_eligible(self.registry, &entry_path)
                && !sink.submit(entry_path)
            {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use tempfile::TempDir;

    fn registry() -> LanguageRegistry {
        LanguageRegistry::builtin().expect("built-in profiles should compile")
    }

    fn create_test_file(dir: &Path, name: &str, content: &str) -> io::Result<()> {
        if let Some(parent) = dir.join(name).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dir.join(name), content)
    }

    fn collect(root: &Path, filter: &PathFilter, max_depth: usize) -> (Vec<String>, Vec<WalkError>) {
        let registry = registry();
        let walker = Walker::new(&registry, filter).max_depth(max_depth);
        let (aggregation, errors) = Aggregator::new(&registry)
            .workers(2)
            .run(|sink| walker.walk(root, sink));
        let mut names: Vec<String> = aggregation
            .records()
            .map(|r| {
                r.path
                    .strip_prefix(root)
                    .unwrap_or(&r.path)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        names.sort();
        (names, errors)
    }

    #[test]
    fn test_default_excludes_prune_directories() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(root, "src/main.rs", "fn main() {}\n")?;
        create_test_file(root, "target/debug/build.rs", "fn build() {}\n")?;
        create_test_file(root, "node_modules/pkg/index.js", "var x = 1;\n")?;
        create_test_file(root, "notes.txt", "not code\n")?;
        create_test_file(root, "lib.pyc", "binary\n")?;

        let filter = PathFilter::new(&[], &[]).expect("default patterns compile");
        let (names, errors) = collect(root, &filter, DEFAULT_MAX_DEPTH);
        assert_eq!(names, vec!["src/main.rs"]);
        assert!(errors.is_empty(), "errors: {errors:?}");
        Ok(())
    }

    #[test]
    fn test_user_excludes_match_names_and_relative_paths() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(root, "src/main.rs", "fn main() {}\n")?;
        create_test_file(root, "src/generated/api.rs", "fn api() {}\n")?;
        create_test_file(root, "src/util_test.go", "package util\n")?;
        create_test_file(root, "docs/generated/page.md", "# page\n")?;

        let filter = PathFilter::new(
            &["src/generated".to_string(), "*_test.go".to_string()],
            &[],
        )
        .expect("patterns compile");
        let (names, _) = collect(root, &filter, DEFAULT_MAX_DEPTH);
        assert_eq!(names, vec!["docs/generated/page.md", "src/main.rs"]);
        Ok(())
    }

    #[test]
    fn test_include_patterns_restrict_files() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(root, "a.rs", "fn a() {}\n")?;
        create_test_file(root, "b.py", "def b():\n")?;
        create_test_file(root, "c.txt", "text\n")?;

        let filter = PathFilter::new(&[], &["*.py".to_string(), "*.txt".to_string()])
            .expect("patterns compile");
        let (names, _) = collect(root, &filter, DEFAULT_MAX_DEPTH);
        // c.txt is submitted but resolves to no language
        assert_eq!(names, vec!["b.py"]);
        Ok(())
    }

    #[test]
    fn test_max_depth_is_reported_as_walk_error() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(root, "root.rs", "fn root() {}\n")?;
        create_test_file(root, "level1/level2/nested.rs", "fn nested() {}\n")?;

        let filter = PathFilter::new(&[], &[]).expect("default patterns compile");
        let (names, errors) = collect(root, &filter, 0);
        assert_eq!(names, vec!["root.rs"]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Maximum directory depth"));
        Ok(())
    }

    #[test]
    fn test_single_file_root() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "only.go", "package main\n")?;
        let filter = PathFilter::new(&[], &[]).expect("default patterns compile");
        let (names, errors) = collect(&temp_dir.path().join("only.go"), &filter, 1);
        assert_eq!(names.len(), 1);
        assert!(errors.is_empty());
        Ok(())
    }

    #[test]
    fn test_single_file_root_honours_excludes() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        create_test_file(temp_dir.path(), "cache.pyc", "x = 1\n")?;
        let root = temp_dir.path().join("cache.pyc");

        let include = vec!["*.pyc".to_string()];
        let filter = PathFilter::new(&[], &include).expect("patterns compile");
        let (names, errors) = collect(&root, &filter, 1);
        assert!(names.is_empty(), "default *.pyc exclude should apply: {names:?}");
        assert!(errors.is_empty());

        create_test_file(temp_dir.path(), "keep.go", "package main\n")?;
        let exclude = vec!["keep.go".to_string()];
        let filter = PathFilter::new(&exclude, &[]).expect("patterns compile");
        let (names, _) = collect(&temp_dir.path().join("keep.go"), &filter, 1);
        assert!(names.is_empty(), "user exclude should apply: {names:?}");
        Ok(())
    }

    #[test]
    fn test_missing_root_is_a_walk_error() {
        let temp_dir = TempDir::new().expect("temp dir");
        let filter = PathFilter::new(&[], &[]).expect("default patterns compile");
        let (names, errors) = collect(&temp_dir.path().join("missing"), &filter, 1);
        assert!(names.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = PathFilter::new(&["[".to_string()], &[]).expect_err("pattern should fail");
        assert!(err.to_string().contains("Invalid pattern '['"));
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_becomes_open_failure() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        create_test_file(root, "real.rs", "fn real() {}\n")?;
        std::os::unix::fs::symlink(root.join("nowhere.rs"), root.join("dangling.rs"))?;

        let registry = registry();
        let filter = PathFilter::new(&[], &[]).expect("default patterns compile");
        let walker = Walker::new(&registry, &filter);
        let (aggregation, errors) =
            Aggregator::new(&registry).run(|sink| walker.walk(root, sink));
        assert!(errors.is_empty());
        assert_eq!(aggregation.languages["Rust"].files, 2);
        assert_eq!(aggregation.failures.len(), 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_file_name_is_analyzed() -> io::Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        let name = OsStr::from_bytes(b"caf\xe9.rs");
        fs::write(root.join(name), "fn main() {}\n")?;
        fs::write(root.join(OsStr::from_bytes(b"skip\xe9.pyc")), "x\n")?;

        let registry = registry();
        let filter = PathFilter::new(&[], &[]).expect("default patterns compile");
        assert!(filter.is_eligible(&registry, &root.join(name)));
        assert!(filter.is_excluded(root, &root.join(OsStr::from_bytes(b"skip\xe9.pyc"))));

        let walker = Walker::new(&registry, &filter);
        let (aggregation, errors) =
            Aggregator::new(&registry).run(|sink| walker.walk(root, sink));
        assert!(errors.is_empty());
        assert_eq!(aggregation.skipped, 0);
        assert_eq!(aggregation.languages["Rust"].files, 1);
        assert_eq!(aggregation.languages["Rust"].functions, 1);
        assert!(aggregation.failures.is_empty());
        Ok(())
    }
}
