use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::classify::{classify, LineKind};
use crate::language::LanguageProfile;

/// Statistics for one file, produced once and never modified.
///
/// `code_lines + comment_lines + blank_lines == lines` holds for every record.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    #[serde(serialize_with = "serialize_path")]
    pub path: PathBuf,
    pub lines: u64,
    pub code_lines: u64,
    pub comment_lines: u64,
    pub blank_lines: u64,
    pub characters: u64,
    pub functions: u64,
    pub classes: u64,
    pub size: u64,
}

impl FileRecord {
    fn empty(path: &Path) -> Self {
        FileRecord {
            path: path.to_path_buf(),
            ..FileRecord::default()
        }
    }
}

fn serialize_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The file could not be opened; its record is all zeros.
    Open,
    /// Reading stopped part way; the record holds the lines read before the error.
    Read,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Open => "open",
            FailureKind::Read => "read",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    #[serde(serialize_with = "serialize_path")]
    pub path: PathBuf,
    pub kind: FailureKind,
    pub error: String,
}

impl FileFailure {
    fn new(path: &Path, kind: FailureKind, err: &io::Error) -> Self {
        FileFailure {
            path: path.to_path_buf(),
            kind,
            error: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub record: FileRecord,
    pub failure: Option<FileFailure>,
}

/// One line of input: lossily decoded text plus the raw byte width without
/// its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub text: String,
    pub width: usize,
}

/// Reads lines from any reader, replacing invalid UTF-8 with the replacement character.
pub struct LossyLineReader {
    reader: BufReader<Box<dyn Read + Send>>,
    buffer: Vec<u8>,
}

impl LossyLineReader {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: BufReader::new(Box::new(reader)),
            buffer: Vec::with_capacity(8 * 1024),
        }
    }
}

impl Iterator for LossyLineReader {
    type Item = io::Result<SourceLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                let mut end = self.buffer.len();
                if self.buffer.get(end - 1) == Some(&b'\n') {
                    end -= 1;
                    if end > 0 && self.buffer.get(end - 1) == Some(&b'\r') {
                        end -= 1;
                    }
                }
                let raw = &self.buffer[..end];
                Some(Ok(SourceLine {
                    text: String::from_utf8_lossy(raw).into_owned(),
                    width: raw.len(),
                }))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// Analyze a file on disk. Never fails: open and read errors are reported in
/// [`Analysis::failure`] alongside whatever could be counted.
pub fn analyze_file(path: &Path, profile: &LanguageProfile) -> Analysis {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) => {
            return Analysis {
                record: FileRecord::empty(path),
                failure: Some(FileFailure::new(path, FailureKind::Open, &err)),
            }
        }
    };
    let size = file.metadata().map(|meta| meta.len()).unwrap_or(0);
    analyze_reader(path, size, file, profile)
}

pub fn analyze_reader<R: Read + Send + 'static>(
    path: &Path,
    size: u64,
    reader: R,
    profile: &LanguageProfile,
) -> Analysis {
    let mut record = FileRecord {
        size,
        ..FileRecord::empty(path)
    };
    let mut failure = None;

    for line_result in LossyLineReader::new(reader) {
        let line = match line_result {
            Ok(line) => line,
            Err(err) => {
                failure = Some(FileFailure::new(path, FailureKind::Read, &err));
                break;
            }
        };

        record.lines += 1;
        record.characters += line.width as u64 + 1;

        let class = classify(&line.text, profile);
        match class.kind {
            LineKind::Blank => record.blank_lines += 1,
            LineKind::Comment => record.comment_lines += 1,
            LineKind::Code => {
                record.code_lines += 1;
                record.functions += u64::from(class.is_function);
                record.classes += u64::from(class.is_class);
            }
        }
    }

    Analysis { record, failure }
}
