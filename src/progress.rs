use std::io::{self, Write};
use std::time::{Duration, Instant};

use colored::*;

use crate::analyzer::FileRecord;

// Performance metrics, updated by the merging thread as files complete.
pub struct PerformanceMetrics {
    files_processed: u64,
    lines_processed: u64,
    start_time: Instant,
    last_update: Instant,
    writer: Box<dyn Write + Send>,
    progress_enabled: bool,
}

impl PerformanceMetrics {
    pub fn new(progress_enabled: bool) -> Self {
        PerformanceMetrics::with_writer(Box::new(io::stderr()), progress_enabled)
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, progress_enabled: bool) -> Self {
        PerformanceMetrics {
            files_processed: 0,
            lines_processed: 0,
            start_time: Instant::now(),
            last_update: Instant::now(),
            writer,
            progress_enabled,
        }
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed
    }

    pub fn lines_processed(&self) -> u64 {
        self.lines_processed
    }

    pub fn record(&mut self, record: &FileRecord) {
        self.update(record.lines);
    }

    fn update(&mut self, new_lines: u64) {
        self.files_processed += 1;
        self.lines_processed += new_lines;

        // Update progress every second
        let now = Instant::now();
        if now.duration_since(self.last_update) >= Duration::from_secs(1) {
            self.print_progress();
            self.last_update = now;
        }
    }

    fn print_progress(&mut self) {
        if !self.progress_enabled {
            return;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let files = self.files_processed;
        let lines = self.lines_processed;

        let writer = &mut self.writer;
        let _ = write!(
            writer,
            "\rProcessed {} files ({:.1} files/sec) and {} lines ({:.1} lines/sec)...",
            files,
            safe_rate(files, elapsed),
            lines,
            safe_rate(lines, elapsed)
        );
        let _ = writer.flush();
    }

    pub fn print_final_stats(&mut self) {
        if !self.progress_enabled {
            return;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let files = self.files_processed;
        let lines = self.lines_processed;

        let writer = &mut self.writer;
        let _ = writeln!(writer, "\n\n{}", "Performance Summary:".blue().bold());
        let _ = writeln!(
            writer,
            "Total time: {} seconds",
            format!("{:.2}", elapsed).bright_yellow()
        );
        let _ = writeln!(
            writer,
            "Files processed: {} ({})",
            files.to_string().bright_yellow(),
            format!("{:.1} files/sec", safe_rate(files, elapsed)).bright_yellow()
        );
        let _ = writeln!(
            writer,
            "Lines processed: {} ({})",
            lines.to_string().bright_yellow(),
            format!("{:.1} lines/sec", safe_rate(lines, elapsed)).bright_yellow()
        );
    }
}

fn safe_rate(value: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= f64::EPSILON {
        0.0
    } else {
        value as f64 / elapsed_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colored::control;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("buffer lock")).into_owned()
        }
    }

    fn record(lines: u64) -> FileRecord {
        FileRecord {
            lines,
            ..FileRecord::default()
        }
    }

    #[test]
    fn test_metrics_accumulate_records() {
        let mut metrics = PerformanceMetrics::with_writer(Box::new(io::sink()), false);
        assert_eq!(metrics.files_processed(), 0);
        metrics.record(&record(7));
        metrics.record(&record(3));
        assert_eq!(metrics.files_processed(), 2);
        assert_eq!(metrics.lines_processed(), 10);
    }

    #[test]
    fn test_progress_line_is_throttled_and_printed() {
        control::set_override(false);
        let buffer = SharedBuffer::default();
        let mut metrics = PerformanceMetrics::with_writer(Box::new(buffer.clone()), true);
        metrics.record(&record(5));
        assert!(buffer.contents().is_empty(), "no output within the first second");

        metrics.last_update = Instant::now() - Duration::from_secs(2);
        metrics.record(&record(5));
        let out = buffer.contents();
        assert!(out.contains("Processed 2 files"), "output: {out}");
        assert!(out.contains("10 lines"), "output: {out}");

        metrics.print_final_stats();
        let out = buffer.contents();
        assert!(out.contains("Performance Summary:"), "output: {out}");
        assert!(out.contains("Files processed: 2"), "output: {out}");
    }

    #[test]
    fn test_disabled_metrics_stay_silent() {
        let buffer = SharedBuffer::default();
        let mut metrics = PerformanceMetrics::with_writer(Box::new(buffer.clone()), false);
        metrics.last_update = Instant::now() - Duration::from_secs(2);
        metrics.record(&record(1));
        metrics.print_final_stats();
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_safe_rate_handles_zero_elapsed() {
        assert_eq!(safe_rate(10, 0.0), 0.0);
        assert_eq!(safe_rate(10, 2.0), 5.0);
    }
}
