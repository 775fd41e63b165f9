//! Transfer results and run summaries.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Statistics for a single completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    /// Bytes written.
    pub size: u64,
    /// Time taken.
    pub elapsed: Duration,
    /// Average speed in bytes per second.
    pub average_speed: u64,
}

/// Outcome of one requested download.
#[derive(Debug, Clone)]
pub struct TransferResult {
    /// Report name.
    pub name: String,
    /// Destination path.
    pub path: PathBuf,
    /// Error description when the download failed.
    pub error: Option<String>,
    /// Statistics when the download succeeded.
    pub stats: Option<FileStats>,
}

impl TransferResult {
    /// Records a successful download.
    #[must_use]
    pub fn success(name: impl Into<String>, path: PathBuf, stats: FileStats) -> Self {
        Self {
            name: name.into(),
            path,
            error: None,
            stats: Some(stats),
        }
    }

    /// Records a failed download.
    #[must_use]
    pub fn failure(name: impl Into<String>, path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path,
            error: Some(error.into()),
            stats: None,
        }
    }

    /// Whether the file was fully downloaded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Tracks bytes and time for a download in flight.
pub struct DownloadStatsTracker {
    start_time: Instant,
    downloaded: u64,
}

impl Default for DownloadStatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadStatsTracker {
    /// Starts tracking now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            downloaded: 0,
        }
    }

    /// Records written bytes and returns the running total.
    pub const fn record_bytes(&mut self, bytes: u64) -> u64 {
        self.downloaded += bytes;
        self.downloaded
    }

    /// Bytes recorded so far.
    #[must_use]
    pub const fn downloaded(&self) -> u64 {
        self.downloaded
    }

    /// Converts this tracker into final file statistics.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn into_file_stats(self) -> FileStats {
        let elapsed = self.start_time.elapsed();
        let secs = elapsed.as_secs_f64();
        let average_speed = if secs > 0.0 {
            (self.downloaded as f64 / secs) as u64
        } else {
            0
        };
        FileStats {
            size: self.downloaded,
            elapsed,
            average_speed,
        }
    }
}

/// End-of-run summary rendered by callers.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    /// Folder the run downloaded into.
    pub destination: PathBuf,
    /// One result per attempted entry, in request order.
    pub results: Vec<TransferResult>,
    /// Names skipped because an earlier run already saved them.
    pub skipped: Vec<String>,
    /// Wall time of the transfer phase.
    pub elapsed: Duration,
}

impl SyncSummary {
    /// Number of files downloaded.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    /// Results of failed downloads.
    pub fn failures(&self) -> impl Iterator<Item = &TransferResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }

    /// Number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Total bytes downloaded.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.results
            .iter()
            .filter_map(|r| r.stats.as_ref())
            .map(|s| s.size)
            .sum()
    }

    /// Average speed over the whole run in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes() as f64 / secs) as u64
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(size: u64) -> FileStats {
        FileStats {
            size,
            elapsed: Duration::from_secs(1),
            average_speed: size,
        }
    }

    #[test]
    fn transfer_result_success_and_failure() {
        let ok = TransferResult::success("a.csv", PathBuf::from("d/a.csv"), stats(10));
        let bad = TransferResult::failure("b.csv", PathBuf::from("d/b.csv"), "404");
        assert!(ok.succeeded());
        assert!(!bad.succeeded());
        assert_eq!(bad.error.as_deref(), Some("404"));
    }

    #[test]
    fn summary_counts() {
        let summary = SyncSummary {
            destination: PathBuf::from("d"),
            results: vec![
                TransferResult::success("a.csv", PathBuf::from("d/a.csv"), stats(100)),
                TransferResult::failure("b.csv", PathBuf::from("d/b.csv"), "timeout"),
                TransferResult::success("c.csv", PathBuf::from("d/c.csv"), stats(50)),
            ],
            skipped: vec!["x.csv".into()],
            elapsed: Duration::from_secs(2),
        };
        assert_eq!(summary.downloaded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.total_bytes(), 150);
        assert_eq!(summary.average_speed(), 75);
        assert_eq!(summary.failures().next().unwrap().name, "b.csv");
    }

    #[test]
    fn summary_average_speed_zero_elapsed() {
        assert_eq!(SyncSummary::default().average_speed(), 0);
    }

    #[test]
    fn tracker_accumulates_bytes() {
        let mut tracker = DownloadStatsTracker::new();
        assert_eq!(tracker.record_bytes(10), 10);
        assert_eq!(tracker.record_bytes(5), 15);
        assert_eq!(tracker.into_file_stats().size, 15);
    }
}
