//! Report transfers: single downloads and fault-tolerant batches.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use futures::{StreamExt, stream};
use reqwest::header::AUTHORIZATION;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::catalog::ReportEntry;
use crate::config::DownloadConfig;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::format::snippet;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::signer::{self, HMAC_HEADER};
use crate::stats::{DownloadStatsTracker, FileStats, TransferResult};
use crate::token::AccessToken;

/// Trait for receiving transfer progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait TransferProgress: Send + Sync {
    /// Called when a file download starts.
    fn on_file_start(&self, _name: &str) {}

    /// Called with the completion percentage of the current file.
    fn on_file_progress(&self, _name: &str, _percent: f64) {}

    /// Called with the completion percentage of the whole batch.
    fn on_batch_progress(&self, _percent: f64) {}

    /// Called when a file download completes successfully.
    fn on_file_complete(&self, _name: &str, _stats: &FileStats) {}

    /// Called when a file download fails.
    fn on_error(&self, _name: &str, _error: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl TransferProgress for NoProgress {}

/// Catalog entries split by the dedup index.
#[derive(Debug, Clone, Default)]
pub struct CollectedReports {
    /// Entries that need to be downloaded.
    pub to_download: Vec<ReportEntry>,
    /// Entries an earlier run already saved.
    pub skipped: Vec<ReportEntry>,
}

impl CollectedReports {
    /// Returns true if there is nothing to download.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_download.is_empty()
    }
}

/// Splits `entries` into those to fetch and those already downloaded.
#[must_use]
pub fn collect_reports(entries: &[ReportEntry], index: &HashSet<String>) -> CollectedReports {
    let (skipped, to_download) = entries
        .iter()
        .cloned()
        .partition(|entry| index.contains(&entry.name));
    CollectedReports {
        to_download,
        skipped,
    }
}

/// Joins a report name onto `dir`, rejecting names that would escape it.
///
/// # Errors
///
/// Returns [`Error::Protocol`] for empty names, `.`/`..`, or names with path
/// separators.
pub fn leaf_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::Protocol {
            url: String::new(),
            message: format!("report name {name:?} is not a plain file name"),
            snippet: String::new(),
        });
    }
    Ok(dir.join(name))
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".part");
    PathBuf::from(s)
}

#[allow(clippy::cast_precision_loss)]
fn percent(done: u64, total: u64) -> f64 {
    (done as f64 / total as f64 * 100.0).min(100.0)
}

/// Shared per-entry progress for a batch.
///
/// The overall value is the mean of the entry percentages. Run one after
/// another, entry `i` of `n` at `p` percent gives `(i + p / 100) / n * 100`.
/// It is never reported lower than a previous value.
struct BatchProgress {
    state: Mutex<BatchState>,
}

struct BatchState {
    percents: Vec<f64>,
    reported: f64,
}

impl BatchProgress {
    fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(BatchState {
                percents: vec![0.0; count],
                reported: 0.0,
            }),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update(&self, index: usize, entry_percent: f64) -> Option<f64> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = &mut state.percents[index];
        *slot = slot.max(entry_percent.clamp(0.0, 100.0));
        let overall = state.percents.iter().sum::<f64>() / state.percents.len() as f64;
        (overall >= state.reported).then(|| {
            state.reported = overall;
            overall
        })
    }
}

/// Credentials attached to blob requests under [`crate::BlobAuth::Signed`].
#[derive(Debug, Clone)]
pub struct BlobSigner {
    token: AccessToken,
    credentials: Credentials,
}

impl BlobSigner {
    /// Creates a signer from a session token and credentials.
    #[must_use]
    pub const fn new(token: AccessToken, credentials: Credentials) -> Self {
        Self { token, credentials }
    }
}

/// Downloads report blobs to local files.
pub struct Downloader<F: FileSystem = TokioFileSystem> {
    http: reqwest::Client,
    config: DownloadConfig,
    fs: F,
    signer: Option<BlobSigner>,
}

impl Downloader<TokioFileSystem> {
    /// Creates a new downloader with the default file system.
    #[must_use]
    pub const fn new(http: reqwest::Client, config: DownloadConfig) -> Self {
        Self {
            http,
            config,
            fs: TokioFileSystem,
            signer: None,
        }
    }
}

impl<F: FileSystem> Downloader<F> {
    /// Creates a new downloader with a custom file system implementation.
    #[must_use]
    pub const fn with_fs(http: reqwest::Client, config: DownloadConfig, fs: F) -> Self {
        Self {
            http,
            config,
            fs,
            signer: None,
        }
    }

    /// Sends bearer and HMAC headers with every blob request.
    #[must_use]
    pub fn with_signer(mut self, signer: BlobSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    async fn request(&self, uri: &str) -> Result<reqwest::Response> {
        let mut request = self.http.get(uri).timeout(self.config.transfer_timeout());
        if let Some(signer) = &self.signer {
            let signature = signer::sign("GET", uri, &signer.credentials)?;
            request = request
                .header(AUTHORIZATION, signer.token.bearer())
                .header(HMAC_HEADER, signature);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                url: uri.to_string(),
                status: status.as_u16(),
                body: snippet(&body),
            });
        }
        Ok(response)
    }

    /// Downloads `source_uri` to `destination`.
    ///
    /// Bytes go to `{destination}.part`, which is renamed into place only
    /// after the whole body was written. `on_progress` receives the
    /// percentage after every chunk when the length is known, otherwise a
    /// single 100 at the end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transfer`] wrapping the network, status, I/O or
    /// cancellation failure. The final path is never left holding a partial
    /// file.
    pub async fn download_one(
        &self,
        source_uri: &str,
        destination: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<FileStats> {
        let name = destination
            .file_name()
            .map_or_else(|| destination.display().to_string(), |n| n.to_string_lossy().into_owned());

        if cancel.is_cancelled() {
            return Err(Error::transfer(name, Error::Cancelled));
        }

        self.fetch_to(source_uri, destination, on_progress, cancel)
            .await
            .map_err(|e| Error::transfer(name, e))
    }

    async fn fetch_to(
        &self,
        source_uri: &str,
        destination: &Path,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<FileStats> {
        if let Some(parent) = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            self.fs.create_dir_all(parent).await?;
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.request(source_uri) => response?,
        };
        let total = response.content_length().filter(|&len| len > 0);

        let pp = part_path(destination);
        let file = self.fs.create_file(&pp).await?;

        match self
            .write_body(source_uri, response, file, total, on_progress, cancel)
            .await
        {
            Ok(tracker) => {
                self.fs.rename_file(&pp, destination).await?;
                if total.is_none() {
                    on_progress(100.0);
                }
                Ok(tracker.into_file_stats())
            }
            Err(e) => {
                if self.config.cleanup_on_error
                    && let Err(cleanup) = self.fs.remove_file(&pp).await
                {
                    log::warn!("Could not remove {}: {cleanup}", pp.display());
                }
                Err(e)
            }
        }
    }

    async fn write_body(
        &self,
        source_uri: &str,
        mut response: reqwest::Response,
        mut file: tokio::fs::File,
        total: Option<u64>,
        on_progress: &(dyn Fn(f64) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<DownloadStatsTracker> {
        let mut tracker = DownloadStatsTracker::new();
        let chunk_size = self.config.chunk_size.max(1);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                chunk = response.chunk() => chunk?,
            };
            let Some(bytes) = next else { break };

            for piece in bytes.chunks(chunk_size) {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                file.write_all(piece).await?;
                let done = tracker.record_bytes(piece.len() as u64);
                if let Some(total) = total {
                    on_progress(percent(done, total));
                }
            }
        }
        file.flush().await?;

        if let Some(total) = total
            && tracker.downloaded() != total
        {
            return Err(Error::Protocol {
                url: source_uri.to_string(),
                message: format!(
                    "expected {total} bytes, received {}",
                    tracker.downloaded()
                ),
                snippet: String::new(),
            });
        }
        Ok(tracker)
    }

    /// Downloads every entry into `destination_dir`.
    ///
    /// A failing entry is recorded and the batch carries on. Returns one
    /// [`TransferResult`] per entry, in the order given. Up to
    /// `concurrent_files` transfers run at once.
    pub async fn download_all(
        &self,
        entries: &[ReportEntry],
        destination_dir: &Path,
        progress: &dyn TransferProgress,
        cancel: &CancellationToken,
    ) -> Vec<TransferResult> {
        if entries.is_empty() {
            return Vec::new();
        }

        let batch = BatchProgress::new(entries.len());
        let batch = &batch;

        stream::iter(entries.iter().enumerate())
            .map(move |(idx, entry)| async move {
                let result = self
                    .download_entry(entry, destination_dir, progress, batch, idx, cancel)
                    .await;
                if let Some(overall) = batch.update(idx, 100.0) {
                    progress.on_batch_progress(overall);
                }
                result
            })
            .buffered(self.config.concurrent_files.max(1))
            .collect()
            .await
    }

    async fn download_entry(
        &self,
        entry: &ReportEntry,
        destination_dir: &Path,
        progress: &dyn TransferProgress,
        batch: &BatchProgress,
        idx: usize,
        cancel: &CancellationToken,
    ) -> TransferResult {
        let name = entry.name.as_str();
        let path = match leaf_path(destination_dir, name) {
            Ok(path) => path,
            Err(e) => {
                log::error!("Refusing to download {name:?}: {e}");
                progress.on_error(name, &e.to_string());
                return TransferResult::failure(name, destination_dir.to_path_buf(), e.to_string());
            }
        };

        if cancel.is_cancelled() {
            return TransferResult::failure(name, path, Error::Cancelled.to_string());
        }

        log::info!("Downloading {name}");
        progress.on_file_start(name);
        let on_progress = |pct: f64| {
            progress.on_file_progress(name, pct);
            if let Some(overall) = batch.update(idx, pct) {
                progress.on_batch_progress(overall);
            }
        };

        match self
            .download_one(&entry.source_uri, &path, &on_progress, cancel)
            .await
        {
            Ok(stats) => {
                log::info!("Saved {}", path.display());
                progress.on_file_complete(name, &stats);
                TransferResult::success(name, path, stats)
            }
            Err(e) => {
                let cause = match e {
                    Error::Transfer { source, .. } => *source,
                    other => other,
                };
                log::error!("Failed to download {name}: {cause}");
                progress.on_error(name, &cause.to_string());
                TransferResult::failure(name, path, cause.to_string())
            }
        }
    }
}
