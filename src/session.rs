//! One synchronization session against the gateway.
//!
//! A session pairs explicit credentials with a run folder and the dedup
//! index computed when it starts. Token, catalog, filter and transfer calls
//! are exposed separately so an interactive caller can let the user pick a
//! subset between listing and downloading; [`SyncSession::run`] chains them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::catalog::{self, ReportEntry};
use crate::config::{AppConfig, BlobAuth};
use crate::credentials::Credentials;
use crate::dedup::previously_downloaded;
use crate::download::{BlobSigner, CollectedReports, Downloader, TransferProgress, collect_reports};
use crate::error::Result;
use crate::filter::{DATE_FORMAT, DateRange};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::stats::SyncSummary;
use crate::token::{self, AccessToken};

/// Folder label for a run started today.
#[must_use]
pub fn today_label() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

/// State for one synchronization session.
pub struct SyncSession<F: FileSystem + Clone = TokioFileSystem> {
    http: reqwest::Client,
    config: AppConfig,
    credentials: Credentials,
    fs: F,
    run_dir: PathBuf,
    index: HashSet<String>,
}

impl SyncSession<TokioFileSystem> {
    /// Starts a session downloading into today's folder.
    ///
    /// # Errors
    ///
    /// Fails before any network call if a credential is missing, and on I/O
    /// errors while scanning earlier runs.
    pub async fn start(config: AppConfig, credentials: Credentials) -> Result<Self> {
        Self::start_with(config, credentials, TokioFileSystem, &today_label()).await
    }
}

impl<F: FileSystem + Clone> SyncSession<F> {
    /// Starts a session with a custom file system and run folder label.
    ///
    /// # Errors
    ///
    /// Same as [`SyncSession::start`].
    pub async fn start_with(
        config: AppConfig,
        credentials: Credentials,
        fs: F,
        run_label: &str,
    ) -> Result<Self> {
        credentials.validate()?;
        let http = config.gateway.build_client()?;
        let run_dir = config.paths.run_dir(run_label);
        let index = previously_downloaded(&fs, &config.paths.reports_root, &run_dir).await?;
        log::info!(
            "Session started: run folder {}, {} report(s) already downloaded",
            run_dir.display(),
            index.len()
        );
        Ok(Self {
            http,
            config,
            credentials,
            fs,
            run_dir,
            index,
        })
    }

    /// Folder this run downloads into.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Names saved by earlier runs.
    #[must_use]
    pub const fn previously_downloaded(&self) -> &HashSet<String> {
        &self.index
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Acquires a fresh bearer token.
    ///
    /// # Errors
    ///
    /// See [`token::acquire_token`].
    pub async fn acquire_token(&self) -> Result<AccessToken> {
        token::acquire_token(
            &self.http,
            &self.config.gateway,
            &self.credentials.gateway_username,
            &self.credentials.gateway_password,
        )
        .await
    }

    /// Fetches the catalog and, if given, narrows it to `range`.
    ///
    /// # Errors
    ///
    /// Token and catalog errors abort the call.
    pub async fn load_reports(&self, range: Option<&DateRange>) -> Result<Vec<ReportEntry>> {
        let token = self.acquire_token().await?;
        let reports =
            catalog::fetch_catalog(&self.http, &self.config.gateway, &token, &self.credentials)
                .await?;
        Ok(match range {
            Some(range) => {
                if range.is_inverted() {
                    log::warn!("Start date {} is after end date {}", range.start(), range.end());
                }
                let kept = range.apply(&reports);
                log::info!(
                    "{} of {} report(s) between {} and {}",
                    kept.len(),
                    reports.len(),
                    range.start(),
                    range.end()
                );
                kept
            }
            None => reports,
        })
    }

    /// Splits `entries` into those to fetch and those an earlier run saved.
    #[must_use]
    pub fn plan(&self, entries: &[ReportEntry]) -> CollectedReports {
        collect_reports(entries, &self.index)
    }

    async fn downloader(&self) -> Result<Downloader<F>> {
        let downloader = Downloader::with_fs(
            self.http.clone(),
            self.config.download.clone(),
            self.fs.clone(),
        );
        Ok(match self.config.download.blob_auth {
            BlobAuth::Anonymous => downloader,
            BlobAuth::Signed => {
                let token = self.acquire_token().await?;
                downloader.with_signer(BlobSigner::new(token, self.credentials.clone()))
            }
        })
    }

    /// Downloads the selected entries into the run folder, skipping names an
    /// earlier run already saved.
    ///
    /// # Errors
    ///
    /// Only fails if a token is needed for signed blob requests and cannot be
    /// acquired. Per-file failures are reported in the summary.
    pub async fn download_selected(
        &self,
        entries: &[ReportEntry],
        progress: &dyn TransferProgress,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary> {
        let collected = self.plan(entries);
        for entry in &collected.skipped {
            log::info!("Skipping (already downloaded in past): {}", entry.name);
        }

        let started = Instant::now();
        let results = if collected.is_empty() {
            Vec::new()
        } else {
            self.downloader()
                .await?
                .download_all(&collected.to_download, &self.run_dir, progress, cancel)
                .await
        };

        let summary = SyncSummary {
            destination: self.run_dir.clone(),
            results,
            skipped: collected.skipped.into_iter().map(|e| e.name).collect(),
            elapsed: started.elapsed(),
        };
        log::info!(
            "Done: {} downloaded, {} skipped, {} failed",
            summary.downloaded(),
            summary.skipped.len(),
            summary.failed()
        );
        Ok(summary)
    }

    /// Downloads one entry, unless an earlier run already saved it.
    ///
    /// # Errors
    ///
    /// Same as [`SyncSession::download_selected`].
    pub async fn download_single(
        &self,
        entry: &ReportEntry,
        progress: &dyn TransferProgress,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary> {
        self.download_selected(std::slice::from_ref(entry), progress, cancel)
            .await
    }

    /// Lists the catalog, filters it, and downloads everything new.
    ///
    /// # Errors
    ///
    /// Token and catalog errors abort the run; file failures do not.
    pub async fn run(
        &self,
        range: Option<&DateRange>,
        progress: &dyn TransferProgress,
        cancel: &CancellationToken,
    ) -> Result<SyncSummary> {
        let reports = self.load_reports(range).await?;
        self.download_selected(&reports, progress, cancel).await
    }
}
