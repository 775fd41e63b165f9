//! lc-reports - A library for synchronizing reports from the LC gateway.
//!
//! The gateway authenticates every request twice: a password-grant bearer
//! token plus a per-request HMAC signature. This library fetches the report
//! catalog, filters it by the date embedded in each report name, and
//! downloads new reports into a dated run folder, skipping any name that an
//! earlier run already saved.
//!
//! # Example
//!
//! ```no_run
//! use lc_reports::{AppConfig, Credentials, DateRange, NoProgress, SyncSession};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> lc_reports::Result<()> {
//! let session = SyncSession::start(AppConfig::load()?, Credentials::from_env()?).await?;
//!
//! // List reports from the last 15 days
//! let reports = session.load_reports(Some(&DateRange::default())).await?;
//!
//! // Download the new ones into today's folder
//! let summary = session
//!     .download_selected(&reports, &NoProgress, &CancellationToken::new())
//!     .await?;
//! println!(
//!     "{} downloaded, {} skipped, {} failed",
//!     summary.downloaded(),
//!     summary.skipped.len(),
//!     summary.failed()
//! );
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod credentials;
pub mod dedup;
pub mod download;
pub mod error;
pub mod filter;
pub mod format;
pub mod fs;
pub mod session;
pub mod signer;
pub mod stats;
pub mod token;

// Re-export main types for convenience
pub use catalog::{ReportEntry, fetch_catalog};
pub use config::{AppConfig, BlobAuth, DownloadConfig, GatewayConfig, PathConfig};
pub use credentials::Credentials;
pub use dedup::previously_downloaded;
pub use download::{
    BlobSigner, CollectedReports, Downloader, NoProgress, TransferProgress, collect_reports,
};
pub use error::{Error, Result};
pub use filter::{DateRange, date_key, filter_by_date_range};
pub use format::{format_bytes, format_duration};
pub use fs::{FileSystem, TokioFileSystem};
pub use session::SyncSession;
pub use signer::sign;
pub use stats::{FileStats, SyncSummary, TransferResult};
pub use token::{AccessToken, acquire_token};
