//! Configuration types for gateway access, transfers, and local paths.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://portalapi.lcegateway.com/Token";
/// Default catalog endpoint.
pub const DEFAULT_REPORTS_URL: &str = "https://portalapi.lcegateway.com/GetReportBlobs";

/// Remote endpoints and request timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Password-grant token endpoint.
    pub token_url: String,
    /// Report catalog endpoint.
    pub reports_url: String,
    /// Timeout in seconds for token and catalog requests.
    pub request_timeout_secs: u64,
    /// TCP connect timeout in seconds for every request.
    pub connect_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            reports_url: DEFAULT_REPORTS_URL.to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 15,
        }
    }
}

impl GatewayConfig {
    /// Points both endpoints at a different base URL, keeping their paths.
    #[must_use]
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.token_url = format!("{base}/Token");
        self.reports_url = format!("{base}/GetReportBlobs");
        self
    }

    /// Returns the per-request timeout for token and catalog calls.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Builds the HTTP client shared by every request of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?)
    }
}

/// Whether blob downloads carry the gateway's auth headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobAuth {
    /// Plain GET; blob URIs from the catalog are pre-authorized.
    #[default]
    Anonymous,
    /// Bearer token plus an HMAC header signed over the blob URI.
    Signed,
}

impl std::str::FromStr for BlobAuth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anonymous" | "none" => Ok(Self::Anonymous),
            "signed" => Ok(Self::Signed),
            other => Err(Error::Config(format!("unknown blob auth policy: {other}"))),
        }
    }
}

/// Configuration for file transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Size in bytes of the chunks written to disk and reported as progress.
    pub chunk_size: usize,
    /// Number of concurrent file downloads in a batch.
    pub concurrent_files: usize,
    /// Auth policy for blob downloads.
    pub blob_auth: BlobAuth,
    /// Whether to remove `.part` files when a download fails.
    pub cleanup_on_error: bool,
    /// Upper bound in seconds for one blob request, headers and body included.
    pub transfer_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
            concurrent_files: 1,
            blob_auth: BlobAuth::Anonymous,
            cleanup_on_error: true,
            transfer_timeout_secs: 30 * 60,
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size; zero is raised to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Sets the number of concurrent file downloads; zero is raised to one.
    #[must_use]
    pub fn with_concurrent_files(mut self, concurrent: usize) -> Self {
        self.concurrent_files = concurrent.max(1);
        self
    }

    /// Sets the blob auth policy.
    #[must_use]
    pub const fn with_blob_auth(mut self, auth: BlobAuth) -> Self {
        self.blob_auth = auth;
        self
    }

    /// Sets whether to clean up `.part` files on download error.
    #[must_use]
    pub const fn with_cleanup_on_error(mut self, cleanup: bool) -> Self {
        self.cleanup_on_error = cleanup;
        self
    }

    /// Sets the per-blob timeout; sub-second values are raised to one second.
    #[must_use]
    pub const fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout_secs = if timeout.as_secs() == 0 {
            1
        } else {
            timeout.as_secs()
        };
        self
    }

    /// Returns the per-blob timeout.
    #[must_use]
    pub const fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }
}

/// Local directory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root holding one dated subdirectory per run.
    pub reports_root: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let downloads = dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            reports_root: downloads.join("LC Reports"),
        }
    }
}

impl PathConfig {
    /// Returns the destination folder for a run labelled `label`.
    #[must_use]
    pub fn run_dir(&self, label: &str) -> PathBuf {
        self.reports_root.join(label)
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gateway endpoints.
    pub gateway: GatewayConfig,
    /// Transfer settings.
    pub download: DownloadConfig,
    /// Local paths.
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the default config file location, `<config_dir>/lc-reports/config.toml`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lc-reports")
            .join("config.toml")
    }

    /// Loads the default config file if it exists, otherwise returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.is_file() {
            Self::load_from(&path)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses configuration from TOML; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the TOML is malformed.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }
}
