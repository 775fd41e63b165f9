//! Report catalog retrieval.
//!
//! The catalog endpoint answers with a JSON *string* whose content is itself
//! a JSON array of `{ "ReportName": ..., "ReportBlobUri": ... }` objects, so
//! the body is decoded twice. Callers only ever see [`ReportEntry`] values.

use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::format::snippet;
use crate::signer::{self, HMAC_HEADER};
use crate::token::AccessToken;

/// Sentinel `fileName` value meaning "list everything".
pub const ALL_FILES: &str = "all";

/// One downloadable report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportEntry {
    /// Report file name, used as the local leaf name.
    pub name: String,
    /// Location of the report blob.
    pub source_uri: String,
}

impl ReportEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(name: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_uri: source_uri.into(),
        }
    }
}

/// Builds the catalog URL for `username`.
///
/// The returned URL is both signed and sent, so the signed string always
/// matches the request line.
///
/// # Errors
///
/// Returns [`Error::Config`] if the configured endpoint is not a valid URL.
pub fn catalog_url(gateway: &GatewayConfig, username: &str) -> Result<Url> {
    Url::parse_with_params(
        &gateway.reports_url,
        &[("userName", username), ("fileName", ALL_FILES)],
    )
    .map_err(|e| Error::Config(format!("invalid reports url {}: {e}", gateway.reports_url)))
}

/// Fetches the full catalog for the gateway user in `credentials`.
///
/// # Errors
///
/// - [`Error::Authentication`] when the gateway answers 401.
/// - [`Error::Status`] for other non-success statuses.
/// - [`Error::Protocol`] when the body is not a string-wrapped JSON array.
/// - [`Error::Network`] on connectivity failures.
/// - Signing errors from [`signer::sign`].
pub async fn fetch_catalog(
    http: &reqwest::Client,
    gateway: &GatewayConfig,
    token: &AccessToken,
    credentials: &Credentials,
) -> Result<Vec<ReportEntry>> {
    let url = catalog_url(gateway, &credentials.gateway_username)?;
    let signature = signer::sign("GET", url.as_str(), credentials)?;
    log::info!("Requesting report list from {url}");

    let response = http
        .get(url.clone())
        .timeout(gateway.request_timeout())
        .header(AUTHORIZATION, token.bearer())
        .header(CONTENT_TYPE, "application/json")
        .header(HMAC_HEADER, signature)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            url: url.to_string(),
            status: status.as_u16(),
            body: snippet(&body),
        });
    }
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: snippet(&body),
        });
    }

    let entries = decode_catalog(&body).map_err(|message| Error::Protocol {
        url: url.to_string(),
        message,
        snippet: snippet(&body),
    })?;
    log::info!("Found {} reports", entries.len());
    Ok(entries)
}

/// Decodes a string-wrapped catalog body, dropping rows without a name or URI.
///
/// # Errors
///
/// Returns a description of the failure if either decode step fails or the
/// payload is not an array.
pub fn decode_catalog(body: &str) -> std::result::Result<Vec<ReportEntry>, String> {
    let inner: String = serde_json::from_str(body)
        .map_err(|e| format!("catalog body is not a JSON string: {e}"))?;
    let rows: Value = serde_json::from_str(&inner)
        .map_err(|e| format!("catalog payload is not valid JSON: {e}"))?;
    let Value::Array(rows) = rows else {
        return Err(format!("expected a list of reports, got {}", kind(&rows)));
    };

    let total = rows.len();
    let entries: Vec<_> = rows.iter().filter_map(entry_from_row).collect();
    if entries.len() < total {
        log::warn!(
            "Skipped {} malformed catalog row(s)",
            total - entries.len()
        );
    }
    Ok(entries)
}

fn entry_from_row(row: &Value) -> Option<ReportEntry> {
    let field = |key: &str| {
        row.get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    };
    Some(ReportEntry::new(field("ReportName")?, field("ReportBlobUri")?))
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
