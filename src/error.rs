//! Error types for the lc-reports library.

use thiserror::Error;

/// Errors that can occur while synchronizing reports from the gateway.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is invalid or incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required credential is absent or empty.
    #[error("Configuration error: missing credential `{field}`")]
    MissingCredential {
        /// Name of the missing credential.
        field: &'static str,
    },

    /// The gateway rejected the supplied credentials.
    #[error("Authentication rejected by {url} (status {status}): {body}")]
    Authentication {
        /// Request URL.
        url: String,
        /// HTTP status code returned.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// Connectivity failure or timeout.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("Request to {url} failed with status {status}: {body}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code returned.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The response does not have the documented shape.
    #[error("Unexpected response from {url}: {message} (body: {snippet})")]
    Protocol {
        /// Request URL.
        url: String,
        /// What was wrong with the response.
        message: String,
        /// Truncated raw response body.
        snippet: String,
    },

    /// A single file could not be downloaded.
    #[error("Download of {name} failed: {source}")]
    Transfer {
        /// Report name.
        name: String,
        /// Underlying cause.
        source: Box<Error>,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Wraps an error as the failure of the named transfer.
    #[must_use]
    pub fn transfer(name: impl Into<String>, source: Self) -> Self {
        Self::Transfer {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Returns true for errors that leave nothing useful to attempt in the session.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::MissingCredential { .. }
                | Self::Authentication { .. }
                | Self::Protocol { .. }
        )
    }
}

/// A specialized `Result` type for lc-reports operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_error_names_file_and_cause() {
        let err = Error::transfer("a_2024-01-01.csv", Error::Cancelled);
        assert_eq!(err.to_string(), "Download of a_2024-01-01.csv failed: Cancelled");
        assert!(!err.is_session_fatal());
    }

    #[test]
    fn credential_and_auth_errors_are_fatal() {
        assert!(Error::MissingCredential { field: "HMAC_KEY" }.is_session_fatal());
        assert!(
            Error::Authentication {
                url: "https://gw/Token".into(),
                status: 401,
                body: String::new(),
            }
            .is_session_fatal()
        );
        assert!(!Error::Io(std::io::Error::other("disk")).is_session_fatal());
    }
}
