//! Gateway and HMAC credentials.

use std::fmt;

use crate::error::{Error, Result};

/// Environment variable holding the gateway username.
pub const ENV_GATEWAY_USERNAME: &str = "GATEWAY_USERNAME";
/// Environment variable holding the gateway password.
pub const ENV_GATEWAY_PASSWORD: &str = "GATEWAY_PASSWORD";
/// Environment variable holding the HMAC user.
pub const ENV_HMAC_USER: &str = "HMAC_USER";
/// Environment variable holding the base64-encoded HMAC key.
pub const ENV_HMAC_KEY: &str = "HMAC_KEY";

/// Credentials for one synchronization session.
///
/// Passed explicitly into every operation that needs them. The engine never
/// stores them anywhere else.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Gateway account username, also sent as the catalog `userName`.
    pub gateway_username: String,
    /// Gateway account password.
    pub gateway_password: String,
    /// HMAC user embedded in every signature header.
    pub hmac_user: String,
    /// HMAC key, base64-encoded.
    pub hmac_key: String,
}

impl Credentials {
    /// Creates a credential set from its four parts.
    #[must_use]
    pub fn new(
        gateway_username: impl Into<String>,
        gateway_password: impl Into<String>,
        hmac_user: impl Into<String>,
        hmac_key: impl Into<String>,
    ) -> Self {
        Self {
            gateway_username: gateway_username.into(),
            gateway_password: gateway_password.into(),
            hmac_user: hmac_user.into(),
            hmac_key: hmac_key.into(),
        }
    }

    /// Reads credentials from `GATEWAY_USERNAME`, `GATEWAY_PASSWORD`,
    /// `HMAC_USER` and `HMAC_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] naming the first variable that is
    /// unset or empty.
    pub fn from_env() -> Result<Self> {
        let read = |field: &'static str| {
            std::env::var(field)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or(Error::MissingCredential { field })
        };
        Ok(Self {
            gateway_username: read(ENV_GATEWAY_USERNAME)?,
            gateway_password: read(ENV_GATEWAY_PASSWORD)?,
            hmac_user: read(ENV_HMAC_USER)?,
            hmac_key: read(ENV_HMAC_KEY)?,
        })
    }

    /// Checks that every credential is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] for the first empty field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            (ENV_GATEWAY_USERNAME, &self.gateway_username),
            (ENV_GATEWAY_PASSWORD, &self.gateway_password),
            (ENV_HMAC_USER, &self.hmac_user),
            (ENV_HMAC_KEY, &self.hmac_key),
        ];
        match fields.into_iter().find(|(_, v)| v.trim().is_empty()) {
            Some((field, _)) => Err(Error::MissingCredential { field }),
            None => Ok(()),
        }
    }
}

fn mask(value: &str) -> String {
    "*".repeat(value.chars().count())
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("gateway_username", &self.gateway_username)
            .field("gateway_password", &mask(&self.gateway_password))
            .field("hmac_user", &self.hmac_user)
            .field("hmac_key", &mask(&self.hmac_key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_reports_first_missing_field() {
        let creds = Credentials::new("bob", "pw", "", "a2V5");
        assert!(matches!(
            creds.validate(),
            Err(Error::MissingCredential { field: ENV_HMAC_USER })
        ));
        assert!(Credentials::new("bob", "pw", "hm", "a2V5").validate().is_ok());
    }

    #[test]
    fn whitespace_counts_as_missing() {
        let creds = Credentials::new("  ", "pw", "hm", "a2V5");
        assert!(matches!(
            creds.validate(),
            Err(Error::MissingCredential { field: ENV_GATEWAY_USERNAME })
        ));
    }

    #[test]
    fn debug_masks_secrets() {
        let creds = Credentials::new("bob", "hunter2", "hm", "c2VjcmV0");
        let out = format!("{creds:?}");
        assert!(out.contains("bob"));
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("c2VjcmV0"));
        assert!(out.contains("*******"));
    }
}
