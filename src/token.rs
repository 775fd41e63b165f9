//! Password-grant token acquisition.

use std::fmt;

use serde_json::Value;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::format::snippet;

/// Short-lived bearer token for one session.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw bearer string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Exchanges gateway credentials for a bearer token.
///
/// # Errors
///
/// - [`Error::Authentication`] when the endpoint answers 401.
/// - [`Error::Network`] on connectivity failures and timeouts.
/// - [`Error::Status`] for any other non-success status.
/// - [`Error::Protocol`] when the body has no string `access_token`.
pub async fn acquire_token(
    http: &reqwest::Client,
    gateway: &GatewayConfig,
    username: &str,
    password: &str,
) -> Result<AccessToken> {
    let url = gateway.token_url.as_str();
    log::debug!("Requesting token from {url} for {username}");

    let response = http
        .post(url)
        .timeout(gateway.request_timeout())
        .form(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ])
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

    parse_token(url, &body)
}

fn parse_token(url: &str, body: &str) -> Result<AccessToken> {
    let protocol = |message: &str| Error::Protocol {
        url: url.to_string(),
        message: message.to_string(),
        snippet: snippet(body),
    };
    let value: Value =
        serde_json::from_str(body).map_err(|_| protocol("token response is not JSON"))?;
    match value.get("access_token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
        _ => Err(protocol("token response has no access_token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_access_token() {
        let token = parse_token("u", r#"{"access_token":"abc","token_type":"bearer"}"#).unwrap();
        assert_eq!(token.as_str(), "abc");
        assert_eq!(token.bearer(), "Bearer abc");
    }

    #[test]
    fn missing_field_is_protocol_error() {
        assert!(matches!(
            parse_token("u", r#"{"token":"abc"}"#),
            Err(Error::Protocol { .. })
        ));
        assert!(matches!(
            parse_token("u", r#"{"access_token":42}"#),
            Err(Error::Protocol { .. })
        ));
        assert!(matches!(parse_token("u", "<html>"), Err(Error::Protocol { .. })));
    }

    #[test]
    fn debug_hides_token() {
        assert_eq!(format!("{:?}", AccessToken::new("secret")), "AccessToken(***)");
    }
}
