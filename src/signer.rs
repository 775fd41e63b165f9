//! HMAC request signing for the gateway.
//!
//! Every authenticated request carries an `HMacAuthorizationHeader` of the
//! form `amx {user}:{signature}:{nonce}:{timestamp}`. The signature is an
//! HMAC-SHA256 over `user + method + lower(percent_encode(url)) + timestamp +
//! nonce`, keyed with the base64-decoded HMAC key. The ordering and the
//! lowercase-after-encode step must match the gateway exactly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::Sha256;

use crate::credentials::{Credentials, ENV_HMAC_KEY, ENV_HMAC_USER};
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature.
pub const HMAC_HEADER: &str = "HMacAuthorizationHeader";

/// Everything except ASCII alphanumerics and `-._~` is encoded, including
/// `/`, `:`, `?`, `&` and `=`.
const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes the whole URL and lowercases the result.
#[must_use]
pub fn encode_url(url: &str) -> String {
    utf8_percent_encode(url, URL_ENCODE_SET)
        .to_string()
        .to_ascii_lowercase()
}

/// Returns a fresh 32-digit lowercase hex nonce.
#[must_use]
pub fn new_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Returns the current Unix time in whole seconds.
#[must_use]
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Signs a request with a fresh nonce and the current time.
///
/// # Errors
///
/// Returns [`Error::MissingCredential`] if the HMAC user or key is empty and
/// [`Error::Config`] if the key is not valid base64.
pub fn sign(method: &str, url: &str, credentials: &Credentials) -> Result<String> {
    sign_with(method, url, credentials, &new_nonce(), unix_timestamp())
}

/// Signs a request with an explicit nonce and timestamp.
///
/// # Errors
///
/// Same as [`sign`].
pub fn sign_with(
    method: &str,
    url: &str,
    credentials: &Credentials,
    nonce: &str,
    timestamp: i64,
) -> Result<String> {
    let user = credentials.hmac_user.as_str();
    if user.trim().is_empty() {
        return Err(Error::MissingCredential {
            field: ENV_HMAC_USER,
        });
    }
    let key = decode_key(&credentials.hmac_key)?;

    let raw = format!("{user}{method}{}{timestamp}{nonce}", encode_url(url));
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| Error::Config(format!("invalid HMAC key: {e}")))?;
    mac.update(raw.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    Ok(format!("amx {user}:{signature}:{nonce}:{timestamp}"))
}

fn decode_key(encoded: &str) -> Result<Vec<u8>> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(Error::MissingCredential {
            field: ENV_HMAC_KEY,
        });
    }
    BASE64
        .decode(encoded)
        .map_err(|e| Error::Config(format!("HMAC key is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://portalapi.lcegateway.com/GetReportBlobs?userName=Bob&fileName=all";
    const NONCE: &str = "0123456789abcdef0123456789abcdef";
    const TS: i64 = 1_704_067_200;

    fn creds() -> Credentials {
        // "secret-key" in base64
        Credentials::new("bob", "pw", "hmacuser", "c2VjcmV0LWtleQ==")
    }

    #[test]
    fn encode_url_golden_vector() {
        assert_eq!(
            encode_url(URL),
            "https%3a%2f%2fportalapi.lcegateway.com%2fgetreportblobs%3fusername%3dbob%26filename%3dall"
        );
        assert_eq!(
            encode_url("https://x.test/Get?A=B&C=D"),
            "https%3a%2f%2fx.test%2fget%3fa%3db%26c%3dd"
        );
    }

    #[test]
    fn encode_url_keeps_unreserved() {
        assert_eq!(encode_url("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode_url("a b+c"), "a%20b%2bc");
        assert_eq!(encode_url("é"), "%c3%a9");
    }

    #[test]
    fn header_layout() {
        let header = sign_with("GET", URL, &creds(), NONCE, TS).unwrap();
        let rest = header.strip_prefix("amx ").unwrap();
        let parts: Vec<_> = rest.split(':').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "hmacuser");
        assert_eq!(BASE64.decode(parts[1]).unwrap().len(), 32);
        assert_eq!(parts[2], NONCE);
        assert_eq!(parts[3], "1704067200");
    }

    #[test]
    fn signature_matches_reference_computation() {
        let header = sign_with("GET", URL, &creds(), NONCE, TS).unwrap();

        let raw = format!(
            "hmacuserGET{}{TS}{NONCE}",
            "https%3a%2f%2fportalapi.lcegateway.com%2fgetreportblobs%3fusername%3dbob%26filename%3dall"
        );
        let mut mac = HmacSha256::new_from_slice(b"secret-key").unwrap();
        mac.update(raw.as_bytes());
        let expected = BASE64.encode(mac.finalize().into_bytes());

        assert_eq!(header, format!("amx hmacuser:{expected}:{NONCE}:{TS}"));
    }

    #[test]
    fn signing_is_deterministic() {
        let a = sign_with("GET", URL, &creds(), NONCE, TS).unwrap();
        let b = sign_with("GET", URL, &creds(), NONCE, TS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn signature_changes_with_inputs() {
        let sig = |h: String| h.split(':').nth(1).unwrap().to_string();
        let base = sig(sign_with("GET", URL, &creds(), NONCE, TS).unwrap());
        assert_ne!(base, sig(sign_with("POST", URL, &creds(), NONCE, TS).unwrap()));
        assert_ne!(
            base,
            sig(sign_with("GET", &format!("{URL}x"), &creds(), NONCE, TS).unwrap())
        );
        assert_ne!(base, sig(sign_with("GET", URL, &creds(), NONCE, TS + 1).unwrap()));
    }

    #[test]
    fn method_is_not_case_normalized() {
        let sig = |h: String| h.split(':').nth(1).unwrap().to_string();
        assert_ne!(
            sig(sign_with("GET", URL, &creds(), NONCE, TS).unwrap()),
            sig(sign_with("get", URL, &creds(), NONCE, TS).unwrap())
        );
    }

    #[test]
    fn hmac_user_is_signed_verbatim() {
        let mut c = creds();
        c.hmac_user = " hmacuser".to_string();
        let header = sign_with("GET", URL, &c, NONCE, TS).unwrap();
        assert!(header.starts_with("amx  hmacuser:"));
        assert_ne!(header, sign_with("GET", URL, &creds(), NONCE, TS).unwrap());

        c.hmac_user = "   ".to_string();
        assert!(matches!(
            sign_with("GET", URL, &c, NONCE, TS),
            Err(Error::MissingCredential { field: ENV_HMAC_USER })
        ));
    }

    #[test]
    fn missing_hmac_halves_are_rejected() {
        let mut c = creds();
        c.hmac_key = String::new();
        assert!(matches!(
            sign("GET", URL, &c),
            Err(Error::MissingCredential { field: ENV_HMAC_KEY })
        ));

        let mut c = creds();
        c.hmac_user = String::new();
        assert!(matches!(
            sign("GET", URL, &c),
            Err(Error::MissingCredential { field: ENV_HMAC_USER })
        ));
    }

    #[test]
    fn invalid_base64_key_is_config_error() {
        let mut c = creds();
        c.hmac_key = "not base64!".into();
        assert!(matches!(sign("GET", URL, &c), Err(Error::Config(_))));
    }

    #[test]
    fn nonce_is_32_lower_hex() {
        let nonce = new_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_ne!(nonce, new_nonce());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn encoded_url_is_lowercase_and_unreserved(url in "\\PC{0,64}") {
                let encoded = encode_url(&url);
                prop_assert!(!encoded.chars().any(|c| c.is_ascii_uppercase()));
                prop_assert!(encoded
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-._~%".contains(c)));
            }

            #[test]
            fn encoding_ignores_input_case(url in "[A-Za-z0-9:/?&=.]{0,48}") {
                prop_assert_eq!(encode_url(&url), encode_url(&url.to_ascii_lowercase()));
            }
        }
    }
}
