//! Webhook resume authentication.
//!
//! Two schemes, checked before any payload parsing:
//! - shared secret in the `X-Resume-Secret` header, compared in constant
//!   time against the secret stored with the pause;
//! - HMAC-SHA256 over the raw body in `X-Hub-Signature-256` (GitHub-style
//!   `sha256=<hex>` prefix accepted).

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the shared resume secret.
pub const RESUME_SECRET_HEADER: &str = "x-resume-secret";
/// Header carrying an HMAC signature of the body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Errors from webhook authentication.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing authentication: {0}")]
    MissingAuth(String),

    #[error("resume secret verification failed")]
    SecretMismatch,

    #[error("HMAC signature verification failed")]
    HmacVerificationFailed,

    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Verify the shared resume secret using constant-time comparison.
pub fn verify_resume_secret(expected: &str, provided: Option<&str>) -> Result<(), WebhookError> {
    let provided = provided.ok_or_else(|| {
        WebhookError::MissingAuth(format!("{RESUME_SECRET_HEADER} header required"))
    })?;
    if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(WebhookError::SecretMismatch)
    }
}

/// Verify an HMAC-SHA256 signature against a request body.
///
/// Uses constant-time comparison to prevent timing attacks.
pub fn verify_hmac_sha256(
    secret: &[u8],
    body: &[u8],
    signature_hex: &str,
) -> Result<(), WebhookError> {
    let expected_bytes =
        hex_decode(signature_hex).map_err(|_| WebhookError::HmacVerificationFailed)?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| WebhookError::InvalidKey(e.to_string()))?;
    mac.update(body);

    mac.verify_slice(&expected_bytes)
        .map_err(|_| WebhookError::HmacVerificationFailed)
}

/// Verify an HMAC-SHA256 signature with an optional `sha256=` prefix.
pub fn verify_hmac_sha256_with_prefix(
    secret: &[u8],
    body: &[u8],
    signature: &str,
) -> Result<(), WebhookError> {
    let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    verify_hmac_sha256(secret, body, hex_sig)
}

/// Compute HMAC-SHA256 and return the hex-encoded signature. Used for
/// generating test vectors.
pub fn compute_hmac_sha256_hex(secret: &[u8], body: &[u8]) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| WebhookError::InvalidKey(e.to_string()))?;
    mac.update(body);
    Ok(hex_encode(&mac.finalize().into_bytes()))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time byte comparison (XOR-based). Time taken is independent of
/// how many bytes match.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_secret_accepts_match() {
        assert!(verify_resume_secret("s3cret", Some("s3cret")).is_ok());
    }

    #[test]
    fn resume_secret_rejects_mismatch_and_absence() {
        assert!(matches!(
            verify_resume_secret("s3cret", Some("wrong")),
            Err(WebhookError::SecretMismatch)
        ));
        assert!(matches!(
            verify_resume_secret("s3cret", None),
            Err(WebhookError::MissingAuth(_))
        ));
    }

    #[test]
    fn hmac_roundtrip_verifies() {
        let secret = b"shared-secret";
        let body = br#"{"event":"push"}"#;
        let sig = compute_hmac_sha256_hex(secret, body).unwrap();

        assert!(verify_hmac_sha256(secret, body, &sig).is_ok());
        assert!(verify_hmac_sha256_with_prefix(secret, body, &format!("sha256={sig}")).is_ok());
    }

    #[test]
    fn hmac_rejects_tampered_body() {
        let secret = b"shared-secret";
        let sig = compute_hmac_sha256_hex(secret, b"original").unwrap();
        assert!(matches!(
            verify_hmac_sha256(secret, b"tampered", &sig),
            Err(WebhookError::HmacVerificationFailed)
        ));
    }

    #[test]
    fn hmac_rejects_malformed_hex() {
        assert!(verify_hmac_sha256(b"k", b"body", "zz-not-hex").is_err());
        assert!(verify_hmac_sha256(b"k", b"body", "abc").is_err());
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
