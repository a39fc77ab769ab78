//! HMAC signing for outgoing automation webhooks.
//!
//! Every delivery carries `X-Salesdocs-Timestamp` and `X-Salesdocs-Signature`
//! headers. The signature covers `{timestamp}.{body}` so a captured payload
//! cannot be replayed later with a fresh timestamp.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "X-Salesdocs-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Salesdocs-Signature";

/// Generate the hex HMAC-SHA256 signature for a webhook delivery.
pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(format!("{}.{}", timestamp, body).as_bytes());
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Verify a webhook signature using constant-time comparison.
pub fn verify_payload(
    secret: &str,
    timestamp: i64,
    body: &str,
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = sign_payload(secret, timestamp, body)?;

    let expected_bytes = expected.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let secret = "whsec_automation";
        let body = r#"{"event_type":"invoice.paid"}"#;
        let timestamp = 1767225600;

        let signature = sign_payload(secret, timestamp, body).unwrap();
        assert!(!signature.is_empty());
        assert!(verify_payload(secret, timestamp, body, &signature).unwrap());
    }

    #[test]
    fn tampered_body_fails_verification() {
        let secret = "whsec_automation";
        let timestamp = 1767225600;
        let signature =
            sign_payload(secret, timestamp, r#"{"event_type":"invoice.paid"}"#).unwrap();

        let tampered = r#"{"event_type":"invoice.cancelled"}"#;
        assert!(!verify_payload(secret, timestamp, tampered, &signature).unwrap());
    }

    #[test]
    fn shifted_timestamp_fails_verification() {
        let secret = "whsec_automation";
        let body = r#"{"event_type":"invoice.paid"}"#;
        let signature = sign_payload(secret, 1767225600, body).unwrap();

        assert!(!verify_payload(secret, 1767225601, body, &signature).unwrap());
    }
}
