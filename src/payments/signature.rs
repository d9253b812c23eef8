use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why an inbound webhook delivery failed authentication. `MissingHeader`
/// and `Malformed` are caller errors; the rest are trust failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    MissingHeader,
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature timestamp outside tolerance window")]
    StaleTimestamp,
    #[error("signature does not match payload")]
    Mismatch,
}

/// Verifies gateway signatures of the form `t=<unix>,v1=<hex hmac>`, where
/// the HMAC-SHA256 is taken over `"{t}.{raw body}"` with the shared secret.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Checks `header` against the raw `payload`. Fails closed on any
    /// missing or unparseable input; never inspects the payload first.
    pub fn verify(&self, header: Option<&str>, payload: &[u8]) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;

        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", val)) => timestamp = val.parse().ok(),
                Some(("v1", val)) => candidates.push(val),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }

        let now = chrono::Utc::now().timestamp();
        if (now - timestamp).unsigned_abs() > self.tolerance_secs {
            return Err(SignatureError::StaleTimestamp);
        }

        let expected = compute_signature(&self.secret, timestamp, payload);
        if candidates.iter().any(|sig| constant_time_eq(&expected, sig)) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds a `t=...,v1=...` header for the given payload. Used by the test
/// suites and by local tooling that replays deliveries.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        compute_signature(secret, timestamp, payload)
    )
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SECRET, 300)
    }

    #[test]
    fn accepts_freshly_signed_payload() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, chrono::Utc::now().timestamp(), payload);

        assert_eq!(verifier().verify(Some(&header), payload), Ok(()));
    }

    #[test]
    fn rejects_missing_header() {
        assert_eq!(
            verifier().verify(None, b"{}"),
            Err(SignatureError::MissingHeader)
        );
    }

    #[test]
    fn rejects_malformed_header() {
        assert_eq!(
            verifier().verify(Some("v1=deadbeef"), b"{}"),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verifier().verify(Some("t=notanumber,v1=deadbeef"), b"{}"),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verifier().verify(Some("t=123"), b"{}"),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn rejects_tampered_payload() {
        let header = signature_header(SECRET, chrono::Utc::now().timestamp(), b"original");

        assert_eq!(
            verifier().verify(Some(&header), b"tampered"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = signature_header("whsec_other", chrono::Utc::now().timestamp(), b"{}");

        assert_eq!(
            verifier().verify(Some(&header), b"{}"),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let old = chrono::Utc::now().timestamp() - 3600;
        let header = signature_header(SECRET, old, b"{}");

        assert_eq!(
            verifier().verify(Some(&header), b"{}"),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let payload = b"body";
        let ts = chrono::Utc::now().timestamp();
        let good = signature_header(SECRET, ts, payload);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", ts, "0".repeat(64), good_sig);

        assert_eq!(verifier().verify(Some(&header), payload), Ok(()));
    }
}
