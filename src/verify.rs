// src/verify.rs
//! Webhook authenticity checks: Svix-style signatures (incident.io class
//! providers) and single-header generic HMAC, both with a freshness window
//! on the claimed timestamp.

use std::collections::HashMap;

use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("signature does not match payload")]
    InvalidSignature,
    #[error("timestamp outside tolerance window")]
    StaleRequest,
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `webhook-id` / `webhook-timestamp` / `webhook-signature` headers,
    /// signatures of the form `v1,<base64 HMAC>` over `{id}.{ts}.{payload}`.
    Svix,
    /// One `X-Signature` / `X-Hub-Signature-256` header carrying an HMAC of
    /// the raw body, hex (optionally `sha256=`-prefixed) or base64.
    GenericHmac,
}

/// Signature-relevant headers, extracted by the HTTP layer so this module
/// stays framework-free.
#[derive(Debug, Clone, Default)]
pub struct SignatureHeaders {
    pub webhook_id: Option<String>,
    pub timestamp: Option<String>,
    pub signature: Option<String>,
}

/// Per-provider verification config. A provider without a configured secret
/// is an explicit trust decision made at configuration time: the signature
/// step is skipped for it (and logged at startup), never silently defaulted.
#[derive(Debug, Clone, Default)]
pub struct WebhookVerifier {
    secrets: HashMap<String, String>,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secrets: HashMap<String, String>, tolerance_secs: i64) -> Self {
        for provider in secrets.keys() {
            tracing::info!(provider = %provider, "webhook signature verification enabled");
        }
        Self {
            secrets,
            tolerance_secs,
        }
    }

    pub fn secret_for(&self, provider: &str) -> Option<&str> {
        self.secrets.get(provider).map(String::as_str)
    }

    /// Full check for one inbound request: freshness first, then the
    /// scheme's signature recomputation when a secret is configured.
    pub fn check(
        &self,
        scheme: Scheme,
        provider: &str,
        headers: &SignatureHeaders,
        payload: &[u8],
    ) -> Result<(), VerifyError> {
        let now = chrono::Utc::now().timestamp();
        verify(
            scheme,
            headers,
            payload,
            self.secret_for(provider),
            self.tolerance_secs,
            now,
        )
    }
}

/// Verify one payload. `now_unix` is injected so the window is testable.
///
/// The freshness check runs whenever a timestamp is claimed, whether or not
/// a secret is configured: a replayed-old or future-skewed request is
/// rejected with `StaleRequest` either way. Signature recomputation only
/// happens with a configured secret.
pub fn verify(
    scheme: Scheme,
    headers: &SignatureHeaders,
    payload: &[u8],
    secret: Option<&str>,
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), VerifyError> {
    if let Some(ts) = headers.timestamp.as_deref() {
        check_freshness(ts, tolerance_secs, now_unix)?;
    }

    let Some(secret) = secret else {
        return Ok(());
    };

    match scheme {
        Scheme::Svix => verify_svix(headers, payload, secret, tolerance_secs, now_unix),
        Scheme::GenericHmac => verify_generic(headers, payload, secret),
    }
}

fn check_freshness(ts: &str, tolerance_secs: i64, now_unix: i64) -> Result<(), VerifyError> {
    // Unparseable timestamps count as stale, not as absent.
    let claimed: i64 = ts.trim().parse().map_err(|_| VerifyError::StaleRequest)?;
    if (now_unix - claimed).abs() > tolerance_secs {
        return Err(VerifyError::StaleRequest);
    }
    Ok(())
}

fn verify_svix(
    headers: &SignatureHeaders,
    payload: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), VerifyError> {
    let id = headers
        .webhook_id
        .as_deref()
        .ok_or(VerifyError::MissingHeader("webhook-id"))?;
    let ts = headers
        .timestamp
        .as_deref()
        .ok_or(VerifyError::MissingHeader("webhook-timestamp"))?;
    let provided = headers
        .signature
        .as_deref()
        .ok_or(VerifyError::MissingHeader("webhook-signature"))?;

    check_freshness(ts, tolerance_secs, now_unix)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerifyError::InvalidSignature)?;
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    // The header may list several space-separated signatures, each prefixed
    // with a version tag (`v1,<base64>`). Any one match passes.
    let matched = provided
        .split_whitespace()
        .map(|tok| tok.split_once(',').map(|(_, sig)| sig).unwrap_or(tok))
        .any(|sig| constant_time_eq(sig.as_bytes(), expected.as_bytes()));

    if matched {
        Ok(())
    } else {
        Err(VerifyError::InvalidSignature)
    }
}

fn verify_generic(
    headers: &SignatureHeaders,
    payload: &[u8],
    secret: &str,
) -> Result<(), VerifyError> {
    let provided = headers
        .signature
        .as_deref()
        .ok_or(VerifyError::MissingHeader("x-signature"))?;
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerifyError::InvalidSignature)?;
    mac.update(payload);
    let digest = mac.finalize().into_bytes();

    let expected_hex = hex::encode(digest);
    let expected_b64 = general_purpose::STANDARD.encode(digest);

    if constant_time_eq(provided.as_bytes(), expected_hex.as_bytes())
        || constant_time_eq(provided.as_bytes(), expected_b64.as_bytes())
    {
        Ok(())
    } else {
        Err(VerifyError::InvalidSignature)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_testsecret";
    const NOW: i64 = 1_700_000_000;

    fn svix_headers(payload: &[u8], id: &str, ts: i64) -> SignatureHeaders {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{id}.{ts}.").as_bytes());
        mac.update(payload);
        let sig = general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        SignatureHeaders {
            webhook_id: Some(id.to_string()),
            timestamp: Some(ts.to_string()),
            signature: Some(format!("v1,{sig}")),
        }
    }

    #[test]
    fn svix_valid_signature_passes() {
        let payload = br#"{"event_type":"public_incident.incident_created_v2"}"#;
        let headers = svix_headers(payload, "msg_1", NOW - 10);
        assert_eq!(
            verify(Scheme::Svix, &headers, payload, Some(SECRET), 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn svix_old_timestamp_is_stale() {
        let payload = b"{}";
        // signed correctly, but ten minutes in the past
        let headers = svix_headers(payload, "msg_1", NOW - 600);
        assert_eq!(
            verify(Scheme::Svix, &headers, payload, Some(SECRET), 300, NOW),
            Err(VerifyError::StaleRequest)
        );
    }

    #[test]
    fn svix_future_skew_is_stale_too() {
        let payload = b"{}";
        let headers = svix_headers(payload, "msg_1", NOW + 600);
        assert_eq!(
            verify(Scheme::Svix, &headers, payload, Some(SECRET), 300, NOW),
            Err(VerifyError::StaleRequest)
        );
    }

    #[test]
    fn svix_flipped_byte_is_invalid() {
        let payload = br#"{"a":1}"#;
        let mut headers = svix_headers(payload, "msg_1", NOW);
        let mut sig = headers.signature.take().unwrap();
        // flip one character of the base64 body
        let flipped = if sig.ends_with('A') { 'B' } else { 'A' };
        sig.pop();
        sig.push(flipped);
        headers.signature = Some(sig);
        assert_eq!(
            verify(Scheme::Svix, &headers, payload, Some(SECRET), 300, NOW),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn svix_second_signature_in_list_matches() {
        let payload = b"{}";
        let good = svix_headers(payload, "msg_1", NOW);
        let headers = SignatureHeaders {
            signature: Some(format!("v1,AAAA {}", good.signature.clone().unwrap())),
            ..good
        };
        assert_eq!(
            verify(Scheme::Svix, &headers, payload, Some(SECRET), 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn svix_missing_header_is_reported() {
        let headers = SignatureHeaders {
            webhook_id: None,
            timestamp: Some(NOW.to_string()),
            signature: Some("v1,abc".into()),
        };
        assert_eq!(
            verify(Scheme::Svix, &headers, b"{}", Some(SECRET), 300, NOW),
            Err(VerifyError::MissingHeader("webhook-id"))
        );
    }

    #[test]
    fn generic_hex_with_prefix_passes() {
        let payload = b"payload-bytes";
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(payload);
        let hexsig = hex::encode(mac.finalize().into_bytes());
        let headers = SignatureHeaders {
            signature: Some(format!("sha256={hexsig}")),
            ..Default::default()
        };
        assert_eq!(
            verify(Scheme::GenericHmac, &headers, payload, Some(SECRET), 300, NOW),
            Ok(())
        );
    }

    #[test]
    fn generic_wrong_secret_is_invalid() {
        let payload = b"payload-bytes";
        let mut mac = HmacSha256::new_from_slice(b"other-secret").unwrap();
        mac.update(payload);
        let hexsig = hex::encode(mac.finalize().into_bytes());
        let headers = SignatureHeaders {
            signature: Some(hexsig),
            ..Default::default()
        };
        assert_eq!(
            verify(Scheme::GenericHmac, &headers, payload, Some(SECRET), 300, NOW),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn no_secret_skips_signature_but_not_freshness() {
        // trusted provider, no signature at all
        let headers = SignatureHeaders::default();
        assert_eq!(
            verify(Scheme::GenericHmac, &headers, b"{}", None, 300, NOW),
            Ok(())
        );

        // a claimed-but-stale timestamp is still rejected
        let headers = SignatureHeaders {
            timestamp: Some((NOW - 9000).to_string()),
            ..Default::default()
        };
        assert_eq!(
            verify(Scheme::GenericHmac, &headers, b"{}", None, 300, NOW),
            Err(VerifyError::StaleRequest)
        );
    }
}
