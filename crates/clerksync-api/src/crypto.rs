//! Webhook signature verification.
//!
//! The identity provider delivers webhooks through Svix, which signs each
//! message with HMAC-SHA256 over `"{id}.{timestamp}.{body}"` and sends the
//! result in a space-separated list of versioned signatures. Verification
//! checks the timestamp window before comparing signatures in constant time.

use std::{fmt, time::Duration};

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of secrets as shown in the provider's dashboard.
pub const SECRET_PREFIX: &str = "whsec_";

/// Default accepted distance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

const SIGNATURE_VERSION: &str = "v1";

/// Names of the three signature headers, branded and unbranded.
const ID_HEADERS: [&str; 2] = ["svix-id", "webhook-id"];
const TIMESTAMP_HEADERS: [&str; 2] = ["svix-timestamp", "webhook-timestamp"];
const SIGNATURE_HEADERS: [&str; 2] = ["svix-signature", "webhook-signature"];

/// Signature validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// A required header was absent or not valid UTF-8.
    MissingHeader(&'static str),
    /// Timestamp header is not a Unix timestamp.
    InvalidTimestamp(String),
    /// Timestamp is outside the accepted window.
    TimestampOutOfTolerance {
        /// Signed timestamp.
        timestamp: i64,
        /// Local time the check ran at.
        now: i64,
    },
    /// No `v1` entry in the signature header.
    InvalidFormat(String),
    /// No signature matched.
    VerificationFailed,
    /// Signing secret is empty or not base64.
    InvalidSecret,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader(name) => write!(f, "signature header missing: {name}"),
            Self::InvalidTimestamp(value) => write!(f, "invalid signature timestamp: {value}"),
            Self::TimestampOutOfTolerance { timestamp, now } => {
                write!(f, "signature timestamp {timestamp} outside tolerance (now {now})")
            },
            Self::InvalidFormat(format) => write!(f, "invalid signature format: {format}"),
            Self::VerificationFailed => write!(f, "signature verification failed"),
            Self::InvalidSecret => write!(f, "invalid secret key"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Signature headers of a single delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// Message id, stable across retries of the same message.
    pub id: String,
    /// Raw timestamp header value.
    pub timestamp: String,
    /// Raw signature header value.
    pub signature: String,
}

impl SignatureHeaders {
    /// Reads the signature headers, preferring `svix-*` over `webhook-*`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::MissingHeader` naming the first absent header.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, SignatureError> {
        Ok(Self {
            id: header_value(headers, ID_HEADERS)?,
            timestamp: header_value(headers, TIMESTAMP_HEADERS)?,
            signature: header_value(headers, SIGNATURE_HEADERS)?,
        })
    }
}

fn header_value(headers: &HeaderMap, names: [&'static str; 2]) -> Result<String, SignatureError> {
    names
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(SignatureError::MissingHeader(names[0]))
}

/// Decodes a `whsec_`-prefixed (or bare) base64 secret into key bytes.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret is empty or not
/// valid base64.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, SignatureError> {
    let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
    if encoded.is_empty() {
        return Err(SignatureError::InvalidSecret);
    }

    STANDARD.decode(encoded).map_err(|_| SignatureError::InvalidSecret)
}

/// Verifies a delivery against the current time.
///
/// # Errors
///
/// Returns the first reason the delivery is not authentic.
pub fn verify_webhook(
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
    tolerance: Duration,
) -> Result<(), SignatureError> {
    verify_webhook_at(headers, body, secret, tolerance, chrono::Utc::now().timestamp())
}

/// Verifies a delivery as if the current Unix time were `now`.
///
/// # Errors
///
/// Returns the first reason the delivery is not authentic.
pub fn verify_webhook_at(
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
    tolerance: Duration,
    now: i64,
) -> Result<(), SignatureError> {
    let key = decode_secret(secret)?;
    let signed = SignatureHeaders::from_headers(headers)?;

    let timestamp: i64 = signed
        .timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::InvalidTimestamp(signed.timestamp.clone()))?;

    if timestamp.abs_diff(now) > tolerance.as_secs() {
        return Err(SignatureError::TimestampOutOfTolerance { timestamp, now });
    }

    let expected = compute_signature(&key, &signed.id, timestamp, body)?;

    let mut saw_v1 = false;
    for entry in signed.signature.split_whitespace() {
        let Some((version, signature)) = entry.split_once(',') else { continue };
        if version != SIGNATURE_VERSION {
            continue;
        }
        saw_v1 = true;
        if timing_safe_eq(signature, &expected) {
            return Ok(());
        }
    }

    if saw_v1 {
        Err(SignatureError::VerificationFailed)
    } else {
        Err(SignatureError::InvalidFormat(format!(
            "expected space-separated '{SIGNATURE_VERSION},<base64>' entries"
        )))
    }
}

/// Produces a signature header value for a payload.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret cannot be decoded.
///
/// # Example
///
/// ```
/// use clerksync_api::crypto::sign_payload;
///
/// let header = sign_payload("msg_1", 1_700_000_000, b"{}", "whsec_c2VjcmV0").unwrap();
/// assert!(header.starts_with("v1,"));
/// ```
pub fn sign_payload(
    msg_id: &str,
    timestamp: i64,
    body: &[u8],
    secret: &str,
) -> Result<String, SignatureError> {
    let key = decode_secret(secret)?;
    let signature = compute_signature(&key, msg_id, timestamp, body)?;
    Ok(format!("{SIGNATURE_VERSION},{signature}"))
}

fn compute_signature(
    key: &[u8],
    msg_id: &str,
    timestamp: i64,
    body: &[u8],
) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidSecret)?;

    mac.update(msg_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.as_bytes().iter().zip(b.as_bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}
