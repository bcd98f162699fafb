use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::VerifyError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted distance between the request timestamp and the local clock.
pub const REPLAY_WINDOW_SECS: u64 = 60 * 5;

const VERSION: &str = "v0";

/// Checks `X-Slack-Signature` / `X-Slack-Request-Timestamp` against a shared
/// signing secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    signing_secret: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
        }
    }

    pub fn verify(&self, timestamp: &str, signature: &str, body: &[u8]) -> Result<(), VerifyError> {
        self.verify_at(timestamp, signature, body, chrono::Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) with an explicit current Unix time.
    pub fn verify_at(
        &self,
        timestamp: &str,
        signature: &str,
        body: &[u8],
        now: i64,
    ) -> Result<(), VerifyError> {
        let request_timestamp: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| VerifyError::InvalidTimestamp)?;

        let skew_secs = now.abs_diff(request_timestamp);
        if skew_secs > REPLAY_WINDOW_SECS {
            return Err(VerifyError::StaleTimestamp { skew_secs });
        }

        let expected = signature
            .strip_prefix("v0=")
            .filter(|hex_sig| is_lower_hex(hex_sig))
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or(VerifyError::SignatureMismatch)?;

        // verify_slice compares in constant time
        mac_for(&self.signing_secret, timestamp, body)
            .verify_slice(&expected)
            .map_err(|_| VerifyError::SignatureMismatch)
    }
}

/// Computes the `X-Slack-Signature` header value for a request.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let result = mac_for(signing_secret, timestamp, body).finalize();
    format!("{}={}", VERSION, hex::encode(result.into_bytes()))
}

/// The header carries lowercase hex only.
fn is_lower_hex(hex_sig: &str) -> bool {
    hex_sig
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn mac_for(signing_secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so this never fails
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC key of any size is valid"));
    mac.update(VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac
}
