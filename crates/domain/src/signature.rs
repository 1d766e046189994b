//! HMAC-SHA256 authentication of webhook deliveries.
//!
//! The MAC is always computed over the body bytes exactly as they arrived on
//! the wire. Re-encoding parsed JSON changes key order and whitespace and
//! would reject genuine deliveries.

use hex::encode as hex_encode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("missing webhook signature")]
    MissingSignature,
    #[error("webhook signature does not match payload")]
    InvalidSignature,
    #[error("webhook secret cannot be used as an HMAC key")]
    UnreadableSecret,
}

/// Computes the lowercase hex HMAC-SHA256 of `raw_body` keyed by `secret`.
pub fn compute_signature(raw_body: &[u8], secret: &[u8]) -> Result<String, AuthenticationError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| AuthenticationError::UnreadableSecret)?;
    mac.update(raw_body);
    Ok(hex_encode(mac.finalize().into_bytes()))
}

/// Returns `true` only when `claimed` equals the lowercase hex MAC of
/// `raw_body`. Never panics; internal failures read as "not authenticated".
pub fn verify_signature(raw_body: &[u8], claimed: &str, secret: &[u8]) -> bool {
    let Ok(expected) = compute_signature(raw_body, secret) else {
        return false;
    };
    let expected = expected.as_bytes();
    let claimed = claimed.as_bytes();

    // Length is public (always 64); only the contents need constant time.
    expected.len() == claimed.len() && bool::from(expected.ct_eq(claimed))
}

/// Holds the shared secret so callers do not thread it through every request.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    pub fn verify(&self, raw_body: &[u8], claimed: &str) -> bool {
        verify_signature(raw_body, claimed, &self.secret)
    }

    /// Like [`verify`](Self::verify) but distinguishes an absent signature
    /// from a mismatched one.
    pub fn authenticate(
        &self,
        raw_body: &[u8],
        claimed: Option<&str>,
    ) -> Result<(), AuthenticationError> {
        let claimed = claimed.ok_or(AuthenticationError::MissingSignature)?;
        if self.verify(raw_body, claimed) {
            Ok(())
        } else {
            Err(AuthenticationError::InvalidSignature)
        }
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}
