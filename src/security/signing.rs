//! HMAC-SHA256 signed envelopes and random tokens.
//!
//! An envelope is `hex(data).hex(hmac)`. It makes stored values
//! tamper-evident; it does not hide them.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EnvelopeError {
    #[error("envelope is malformed")]
    Malformed,

    #[error("envelope signature does not match")]
    BadSignature,
}

fn mac_for(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail.
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid")
}

/// Wrap `data` in a signed envelope.
pub fn seal(data: &str, secret: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(data.as_bytes());
    let signature = mac.finalize().into_bytes();
    format!("{}.{}", hex::encode(data.as_bytes()), hex::encode(signature))
}

/// Verify an envelope and return the original data.
pub fn open(envelope: &str, secret: &str) -> Result<String, EnvelopeError> {
    let (data_hex, sig_hex) = envelope.split_once('.').ok_or(EnvelopeError::Malformed)?;
    let data = hex::decode(data_hex).map_err(|_| EnvelopeError::Malformed)?;
    let signature = hex::decode(sig_hex).map_err(|_| EnvelopeError::Malformed)?;

    let mut mac = mac_for(secret);
    mac.update(&data);
    // Constant-time comparison
    mac.verify_slice(&signature)
        .map_err(|_| EnvelopeError::BadSignature)?;

    String::from_utf8(data).map_err(|_| EnvelopeError::Malformed)
}

/// Hex string built from `bytes` random bytes.
pub fn generate_secure_token(bytes: usize) -> String {
    let buf: Vec<u8> = (0..bytes).map(|_| rand::random::<u8>()).collect();
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_data_opens_with_same_secret() {
        let envelope = seal("dropbox-token-123", "k1");
        assert!(!envelope.contains("dropbox-token-123"));
        assert_eq!(open(&envelope, "k1").unwrap(), "dropbox-token-123");
    }

    #[test]
    fn wrong_secret_fails() {
        let envelope = seal("payload", "k1");
        assert_eq!(open(&envelope, "k2"), Err(EnvelopeError::BadSignature));
    }

    #[test]
    fn tampered_data_fails() {
        let envelope = seal("payload", "k1");
        let (_, sig) = envelope.split_once('.').unwrap();
        let forged = format!("{}.{}", hex::encode("payloae"), sig);
        assert_eq!(open(&forged, "k1"), Err(EnvelopeError::BadSignature));
    }

    #[test]
    fn malformed_envelopes_fail() {
        assert_eq!(open("no-dot-here", "k"), Err(EnvelopeError::Malformed));
        assert_eq!(open("zz.zz", "k"), Err(EnvelopeError::Malformed));
    }

    #[test]
    fn tokens_have_requested_length() {
        let a = generate_secure_token(32);
        let b = generate_secure_token(32);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(generate_secure_token(4).len(), 8);
    }
}
