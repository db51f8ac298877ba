//! Session identity helpers for logging.

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;

/// Bytes of the token digest kept in a session key.
const FINGERPRINT_BYTES: usize = 16;

/// Characters of the fingerprint shown in log lines.
const DISPLAY_CHARS: usize = 8;

/// Identifies a signed-in session in logs. Holds a digest of the bearer
/// token, never the token.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn from_token(token: &str) -> Self {
        let digest = Sha256::digest(token.as_bytes());
        Self(hex::encode(&digest[..FINGERPRINT_BYTES]))
    }

    /// Key for a client that has not logged in yet.
    pub fn anonymous() -> Self {
        Self("anonymous".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.0.get(..DISPLAY_CHARS).unwrap_or(&self.0);
        write!(f, "{shown}...")
    }
}

/// Tags every log line of one pipeline run: millisecond clock plus 24 random
/// bits, both hex.
pub fn generate_correlation_id() -> String {
    let millis = Utc::now().timestamp_millis() as u64;
    let nonce = rand::thread_rng().gen::<u32>() & 0x00FF_FFFF;
    format!("{millis:x}-{nonce:06x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_fingerprint() {
        let a = SessionKey::from_token("token123");
        let b = SessionKey::from_token("token456");

        assert_eq!(a, SessionKey::from_token("token123"));
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), FINGERPRINT_BYTES * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.to_string(), format!("{}...", &a.as_str()[..8]));
    }

    #[test]
    fn test_anonymous_display_is_truncated() {
        assert_eq!(SessionKey::anonymous().to_string(), "anonymou...");
    }

    #[test]
    fn test_correlation_ids_are_distinct() {
        let id = generate_correlation_id();
        let (clock, nonce) = id.split_once('-').unwrap();
        assert!(u64::from_str_radix(clock, 16).is_ok());
        assert_eq!(nonce.len(), 6);
        assert_ne!(id, generate_correlation_id());
    }
}
