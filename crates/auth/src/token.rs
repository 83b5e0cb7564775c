use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Opaque bearer token identifying one session.
///
/// Tokens are hex-encoded bytes drawn from the operating system CSPRNG.
/// `Debug` only prints a short fingerprint so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a token received from a client. No format checks are applied; an
    /// unknown token simply fails to resolve.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a fresh token from `byte_len` random bytes (`2 * byte_len` hex chars).
    pub fn generate(byte_len: usize) -> Self {
        let mut bytes = vec![0u8; byte_len];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First characters of the token, safe to log for correlation.
    pub fn fingerprint(&self) -> &str {
        fingerprint(&self.0)
    }
}

pub(crate) fn fingerprint(raw: &str) -> &str {
    let end = raw
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    &raw[..end]
}

impl core::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SessionToken({}…)", self.fingerprint())
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn default_length_gives_64_hex_characters() {
        let token = SessionToken::generate(32);
        assert_eq!(token.as_str().len(), 64);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_tokens_do_not_repeat() {
        let tokens: HashSet<_> = (0..1_000).map(|_| SessionToken::generate(16)).collect();
        assert_eq!(tokens.len(), 1_000);
    }

    #[test]
    fn debug_output_hides_the_token() {
        let token = SessionToken::new("0123456789abcdef0123456789abcdef");
        let printed = format!("{token:?}");
        assert!(printed.contains("01234567"));
        assert!(!printed.contains("89abcdef0123"));
    }

    #[test]
    fn fingerprint_of_short_token_is_whole_token() {
        assert_eq!(SessionToken::new("abc").fingerprint(), "abc");
        assert_eq!(SessionToken::new("").fingerprint(), "");
    }
}
