//! Ownership tokens

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::error::{LockError, LockResult};

/// Number of random bytes in a token (128 bits)
const TOKEN_BYTES: usize = 16;

/// Length of an encoded token: 16 bytes as unpadded base64
pub const TOKEN_LEN: usize = 22;

/// Generates random tokens from the OS entropy source.
///
/// A scratch buffer is reused across calls; the mutex is only held while
/// the bytes are filled and encoded.
#[derive(Debug, Default)]
pub struct TokenGenerator {
    scratch: Mutex<[u8; TOKEN_BYTES]>,
}

impl TokenGenerator {
    /// Create a new generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh token of exactly [`TOKEN_LEN`] printable characters
    pub fn generate(&self) -> LockResult<String> {
        let mut scratch = self.scratch.lock();
        OsRng
            .try_fill_bytes(&mut scratch[..])
            .map_err(|e| LockError::Randomness(std::io::Error::other(e.to_string())))?;
        Ok(URL_SAFE_NO_PAD.encode(&scratch[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_is_fixed_width_and_printable() {
        let generator = TokenGenerator::new();
        for _ in 0..100 {
            let token = generator.generate().unwrap();
            assert_eq!(token.len(), TOKEN_LEN);
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }

    #[test]
    fn test_tokens_do_not_collide() {
        let generator = TokenGenerator::new();
        let tokens: HashSet<String> = (0..10_000).map(|_| generator.generate().unwrap()).collect();
        assert_eq!(tokens.len(), 10_000);
    }
}
