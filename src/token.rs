//! Opaque token generation.
//!
//! Tokens are random bytes from the OS CSPRNG, hex-encoded. They double as the
//! registry key, so a failed entropy read is an error and never an empty token.

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Minimum number of random bytes in a token.
pub const MIN_TOKEN_BYTES: usize = 10;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token length {0} is below the minimum of {min} bytes", min = MIN_TOKEN_BYTES)]
    TooShort(usize),

    #[error("entropy source failed: {0}")]
    Entropy(#[from] rand::Error),
}

/// Generate a token of `len` random bytes (hex string of `2 * len` chars).
pub fn generate_token(len: usize) -> Result<String, TokenError> {
    generate_token_with(&mut OsRng, len)
}

/// Same as [`generate_token`] but with a caller-supplied RNG.
pub fn generate_token_with<R: RngCore + ?Sized>(
    rng: &mut R,
    len: usize,
) -> Result<String, TokenError> {
    if len < MIN_TOKEN_BYTES {
        return Err(TokenError::TooShort(len));
    }
    let mut buf = vec![0u8; len];
    rng.try_fill_bytes(&mut buf)?;
    Ok(hex::encode(buf))
}
