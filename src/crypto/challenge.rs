use crate::error::NonceError;
use base64::prelude::*;
use rand::{rngs::OsRng, RngCore};

/// Number of random bytes in a nonce value
pub const CHALLENGE_LEN: usize = 32;

/// Generate a cryptographically secure random challenge
///
/// Returns 32 bytes from the operating system random source as a base64 encoded string.
/// Fails with [`NonceError::Entropy`] if the random source cannot be read.
///
/// # Example
/// ```rust
/// use eddsa_jwt::crypto::challenge::generate_challenge;
///
/// let challenge = generate_challenge().unwrap();
/// println!("Challenge: {}", challenge);
/// ```
pub fn generate_challenge() -> Result<String, NonceError> {
    let mut challenge_bytes = [0u8; CHALLENGE_LEN];
    OsRng.try_fill_bytes(&mut challenge_bytes).map_err(|e| {
        tracing::error!(error = %e, "failed to read from the OS random source");
        NonceError::Entropy
    })?;
    Ok(BASE64_STANDARD.encode(challenge_bytes))
}

/// Generate a fresh nonce identifier
pub fn generate_nonce_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
