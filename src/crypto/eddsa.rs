use crate::{
    crypto::keys::{KeyPair, PublicJwk},
    error::Result,
};
use ed25519_dalek::{Signature, Signer};

/// Length of an Ed25519 signature in bytes
pub const SIGNATURE_LEN: usize = 64;

/// Sign a message with the holder's private key
///
/// Ed25519 signatures are deterministic: the same key and message always produce the same
/// signature. The message must be byte-identical to what the verifier reconstructs.
pub fn sign(keypair: &KeyPair, message: &[u8]) -> [u8; SIGNATURE_LEN] {
    keypair.signing_key().sign(message).to_bytes()
}

/// Verify an Ed25519 signature against a message using a public JWK
///
/// # Arguments
/// * `public_jwk` - Public key description embedded in the token
/// * `message` - Exact bytes that were signed
/// * `signature` - Raw signature bytes
///
/// # Returns
/// * `Ok(true)` if the signature is valid
/// * `Ok(false)` if the signature does not verify, including signatures of the wrong length
/// * `Err(AuthError::InvalidKeyDescription)` if the key cannot be decoded
///
/// # Example
/// ```rust
/// use eddsa_jwt::crypto::{eddsa, keys::KeyPair};
///
/// let keypair = KeyPair::generate().unwrap();
/// let signature = eddsa::sign(&keypair, b"message");
///
/// assert!(eddsa::verify_signature(&keypair.public_jwk(), b"message", &signature).unwrap());
/// assert!(!eddsa::verify_signature(&keypair.public_jwk(), b"other", &signature).unwrap());
/// ```
pub fn verify_signature(public_jwk: &PublicJwk, message: &[u8], signature: &[u8]) -> Result<bool> {
    let verifying_key = public_jwk.to_verifying_key()?;
    let Ok(signature) = <[u8; SIGNATURE_LEN]>::try_from(signature) else {
        return Ok(false);
    };
    let signature = Signature::from_bytes(&signature);
    Ok(verifying_key.verify_strict(message, &signature).is_ok())
}
