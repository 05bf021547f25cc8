use std::path::PathBuf;

/// Verification and nonce lifecycle errors
///
/// Every failure on the verification path ends up as one of these variants. The
/// [`AuthService`](crate::auth::AuthService) turns them into a
/// [`VerificationOutcome`](crate::auth::VerificationOutcome) instead of propagating them,
/// so none of them is fatal to the verifier process.
///
/// # Example
/// ```rust
/// use eddsa_jwt::{AuthError, NonceError, Result};
///
/// fn handle_auth_result(result: Result<()>) {
///     match result {
///         Ok(()) => println!("Holder verified"),
///         Err(AuthError::BadSignature) => println!("Forged or tampered token"),
///         Err(AuthError::Nonce(NonceError::AlreadyUsed)) => println!("Replay attempt"),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The token is structurally invalid
    ///
    /// This error occurs when:
    /// - The token has no `.` separators or is too large
    /// - A component is not valid unpadded base64url
    /// - The header or payload JSON does not match the expected schema
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The embedded public key description cannot be used
    ///
    /// This error occurs when:
    /// - The key type or curve tag is not `OKP`/`Ed25519`
    /// - `x` is not base64url or does not decode to exactly 32 bytes
    /// - The 32 bytes are not a valid Ed25519 point
    #[error("invalid key description: {0}")]
    InvalidKeyDescription(String),

    /// The token is well formed but its signature does not verify
    #[error("signature invalid, token rejected")]
    BadSignature,

    /// The embedded nonce was refused by the nonce store
    #[error(transparent)]
    Nonce(#[from] NonceError),
}

impl AuthError {
    /// Stable machine-readable tag for this error
    pub fn tag(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "malformed",
            AuthError::InvalidKeyDescription(_) => "invalid_key_description",
            AuthError::BadSignature => "bad_signature",
            AuthError::Nonce(e) => e.tag(),
        }
    }
}

/// Nonce issuance and validation errors
///
/// Messages never include the stored nonce value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NonceError {
    /// No nonce with this id was ever issued, or it has been swept
    #[error("unknown nonce")]
    Unknown,

    /// The nonce was already consumed by an earlier successful validation
    #[error("nonce already used")]
    AlreadyUsed,

    /// The validity window of the nonce has passed
    #[error("nonce expired")]
    Expired,

    /// The presented value differs from the issued one
    #[error("nonce mismatch")]
    Mismatch,

    /// The store is at capacity even after reclaiming consumed and expired entries
    #[error("nonce store is full ({capacity} outstanding nonces)")]
    ResourceExhausted { capacity: usize },

    /// No random bytes could be drawn for the nonce value
    ///
    /// Fatal for issuance: the verifier cannot hand out challenges without entropy.
    #[error("entropy source failure while issuing nonce")]
    Entropy,
}

impl NonceError {
    pub fn tag(&self) -> &'static str {
        match self {
            NonceError::Unknown => "nonce_unknown",
            NonceError::AlreadyUsed => "nonce_already_used",
            NonceError::Expired => "nonce_expired",
            NonceError::Mismatch => "nonce_mismatch",
            NonceError::ResourceExhausted { .. } => "resource_exhausted",
            NonceError::Entropy => "entropy_failure",
        }
    }
}

/// Key file persistence errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The key file does not exist
    #[error("key file '{0}' not found")]
    NotFound(PathBuf),

    /// The key file exists but does not hold a usable Ed25519 key
    ///
    /// This error occurs when:
    /// - The file is not a JSON object with `kty`, `crv`, `x` and `d`
    /// - The tags are not `OKP`/`Ed25519`
    /// - `x` is not 32 bytes, or `d` is neither a 32-byte seed nor 64 bytes of seed and public key
    /// - `x` is not the public key belonging to `d`
    #[error("malformed key file '{path}': {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// Reading or writing the key file failed
    #[error("key file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operating system random source failed during key generation
    #[error("entropy source failure: {0}")]
    Entropy(String),
}

/// Start-up configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Holder-side HTTP client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be sent or the response could not be read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The verifier answered with a failure status
    #[error("verifier returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The token could not be built
    #[error("cannot build token: {0}")]
    Token(#[from] AuthError),
}

pub type Result<T> = std::result::Result<T, AuthError>;
