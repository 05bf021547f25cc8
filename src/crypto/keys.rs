use crate::error::{AuthError, KeyError};
use base64::prelude::*;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt, fs,
    io::{self, Write},
    path::Path,
};

/// JWK key type for Edwards-curve keys
pub const KEY_TYPE: &str = "OKP";
/// JWK curve name for Ed25519
pub const CURVE: &str = "Ed25519";
/// Length of both the Ed25519 seed and the public key
pub const KEY_LEN: usize = 32;

/// Public half of an Ed25519 key as a JSON Web Key
///
/// Serializes as `{"kty":"OKP","crv":"Ed25519","x":"<base64url>"}` with exactly this field order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublicJwk {
    /// Key type, always `OKP`
    pub kty: String,
    /// Curve, always `Ed25519`
    pub crv: String,
    /// Raw 32 public key bytes, unpadded base64url
    pub x: String,
}

/// Describe a raw Ed25519 public key as a JWK
pub fn describe_public(public_key: &[u8; KEY_LEN]) -> PublicJwk {
    PublicJwk {
        kty: KEY_TYPE.to_string(),
        crv: CURVE.to_string(),
        x: BASE64_URL_SAFE_NO_PAD.encode(public_key),
    }
}

/// Members of the JWK in the lexicographic order used for thumbprints
#[derive(Serialize)]
struct ThumbprintInput<'a> {
    crv: &'a str,
    kty: &'a str,
    x: &'a str,
}

impl PublicJwk {
    /// Decode this description into an Ed25519 verifying key
    ///
    /// The key type and curve are checked against the single supported algorithm before
    /// anything is decoded.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, AuthError> {
        if self.kty != KEY_TYPE || self.crv != CURVE {
            return Err(AuthError::InvalidKeyDescription(format!(
                "unsupported key type '{}' on curve '{}'",
                self.kty, self.crv
            )));
        }
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(&self.x)
            .map_err(|e| AuthError::InvalidKeyDescription(format!("invalid base64 in x: {e}")))?;
        let bytes: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            AuthError::InvalidKeyDescription(format!(
                "expected {KEY_LEN} key bytes, found {}",
                bytes.len()
            ))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|e| AuthError::InvalidKeyDescription(format!("not an Ed25519 point: {e}")))
    }

    /// SHA-256 thumbprint of this key, hex encoded
    ///
    /// Hashes the canonical `{"crv","kty","x"}` JSON, so equal keys always share a thumbprint.
    pub fn thumbprint(&self) -> String {
        let input = ThumbprintInput { crv: &self.crv, kty: &self.kty, x: &self.x };
        // Serializing three string fields cannot fail.
        let canonical = serde_json::to_vec(&input).unwrap_or_default();
        hex::encode(Sha256::digest(canonical))
    }
}

/// An Ed25519 key pair owned by a holder
///
/// Both halves are always present: the public key is derived from the private seed.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

/// On-disk key file, including the private seed
///
/// `d` is read as either the 32-byte seed or the 64-byte `seed || public key` form; it is
/// always written as the seed.
#[derive(Deserialize)]
struct KeyFile {
    kty: String,
    crv: String,
    x: String,
    d: Secret<String>,
}

#[derive(Serialize)]
struct KeyFileRef<'a> {
    kty: &'a str,
    crv: &'a str,
    x: &'a str,
    d: &'a str,
}

impl KeyPair {
    /// Generate a new key pair from the operating system random source
    pub fn generate() -> Result<Self, KeyError> {
        let mut seed = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| KeyError::Entropy(e.to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Create a key pair from a 32-byte Ed25519 seed
    pub fn from_seed(seed: &[u8; KEY_LEN]) -> Self {
        Self { signing_key: SigningKey::from_bytes(seed) }
    }

    /// Returns the raw 32-byte public key
    pub fn public_key(&self) -> [u8; KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Returns the public key as a JWK
    pub fn public_jwk(&self) -> PublicJwk {
        describe_public(&self.public_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Load a key pair from a JWK key file
    ///
    /// # Errors
    /// - `NotFound` - nothing exists at `path`
    /// - `Malformed` - the file is not a consistent Ed25519 JWK with a private component
    /// - `Io` - the file exists but could not be read
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => KeyError::NotFound(path.to_path_buf()),
            _ => KeyError::Io(e),
        })?;
        let malformed = |reason: String| KeyError::Malformed { path: path.to_path_buf(), reason };

        let file: KeyFile =
            serde_json::from_str(&contents).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
        if file.kty != KEY_TYPE || file.crv != CURVE {
            return Err(malformed(format!(
                "unsupported key type '{}' on curve '{}'",
                file.kty, file.crv
            )));
        }
        let public_key = decode_component(&file.x, "x").map_err(malformed)?;
        let (seed, embedded_public) = decode_private(file.d.expose_secret()).map_err(malformed)?;

        let keypair = Self::from_seed(&seed);
        if keypair.public_key() != public_key {
            return Err(malformed("x does not match the private key".to_string()));
        }
        if embedded_public.is_some_and(|embedded| embedded != public_key) {
            return Err(malformed("d does not end with its own public key".to_string()));
        }
        tracing::info!(path = %path.display(), thumbprint = %keypair.public_jwk().thumbprint(), "loaded key");
        Ok(keypair)
    }

    /// Write this key pair, private seed included, to `path`
    ///
    /// Any existing file at `path` is overwritten. On unix the file is created with mode `0600`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), KeyError> {
        let path = path.as_ref();
        let jwk = self.public_jwk();
        let d = Secret::new(BASE64_URL_SAFE_NO_PAD.encode(self.signing_key.to_bytes()));
        let file = KeyFileRef { kty: &jwk.kty, crv: &jwk.crv, x: &jwk.x, d: d.expose_secret() };
        let mut contents = serde_json::to_string(&file)
            .map_err(|e| KeyError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        contents.push('\n');

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut handle = options.open(path)?;
        handle.write_all(contents.as_bytes())?;
        handle.sync_all()?;
        tracing::info!(path = %path.display(), thumbprint = %jwk.thumbprint(), "saved key");
        Ok(())
    }

    /// Load the key at `path`, or generate and save a new one if the file does not exist
    pub fn load_or_generate(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        match Self::load(path) {
            Err(KeyError::NotFound(_)) => {
                tracing::info!(path = %path.display(), "no key file, generating a new key");
                let keypair = Self::generate()?;
                keypair.save(path)?;
                Ok(keypair)
            }
            other => other,
        }
    }
}

/// Decode `d` as either the 32-byte seed or the 64-byte `seed || public key` form
fn decode_private(encoded: &str) -> Result<([u8; KEY_LEN], Option<[u8; KEY_LEN]>), String> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| format!("invalid base64 in d: {e}"))?;
    let mut seed = [0u8; KEY_LEN];
    match bytes.len() {
        KEY_LEN => {
            seed.copy_from_slice(&bytes);
            Ok((seed, None))
        }
        len if len == 2 * KEY_LEN => {
            let mut public = [0u8; KEY_LEN];
            seed.copy_from_slice(&bytes[..KEY_LEN]);
            public.copy_from_slice(&bytes[KEY_LEN..]);
            Ok((seed, Some(public)))
        }
        len => Err(format!("d must be {KEY_LEN} or {} bytes, found {len}", 2 * KEY_LEN)),
    }
}

fn decode_component(encoded: &str, name: &str) -> Result<[u8; KEY_LEN], String> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| format!("invalid base64 in {name}: {e}"))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("{name} must be {KEY_LEN} bytes, found {len}"))
}
