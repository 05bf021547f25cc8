use crate::{
    crypto::{
        eddsa,
        keys::{KeyPair, PublicJwk},
    },
    error::{AuthError, Result},
};
use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The `typ` header value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "JWT")]
    Jwt,
}

/// The `alg` header value; Ed25519 is the only supported algorithm
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    EdDSA,
}

/// JWT header, always `{"typ":"JWT","alg":"EdDSA"}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Header {
    pub typ: TokenType,
    pub alg: Algorithm,
}

impl Default for Header {
    fn default() -> Self {
        Self { typ: TokenType::Jwt, alg: Algorithm::EdDSA }
    }
}

/// A nonce as handed out by the verifier and echoed back inside the payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NonceClaim {
    /// Lookup identifier
    pub id: String,
    /// Random challenge value
    pub value: String,
}

/// JWT payload presented by a holder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    /// The nonce being answered
    pub nonce: NonceClaim,
    /// Holder-chosen subject identifier
    #[serde(rename = "sub")]
    pub subject: String,
    /// Intended verifier
    #[serde(rename = "aud")]
    pub audience: String,
    /// When the holder built the token
    #[serde(rename = "iss")]
    pub issued_at: DateTime<Utc>,
    /// Public key the signature must verify under
    pub jwk: PublicJwk,
}

impl Payload {
    /// Build a payload issued now
    pub fn new(
        nonce: NonceClaim,
        subject: impl Into<String>,
        audience: impl Into<String>,
        jwk: PublicJwk,
    ) -> Self {
        Self {
            nonce,
            subject: subject.into(),
            audience: audience.into(),
            issued_at: Utc::now(),
            jwk,
        }
    }
}

/// Encode a header and payload into the signed portion of a token
///
/// Each part is serialized to JSON independently (struct field order, no whitespace),
/// base64url encoded without padding, and the two are joined with a `.`. Identical inputs
/// always produce an identical string.
///
/// # Example
/// ```rust
/// use eddsa_jwt::crypto::jwt::{decode, encode, Header, NonceClaim, Payload};
/// use eddsa_jwt::crypto::keys::KeyPair;
///
/// let keypair = KeyPair::generate().unwrap();
/// let nonce = NonceClaim { id: "n1".into(), value: "abc".into() };
/// let payload = Payload::new(nonce, "alice", "verifier", keypair.public_jwk());
///
/// let encoded = encode(&Header::default(), &payload).unwrap();
/// assert_eq!(decode(&encoded).unwrap(), (Header::default(), payload));
/// ```
pub fn encode(header: &Header, payload: &Payload) -> Result<String> {
    let header = to_base64_json(header, "header")?;
    let payload = to_base64_json(payload, "payload")?;
    Ok(format!("{header}.{payload}"))
}

/// Decode the signed portion of a token into its header and payload
///
/// Splits on the first `.`; fails with `Malformed` when the separator is missing or either
/// part is not unpadded base64url JSON matching the schema. The signature is not looked at.
pub fn decode(signed_part: &str) -> Result<(Header, Payload)> {
    let (header, payload) = signed_part
        .split_once('.')
        .ok_or_else(|| AuthError::Malformed("missing '.' between header and payload".into()))?;
    let header = from_base64_json(header, "header")?;
    let payload = from_base64_json(payload, "payload")?;
    Ok((header, payload))
}

/// Build a complete `header.payload.signature` token signed with the holder's key
pub fn sign_token(keypair: &KeyPair, header: &Header, payload: &Payload) -> Result<String> {
    let encoded = encode(header, payload)?;
    let signature = eddsa::sign(keypair, encoded.as_bytes());
    let signature = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{encoded}.{signature}"))
}

/// Split a compact token on its last `.` into the signed portion and the decoded signature
///
/// The signed portion is returned exactly as received so it can be verified without
/// re-serialization.
pub fn split_signature(token: &str) -> Result<(&str, Vec<u8>)> {
    let (signed_part, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| AuthError::Malformed("missing '.' before signature".into()))?;
    let signature = BASE64_URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| AuthError::Malformed(format!("invalid base64 in signature: {e}")))?;
    Ok((signed_part, signature))
}

fn to_base64_json<T: Serialize>(value: &T, component: &str) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| AuthError::Malformed(format!("cannot serialize {component}: {e}")))?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(json))
}

fn from_base64_json<T: DeserializeOwned>(input: &str, component: &str) -> Result<T> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|e| AuthError::Malformed(format!("invalid base64 in {component}: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Malformed(format!("invalid {component}: {e}")))
}
