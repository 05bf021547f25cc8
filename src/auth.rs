use crate::{
    config::{VerifierConfig, DEFAULT_MAX_TOKEN_SIZE},
    crypto::{eddsa, jwt},
    error::{AuthError, NonceError, Result},
    nonce::{Nonce, NonceStore},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Reason recorded on an accepted verification
pub const VERIFIED_MESSAGE: &str = "validated signature & nonce: private key holder verified";

/// Authentication service that verifies proof-of-possession tokens
///
/// The service owns the verifier side of the handshake:
/// - Nonce issuance for holders to embed and sign
/// - Token decoding and Ed25519 signature verification
/// - Single-use nonce consumption
///
/// The nonce store is shared through an [`Arc`] so the same store can be swept in the
/// background while requests are being verified.
#[derive(Clone, Debug)]
pub struct AuthService {
    nonces: Arc<NonceStore>,
    max_token_size: usize,
}

/// What the verifier learned about a successfully verified holder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedHolder {
    pub subject: String,
    pub audience: String,
    pub issued_at: DateTime<Utc>,
    /// SHA-256 thumbprint of the holder's public JWK
    pub thumbprint: String,
    pub nonce_id: String,
}

/// Final decision for one verification attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Accepted(VerifiedHolder),
    Rejected(AuthError),
}

impl VerificationOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, VerificationOutcome::Accepted(_))
    }

    /// Human readable explanation of the decision
    pub fn reason(&self) -> String {
        match self {
            VerificationOutcome::Accepted(_) => VERIFIED_MESSAGE.to_string(),
            VerificationOutcome::Rejected(e) => e.to_string(),
        }
    }

    /// Machine readable explanation of the decision
    pub fn tag(&self) -> &'static str {
        match self {
            VerificationOutcome::Accepted(_) => "verified",
            VerificationOutcome::Rejected(e) => e.tag(),
        }
    }

    pub fn error(&self) -> Option<&AuthError> {
        match self {
            VerificationOutcome::Accepted(_) => None,
            VerificationOutcome::Rejected(e) => Some(e),
        }
    }
}

impl From<Result<VerifiedHolder>> for VerificationOutcome {
    fn from(result: Result<VerifiedHolder>) -> Self {
        match result {
            Ok(holder) => VerificationOutcome::Accepted(holder),
            Err(e) => VerificationOutcome::Rejected(e),
        }
    }
}

impl AuthService {
    /// Create a new authentication service over a nonce store
    ///
    /// # Example
    /// ```rust
    /// use eddsa_jwt::{AuthService, NonceStore};
    /// use std::sync::Arc;
    ///
    /// let nonces = Arc::new(NonceStore::new(chrono::Duration::seconds(60), 10_000));
    /// let auth_service = AuthService::new(nonces);
    /// ```
    pub fn new(nonces: Arc<NonceStore>) -> Self {
        Self { nonces, max_token_size: DEFAULT_MAX_TOKEN_SIZE }
    }

    /// Create a service and its nonce store from the verifier configuration
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self::new(Arc::new(NonceStore::from_config(config))).with_max_token_size(config.max_token_size)
    }

    /// Reject raw tokens larger than `max_token_size` bytes before decoding them
    pub fn with_max_token_size(mut self, max_token_size: usize) -> Self {
        self.max_token_size = max_token_size;
        self
    }

    pub fn nonces(&self) -> &Arc<NonceStore> {
        &self.nonces
    }

    /// Issue a fresh nonce for a holder to sign
    pub fn issue_nonce(&self) -> std::result::Result<Nonce, NonceError> {
        self.nonces.issue()
    }

    /// Verify a compact `header.payload.signature` token and record the decision
    ///
    /// Never fails: every error is captured in the returned outcome.
    ///
    /// # Example
    /// ```rust
    /// use eddsa_jwt::{AuthService, NonceStore};
    /// use std::sync::Arc;
    ///
    /// let auth_service = AuthService::new(Arc::new(NonceStore::new(chrono::Duration::seconds(60), 10)));
    /// let outcome = auth_service.verify("not-a-valid-token");
    /// assert!(!outcome.accepted());
    /// assert_eq!(outcome.tag(), "malformed");
    /// ```
    pub fn verify(&self, raw_token: &str) -> VerificationOutcome {
        let outcome = VerificationOutcome::from(self.verify_token(raw_token));
        match &outcome {
            VerificationOutcome::Accepted(holder) => tracing::info!(
                subject = %holder.subject,
                audience = %holder.audience,
                thumbprint = %holder.thumbprint,
                nonce_id = %holder.nonce_id,
                "holder verified"
            ),
            VerificationOutcome::Rejected(e) => {
                tracing::warn!(reason = e.tag(), error = %e, "token rejected")
            }
        }
        outcome
    }

    /// Verify a compact token, failing on the first check that does not pass
    ///
    /// Steps, in order:
    /// 1. Split off the signature at the last `.` and decode it
    /// 2. Decode the header and payload
    /// 3. Verify the signature over the signed portion exactly as received, using the
    ///    public key embedded in the payload
    /// 4. Validate and consume the embedded nonce
    ///
    /// The nonce is only touched once the signature has verified, so a forged token can
    /// never burn a legitimate holder's nonce.
    ///
    /// # Errors
    /// - `Malformed` - missing separators, bad base64, bad JSON, or oversized input
    /// - `InvalidKeyDescription` - the embedded JWK is not a usable Ed25519 key
    /// - `BadSignature` - the signature does not verify
    /// - `Nonce` - the nonce is unknown, already used, expired or mismatched
    pub fn verify_token(&self, raw_token: &str) -> Result<VerifiedHolder> {
        if raw_token.len() > self.max_token_size {
            return Err(AuthError::Malformed(format!(
                "token is larger than {} bytes",
                self.max_token_size
            )));
        }
        let (signed_part, signature) = jwt::split_signature(raw_token)?;
        let (_header, payload) = jwt::decode(signed_part)?;

        if !eddsa::verify_signature(&payload.jwk, signed_part.as_bytes(), &signature)? {
            return Err(AuthError::BadSignature);
        }

        self.nonces.validate(&payload.nonce.id, &payload.nonce.value)?;

        Ok(VerifiedHolder {
            thumbprint: payload.jwk.thumbprint(),
            subject: payload.subject,
            audience: payload.audience,
            issued_at: payload.issued_at,
            nonce_id: payload.nonce.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{
        jwt::{sign_token, Header, NonceClaim, Payload},
        keys::KeyPair,
    };
    use base64::prelude::*;
    use std::{sync::Barrier, thread};

    fn create_test_auth_service() -> AuthService {
        AuthService::new(Arc::new(NonceStore::new(chrono::Duration::seconds(60), 1000)))
    }

    fn holder_payload(auth_service: &AuthService, keypair: &KeyPair) -> Payload {
        let nonce = auth_service.issue_nonce().unwrap();
        Payload::new(nonce.into(), "Lorem Ipsum", "https://verifier.example.com", keypair.public_jwk())
    }

    fn holder_token(auth_service: &AuthService, keypair: &KeyPair) -> String {
        let payload = holder_payload(auth_service, keypair);
        sign_token(keypair, &Header::default(), &payload).unwrap()
    }

    /// Re-encode a payload but keep the signature of the original token
    fn with_payload(token: &str, payload: &Payload) -> String {
        let (_, signature) = token.rsplit_once('.').unwrap();
        let encoded = jwt::encode(&Header::default(), payload).unwrap();
        format!("{encoded}.{signature}")
    }

    fn rejection(outcome: VerificationOutcome) -> AuthError {
        match outcome {
            VerificationOutcome::Rejected(e) => e,
            VerificationOutcome::Accepted(_) => panic!("token was accepted"),
        }
    }

    #[test]
    fn test_end_to_end_and_replay() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let token = holder_token(&auth_service, &keypair);

        let outcome = auth_service.verify(&token);
        assert!(outcome.accepted());
        assert_eq!(outcome.reason(), VERIFIED_MESSAGE);
        match outcome {
            VerificationOutcome::Accepted(holder) => {
                assert_eq!(holder.subject, "Lorem Ipsum");
                assert_eq!(holder.thumbprint, keypair.public_jwk().thumbprint());
            }
            VerificationOutcome::Rejected(e) => panic!("rejected: {e}"),
        }

        let replay = auth_service.verify(&token);
        assert!(!replay.accepted());
        assert_eq!(replay.reason(), "nonce already used");
        assert_eq!(replay.tag(), "nonce_already_used");
    }

    #[test]
    fn test_malformed_token() {
        let auth_service = create_test_auth_service();
        let outcome = auth_service.verify("not-a-valid-token");
        assert!(!outcome.accepted());
        assert!(matches!(outcome.error(), Some(AuthError::Malformed(_))));
    }

    #[test]
    fn test_malformed_signature_encoding() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let token = holder_token(&auth_service, &keypair);
        let (signed_part, _) = token.rsplit_once('.').unwrap();

        let err = rejection(auth_service.verify(&format!("{signed_part}.!!!")));
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[test]
    fn test_oversized_token() {
        let auth_service = create_test_auth_service().with_max_token_size(128);
        let keypair = KeyPair::generate().unwrap();
        let token = holder_token(&auth_service, &keypair);
        assert!(token.len() > 128);

        let err = rejection(auth_service.verify(&token));
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[test]
    fn test_tampered_payload_is_bad_signature() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let payload = holder_payload(&auth_service, &keypair);
        let token = sign_token(&keypair, &Header::default(), &payload).unwrap();

        let mut subject = payload.clone();
        subject.subject = "Mallory".into();
        let mut audience = payload.clone();
        audience.audience = "https://elsewhere.example.com".into();
        let mut issued = payload.clone();
        issued.issued_at += chrono::Duration::seconds(1);

        for tampered in [subject, audience, issued] {
            let err = rejection(auth_service.verify(&with_payload(&token, &tampered)));
            assert_eq!(err, AuthError::BadSignature);
        }

        // None of the forgeries consumed the nonce.
        assert!(auth_service.verify(&token).accepted());
    }

    #[test]
    fn test_flipped_bits_never_accepted_or_consume_nonce() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let token = holder_token(&auth_service, &keypair);
        let (signed_part, signature) = token.rsplit_once('.').unwrap();

        for index in 0..signed_part.len() * 8 {
            let mut bytes = signed_part.as_bytes().to_vec();
            bytes[index / 8] ^= 1 << (index % 8);
            let Ok(tampered) = String::from_utf8(bytes) else {
                continue;
            };
            let outcome = auth_service.verify(&format!("{tampered}.{signature}"));
            assert!(!outcome.accepted(), "bit {index} flip was accepted");
            assert!(
                !matches!(outcome.error(), Some(AuthError::Nonce(_))),
                "bit {index} flip reached the nonce store"
            );
        }

        assert!(auth_service.verify(&token).accepted());
    }

    #[test]
    fn test_flipped_signature_bits_are_bad_signature() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let token = holder_token(&auth_service, &keypair);
        let (signed_part, signature) = token.rsplit_once('.').unwrap();
        let signature = BASE64_URL_SAFE_NO_PAD.decode(signature).unwrap();

        for index in 0..signature.len() {
            let mut tampered = signature.clone();
            tampered[index] = tampered[index].wrapping_add(1);
            let tampered = BASE64_URL_SAFE_NO_PAD.encode(tampered);
            let err = rejection(auth_service.verify(&format!("{signed_part}.{tampered}")));
            assert_eq!(err, AuthError::BadSignature);
        }
    }

    #[test]
    fn test_forged_key_rejected() {
        let auth_service = create_test_auth_service();
        let holder = KeyPair::generate().unwrap();
        let attacker = KeyPair::generate().unwrap();

        // Claims to be the holder but signs with the attacker's key.
        let payload = holder_payload(&auth_service, &holder);
        let token = sign_token(&attacker, &Header::default(), &payload).unwrap();

        let err = rejection(auth_service.verify(&token));
        assert_eq!(err, AuthError::BadSignature);

        // The holder can still use the nonce.
        let token = sign_token(&holder, &Header::default(), &payload).unwrap();
        assert!(auth_service.verify(&token).accepted());
    }

    #[test]
    fn test_invalid_key_description() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let mut payload = holder_payload(&auth_service, &keypair);
        payload.jwk.x = BASE64_URL_SAFE_NO_PAD.encode([1u8; 16]);
        let token = sign_token(&keypair, &Header::default(), &payload).unwrap();

        let err = rejection(auth_service.verify(&token));
        assert!(matches!(err, AuthError::InvalidKeyDescription(_)));
    }

    #[test]
    fn test_unsupported_curve() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let mut payload = holder_payload(&auth_service, &keypair);
        payload.jwk.crv = "X25519".into();
        let token = sign_token(&keypair, &Header::default(), &payload).unwrap();

        let outcome = auth_service.verify(&token);
        assert_eq!(outcome.tag(), "invalid_key_description");
    }

    #[test]
    fn test_unknown_nonce() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let nonce = NonceClaim { id: "afad".into(), value: "invalid".into() };
        let payload = Payload::new(nonce, "sub", "aud", keypair.public_jwk());
        let token = sign_token(&keypair, &Header::default(), &payload).unwrap();

        let err = rejection(auth_service.verify(&token));
        assert_eq!(err, AuthError::Nonce(NonceError::Unknown));
    }

    #[test]
    fn test_nonce_value_mismatch() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let mut payload = holder_payload(&auth_service, &keypair);
        let real_value = std::mem::replace(&mut payload.nonce.value, "guess".into());
        let token = sign_token(&keypair, &Header::default(), &payload).unwrap();

        let outcome = auth_service.verify(&token);
        assert_eq!(outcome.error(), Some(&AuthError::Nonce(NonceError::Mismatch)));
        assert!(!outcome.reason().contains(&real_value));
    }

    #[test]
    fn test_expired_nonce() {
        let auth_service = AuthService::new(Arc::new(NonceStore::new(chrono::Duration::seconds(-2), 10)));
        let keypair = KeyPair::generate().unwrap();
        let token = holder_token(&auth_service, &keypair);

        let err = rejection(auth_service.verify(&token));
        assert_eq!(err, AuthError::Nonce(NonceError::Expired));
    }

    #[test]
    fn test_concurrent_replay_has_one_winner() {
        let auth_service = create_test_auth_service();
        let keypair = KeyPair::generate().unwrap();
        let token = holder_token(&auth_service, &keypair);
        let attempts = 16;
        let barrier = Barrier::new(attempts);

        let accepted: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..attempts)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        auth_service.verify(&token)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(VerificationOutcome::accepted)
                .count()
        });
        assert_eq!(accepted, 1);
    }

    #[test]
    fn test_from_config() {
        let config = VerifierConfig { max_token_size: 256, nonce_capacity: 3, ..Default::default() };
        let auth_service = AuthService::from_config(&config);
        assert_eq!(auth_service.nonces().capacity(), 3);
        assert_eq!(auth_service.max_token_size, 256);
    }
}
