//! # eddsa-jwt
//!
//! A Rust library for **Ed25519 proof-of-possession authentication** using compact,
//! JWT-shaped tokens. A verifier hands out single-use nonces; a holder signs a token that
//! embeds the nonce and its own public key; the verifier checks the signature against that
//! key and consumes the nonce so the token can never be replayed.
//!
//! ## Features
//!
//! - **Ed25519 Signatures** - Strict verification over the exact bytes received
//! - **Single-Use Nonces** - Concurrent check-and-consume, expiry and background sweeping
//! - **Self-Describing Tokens** - The holder's public key travels as a JWK in the payload
//! - **HTTP Verifier** - `GET /nonce` and `POST /verify` on top of axum
//! - **Holder Client** - Key file management and the full handshake over reqwest
//!
//! ## Quick Start
//!
//! ```rust
//! use eddsa_jwt::{sign_token, AuthService, Header, KeyPair, NonceStore, Payload};
//! use std::sync::Arc;
//!
//! // Verifier side
//! let nonces = Arc::new(NonceStore::new(chrono::Duration::seconds(60), 10_000));
//! let auth_service = AuthService::new(nonces);
//! let nonce = auth_service.issue_nonce().unwrap();
//!
//! // Holder side
//! let keypair = KeyPair::generate().unwrap();
//! let payload = Payload::new(nonce.into(), "alice", "verifier", keypair.public_jwk());
//! let token = sign_token(&keypair, &Header::default(), &payload).unwrap();
//!
//! // Back on the verifier
//! assert!(auth_service.verify(&token).accepted());
//! // A second presentation is a replay
//! assert_eq!(auth_service.verify(&token).reason(), "nonce already used");
//! ```
//!
//! ## Binaries
//!
//! - `verifier` serves the HTTP API, configured through `YJT_*` environment variables
//! - `holder` loads or creates a key file and runs one handshake against a verifier

pub mod auth;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod nonce;
pub mod server;

// Re-export main types for easier access
pub use auth::{AuthService, VerificationOutcome, VerifiedHolder};
pub use client::HolderClient;
pub use config::{HolderConfig, VerifierConfig};
pub use crypto::challenge::generate_challenge;
pub use crypto::eddsa::verify_signature;
pub use crypto::jwt::{sign_token, Header, NonceClaim, Payload};
pub use crypto::keys::{KeyPair, PublicJwk};
pub use error::{AuthError, ClientError, ConfigError, KeyError, NonceError, Result};
pub use nonce::{spawn_sweeper, Nonce, NonceStore};
pub use server::{create_router, serve, VerifyResponse};
