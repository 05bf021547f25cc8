//! End-to-end handshake between a holder and a live verifier
//!
//! - Holder key file creation and reuse
//! - Nonce issuance, signing and verification over HTTP
//! - Replay refusal across the wire

use eddsa_jwt::{
    create_router, sign_token, AuthService, Header, HolderClient, KeyPair, NonceStore, Payload, VerifierConfig,
};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn start_verifier(config: &VerifierConfig) -> (AuthService, HolderClient) {
    let auth = AuthService::from_config(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(auth.clone());
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    (auth, HolderClient::new(format!("http://{addr}")))
}

#[tokio::test]
async fn test_holder_proves_possession_once() {
    let dir = tempfile::tempdir().unwrap();
    let key_file = dir.path().join("keyfile.jwk");
    let (auth, client) = start_verifier(&VerifierConfig::default()).await;

    let keypair = KeyPair::load_or_generate(&key_file).unwrap();
    let nonce = client.fetch_nonce().await.unwrap();
    let payload = Payload::new(nonce, "Lorem Ipsum", "verifier", keypair.public_jwk());
    let token = sign_token(&keypair, &Header::default(), &payload).unwrap();

    let accepted = client.submit(&token).await.unwrap();
    assert!(accepted.ok, "{}", accepted.message);

    let replay = client.submit(&token).await.unwrap();
    assert!(!replay.ok);
    assert_eq!(replay.message, "nonce already used");

    // The consumed nonce is reclaimed by the next sweep.
    assert_eq!(auth.nonces().sweep(), 1);
    assert!(auth.nonces().is_empty());
}

#[tokio::test]
async fn test_key_file_identity_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let key_file = dir.path().join("keyfile.jwk");
    let (_auth, client) = start_verifier(&VerifierConfig::default()).await;

    let first = KeyPair::load_or_generate(&key_file).unwrap();
    assert!(client.authenticate(&first, "alice", "verifier").await.unwrap().ok);

    let second = KeyPair::load_or_generate(&key_file).unwrap();
    assert_eq!(first.public_jwk(), second.public_jwk());
    assert!(client.authenticate(&second, "alice", "verifier").await.unwrap().ok);
}

#[tokio::test]
async fn test_nonce_from_another_verifier_is_unknown() {
    let (_, issuing) = start_verifier(&VerifierConfig::default()).await;
    let (_, verifying) = start_verifier(&VerifierConfig::default()).await;
    let keypair = KeyPair::generate().unwrap();

    let nonce = issuing.fetch_nonce().await.unwrap();
    let payload = Payload::new(nonce, "alice", "verifier", keypair.public_jwk());
    let token = sign_token(&keypair, &Header::default(), &payload).unwrap();

    let response = verifying.submit(&token).await.unwrap();
    assert!(!response.ok);
    assert_eq!(response.message, "unknown nonce");
}

#[tokio::test]
async fn test_shared_store_across_services() {
    let store = Arc::new(NonceStore::new(chrono::Duration::seconds(60), 100));
    let local = AuthService::new(store.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(AuthService::new(store));
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

    let client = HolderClient::new(format!("http://{addr}"));
    let keypair = KeyPair::generate().unwrap();
    let nonce = client.fetch_nonce().await.unwrap();
    let payload = Payload::new(nonce, "alice", "verifier", keypair.public_jwk());
    let token = sign_token(&keypair, &Header::default(), &payload).unwrap();

    // Verified in-process, then refused over HTTP: one store, one use.
    assert!(local.verify(&token).accepted());
    assert_eq!(client.submit(&token).await.unwrap().message, "nonce already used");
}
