//! Verifier server binary
//!
//! Issues nonces and verifies proof-of-possession tokens over HTTP.

use eddsa_jwt::{serve, spawn_sweeper, AuthService, VerifierConfig};
use std::{process::ExitCode, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = match VerifierConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let auth_service = AuthService::from_config(&config);
    let sweeper = spawn_sweeper(
        auth_service.nonces().clone(),
        Duration::from_secs(config.sweep_interval),
    );

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.listen_addr, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(
        addr = %config.listen_addr,
        nonce_ttl = config.nonce_ttl,
        nonce_capacity = config.nonce_capacity,
        "verifier listening"
    );

    let result = serve(listener, auth_service).await;
    sweeper.abort();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}
