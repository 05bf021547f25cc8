//! Holder binary
//!
//! Loads (or creates) the holder key file and proves possession of it to a verifier.

use eddsa_jwt::{HolderClient, HolderConfig, KeyPair};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match HolderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let keypair = match KeyPair::load_or_generate(&config.key_file) {
        Ok(keypair) => keypair,
        Err(e) => {
            error!(path = %config.key_file.display(), error = %e, "cannot load key file");
            return ExitCode::FAILURE;
        }
    };
    info!(thumbprint = %keypair.public_jwk().thumbprint(), "using holder key");

    let client = HolderClient::new(config.verifier_url());
    let response = match client.authenticate(&keypair, &config.subject, &config.audience).await {
        Ok(response) => response,
        Err(e) => {
            error!(verifier = %config.verifier_addr, error = %e, "handshake failed");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!(error = %e, "cannot print response");
            return ExitCode::FAILURE;
        }
    }
    if response.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
