pub mod challenge;
pub mod eddsa;
pub mod jwt;
pub mod keys;

// Re-export main functions for easier access
pub use eddsa::verify_signature;
pub use jwt::sign_token;
pub use keys::{KeyPair, PublicJwk};
