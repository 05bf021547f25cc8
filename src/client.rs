use crate::{
    crypto::{
        jwt::{sign_token, Header, NonceClaim, Payload},
        keys::KeyPair,
    },
    error::ClientError,
    server::VerifyResponse,
};

/// Holder side of the handshake over HTTP
///
/// # Example
/// ```rust,no_run
/// use eddsa_jwt::{HolderClient, KeyPair};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let keypair = KeyPair::load_or_generate("keyfile.jwk")?;
/// let client = HolderClient::new("http://127.0.0.1:8080");
/// let response = client.authenticate(&keypair, "alice", "verifier").await?;
/// println!("verified: {}", response.ok);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HolderClient {
    http: reqwest::Client,
    base_url: String,
}

impl HolderClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http: reqwest::Client::new(), base_url }
    }

    /// Request a fresh nonce from the verifier
    pub async fn fetch_nonce(&self) -> Result<NonceClaim, ClientError> {
        let response = self.http.get(format!("{}/nonce", self.base_url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<VerifyResponse>().await {
                Ok(body) => body.message,
                Err(e) => e.to_string(),
            };
            return Err(ClientError::Rejected { status: status.as_u16(), message });
        }
        Ok(response.json().await?)
    }

    /// Submit a compact token for verification
    ///
    /// Rejections are reported in the returned body (`ok: false`), not as errors.
    pub async fn submit(&self, token: &str) -> Result<VerifyResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/verify", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(token.to_string())
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Run the whole handshake: fetch a nonce, sign a token embedding it, submit it
    pub async fn authenticate(
        &self,
        keypair: &KeyPair,
        subject: &str,
        audience: &str,
    ) -> Result<VerifyResponse, ClientError> {
        let nonce = self.fetch_nonce().await?;
        tracing::debug!(nonce_id = %nonce.id, "received nonce");
        let payload = Payload::new(nonce, subject, audience, keypair.public_jwk());
        let token = sign_token(keypair, &Header::default(), &payload)?;
        self.submit(&token).await
    }
}
