use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// Renders the completion certificate for a booking
#[async_trait]
pub trait CertificateGenerator: Send + Sync {
    async fn generate(&self, booking_id: Uuid) -> Result<()>;
}

#[derive(Serialize)]
struct GenerateRequest {
    booking_id: Uuid,
}

/// Calls an external rendering service
#[derive(Clone)]
pub struct HttpCertificateGenerator {
    client: Client,
    base_url: String,
}

impl HttpCertificateGenerator {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CertificateGenerator for HttpCertificateGenerator {
    async fn generate(&self, booking_id: Uuid) -> Result<()> {
        debug!(%booking_id, "Requesting certificate");

        let url = format!("{}/certificates", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest { booking_id })
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .context("Failed to send request to certificate service")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Certificate service error {}: {}", status, body));
        }

        info!(%booking_id, "Certificate generated");
        Ok(())
    }
}

/// Used when no certificate service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCertificateGenerator;

#[async_trait]
impl CertificateGenerator for NoopCertificateGenerator {
    async fn generate(&self, booking_id: Uuid) -> Result<()> {
        debug!(%booking_id, "No certificate service configured, skipping");
        Ok(())
    }
}
