pub mod migrate;
pub mod process_outbox;
pub mod scan_sla;
pub mod web;

pub use migrate::{handle_migrate, run_migrations};
pub use process_outbox::handle_process_outbox;
pub use scan_sla::handle_scan_sla;
pub use web::handle_web;

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use seva::certificates::{CertificateGenerator, HttpCertificateGenerator, NoopCertificateGenerator};
use seva::clock::SystemClock;
use seva::config::EngineConfig;
use seva::engine::{Engine, EngineDeps};
use seva::gateway::HttpGateway;
use seva::signature::SignatureVerifier;
use seva::store::PgStore;
use seva::web::PgPool;

/// Wire the engine over Postgres and the configured provider
pub fn build_engine(pool: PgPool, config: &EngineConfig) -> Result<Engine> {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let certificates: Arc<dyn CertificateGenerator> = match &config.certificate_service_url {
        Some(url) => Arc::new(HttpCertificateGenerator::new(client.clone(), url.clone())),
        None => {
            info!("CERTIFICATE_SERVICE_URL not set, certificate generation is disabled");
            Arc::new(NoopCertificateGenerator)
        }
    };

    Ok(Engine::new(EngineDeps {
        store: Arc::new(PgStore::new(pool)),
        gateway: Arc::new(HttpGateway::new(client, config.payment.clone())),
        certificates,
        verifier: SignatureVerifier::new(
            config.payment.key_secret.clone(),
            config.payment.webhook_secret.clone(),
        ),
        clock: Arc::new(SystemClock),
        policy: config.policy.clone(),
    }))
}
