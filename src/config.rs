use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::settlement::SettlementPolicy;

/// Business rules for the booking lifecycle, loaded from one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingPolicy {
    #[serde(default)]
    pub settlement: SettlementPolicy,
    /// Hours after scheduled end during which non-admins may still complete
    #[serde(default = "default_completion_grace_hours")]
    pub completion_grace_hours: i64,
    /// Proof SLA applied when the service does not define its own
    #[serde(default = "default_proof_sla_hours")]
    pub default_proof_sla_hours: i32,
    #[serde(default = "default_outbox_max_attempts")]
    pub outbox_max_attempts: i32,
}

fn default_completion_grace_hours() -> i64 {
    2
}

fn default_proof_sla_hours() -> i32 {
    24
}

fn default_outbox_max_attempts() -> i32 {
    8
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            settlement: SettlementPolicy::default(),
            completion_grace_hours: default_completion_grace_hours(),
            default_proof_sla_hours: default_proof_sla_hours(),
            outbox_max_attempts: default_outbox_max_attempts(),
        }
    }
}

impl BookingPolicy {
    /// Load policy from a TOML file; missing keys fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let policy: BookingPolicy =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        self.settlement.validate()?;
        anyhow::ensure!(
            self.completion_grace_hours >= 0,
            "completion_grace_hours must not be negative"
        );
        anyhow::ensure!(
            self.default_proof_sla_hours >= 0,
            "default_proof_sla_hours must not be negative"
        );
        anyhow::ensure!(
            self.outbox_max_attempts > 0,
            "outbox_max_attempts must be positive"
        );
        Ok(())
    }
}

/// Credentials and endpoint of the payment provider
#[derive(Clone)]
pub struct PaymentConfig {
    pub provider: String,
    pub api_base: String,
    pub key_id: String,
    /// Signs client checkout confirmations and authenticates API calls
    pub key_secret: String,
    pub webhook_secret: String,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("provider", &self.provider)
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone)]
pub struct EngineConfig {
    pub payment: PaymentConfig,
    pub jwt_secret: String,
    pub certificate_service_url: Option<String>,
    pub policy: BookingPolicy,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("payment", &self.payment)
            .field("jwt_secret", &"[REDACTED]")
            .field("certificate_service_url", &self.certificate_service_url)
            .field("policy", &self.policy)
            .finish()
    }
}

impl EngineConfig {
    /// Initialize configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let key_id = std::env::var("PAYMENT_KEY_ID").context("PAYMENT_KEY_ID must be set")?;
        let key_secret =
            std::env::var("PAYMENT_KEY_SECRET").context("PAYMENT_KEY_SECRET must be set")?;
        let webhook_secret = std::env::var("PAYMENT_WEBHOOK_SECRET")
            .context("PAYMENT_WEBHOOK_SECRET must be set")?;
        let api_base = std::env::var("PAYMENT_API_BASE")
            .unwrap_or_else(|_| "https://api.razorpay.com".to_string());
        let provider = std::env::var("PAYMENT_PROVIDER").unwrap_or_else(|_| "razorpay".to_string());
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let certificate_service_url = std::env::var("CERTIFICATE_SERVICE_URL").ok();

        let policy = match std::env::var("BOOKING_POLICY_FILE") {
            Ok(path) => BookingPolicy::load(Path::new(&path))?,
            Err(_) => BookingPolicy::default(),
        };

        Ok(Self {
            payment: PaymentConfig {
                provider,
                api_base,
                key_id,
                key_secret,
                webhook_secret,
            },
            jwt_secret,
            certificate_service_url,
            policy,
        })
    }
}
