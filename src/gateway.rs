//! Payment provider API: order creation and payment lookup.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PaymentConfig;
use crate::payments::PaymentStatus;

/// Order created at the provider, returned to the client for checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Payment as the provider reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderPayment {
    pub id: String,
    pub order_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

impl ProviderPayment {
    /// Local status matching the provider's. None for states with no
    /// counterpart here (e.g. refunded).
    pub fn local_status(&self) -> Option<PaymentStatus> {
        provider_status(&self.status)
    }
}

pub fn provider_status(status: &str) -> Option<PaymentStatus> {
    match status {
        "created" => Some(PaymentStatus::Created),
        "authorized" => Some(PaymentStatus::Authorized),
        "captured" => Some(PaymentStatus::Captured),
        "failed" => Some(PaymentStatus::Failed),
        _ => None,
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider name stored on payment rows
    fn provider(&self) -> &str;

    async fn create_order(&self, amount: i64, currency: &str, receipt: &str)
    -> Result<ProviderOrder>;

    async fn fetch_payment(&self, provider_payment_id: &str) -> Result<ProviderPayment>;
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: OrderNotes<'a>,
}

/// Echoed back on the order's payments in webhooks
#[derive(Serialize)]
struct OrderNotes<'a> {
    booking_id: &'a str,
}

/// Gateway speaking the Razorpay REST API with basic auth
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: PaymentConfig,
}

impl HttpGateway {
    pub fn new(client: Client, config: PaymentConfig) -> Self {
        Self { client, config }
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by payment provider during {}", what);
            return Err(anyhow!("Rate limited by payment provider"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Payment provider {} failed {}: {}", what, status, body));
        }
        Ok(response)
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    fn provider(&self) -> &str {
        &self.config.provider
    }

    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<ProviderOrder> {
        debug!(amount, currency, receipt, "Creating provider order");

        let url = format!("{}/v1/orders", self.config.api_base);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderRequest {
                amount,
                currency,
                receipt,
                notes: OrderNotes {
                    booking_id: receipt,
                },
            })
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .context("Failed to send order request to payment provider")?;

        let response = Self::check(response, "order creation").await?;
        response
            .json::<ProviderOrder>()
            .await
            .context("Failed to parse provider order response")
    }

    async fn fetch_payment(&self, provider_payment_id: &str) -> Result<ProviderPayment> {
        debug!(provider_payment_id, "Fetching provider payment");

        let url = format!("{}/v1/payments/{}", self.config.api_base, provider_payment_id);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .context("Failed to send payment lookup to payment provider")?;

        let response = Self::check(response, "payment lookup").await?;
        response
            .json::<ProviderPayment>()
            .await
            .context("Failed to parse provider payment response")
    }
}
