//! HMAC-SHA256 authentication of payment provider messages.
//!
//! Client confirmations are signed over `"{order_id}|{payment_id}"` with the
//! API key secret; webhooks are signed over the raw request body with the
//! webhook secret. Signatures are lowercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::{EngineError, EngineResult};

type HmacSha256 = Hmac<Sha256>;

/// Canonical string signed by the provider on checkout completion
pub fn checkout_message(order_id: &str, payment_id: &str) -> String {
    format!("{}|{}", order_id, payment_id)
}

fn keyed(secret: &str) -> EngineResult<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| EngineError::Internal(anyhow::anyhow!("invalid HMAC key: {}", e)))
}

/// Hex HMAC-SHA256 of `message` under `secret`
pub fn sign(secret: &str, message: &[u8]) -> EngineResult<String> {
    let mut mac = keyed(secret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Recompute the HMAC and compare in constant time
pub fn verify(secret: &str, message: &[u8], signature: &str) -> EngineResult<()> {
    let expected = hex::decode(signature.trim()).map_err(|_| EngineError::InvalidSignature)?;
    let mut mac = keyed(secret)?;
    mac.update(message);
    mac.verify_slice(&expected)
        .map_err(|_| EngineError::InvalidSignature)
}

/// Holds the two provider secrets so callers never read them from the environment
#[derive(Clone)]
pub struct SignatureVerifier {
    key_secret: String,
    webhook_secret: String,
}

impl SignatureVerifier {
    pub fn new(key_secret: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn verify_checkout(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> EngineResult<()> {
        verify(
            &self.key_secret,
            checkout_message(order_id, payment_id).as_bytes(),
            signature,
        )
    }

    pub fn verify_webhook(&self, raw_body: &[u8], signature: &str) -> EngineResult<()> {
        verify(&self.webhook_secret, raw_body, signature)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}
