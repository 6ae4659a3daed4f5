//! Brings payment and booking state into line with the payment provider.
//!
//! Both the client-side checkout confirmation and the provider's webhooks
//! may deliver the same real-world event any number of times, in any order.
//! Every write below is conditional, so replays change nothing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::access::{Caller, Capability};
use crate::bookings::{Booking, BookingStatus};
use crate::errors::{EngineError, EngineResult};
use crate::gateway::{PaymentGateway, provider_status};
use crate::ops_issues::{IssueSeverity, IssueType, NewOpsIssue};
use crate::payment_events::NewPaymentEvent;
use crate::payments::{NewPayment, Payment, PaymentStatus};
use crate::payouts::NewPayoutEntry;
use crate::settlement::SettlementPolicy;
use crate::signature::SignatureVerifier;
use crate::store::{CaptureWrite, SharedStore};

/// Order handed back to the client to open the provider checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub provider: String,
    pub provider_order_id: String,
    pub amount: i64,
    pub currency: String,
}

impl From<Payment> for PaymentOrder {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.id,
            booking_id: payment.booking_id,
            provider: payment.provider,
            provider_order_id: payment.provider_order_id,
            amount: payment.amount,
            currency: payment.currency,
        }
    }
}

/// State after a provider event has been applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    /// True only for the delivery that moved the booking to confirmed
    pub booking_confirmed: bool,
    pub payout_created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAck {
    Processed,
    /// Event id already processed; nothing was done
    Duplicate,
    /// Event type or order not handled here
    Ignored,
    /// Capture for an order no payment row carries; left for staff
    Unmatched,
    /// Signed body that cannot be parsed; redelivery cannot help
    Malformed,
}

impl WebhookAck {
    /// Reason recorded on the journal row for acks that need a human
    fn journal_error(self) -> Option<&'static str> {
        match self {
            WebhookAck::Unmatched => Some("capture matches no payment order"),
            WebhookAck::Malformed => Some("webhook body could not be parsed"),
            WebhookAck::Processed | WebhookAck::Duplicate | WebhookAck::Ignored => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    payload: WebhookPayload,
}

impl WebhookEnvelope {
    /// Booking named by the order receipt or the payment notes, if any
    fn booking_hint(&self) -> Option<Uuid> {
        let from_receipt = self
            .payload
            .order
            .as_ref()
            .and_then(|order| order.entity.receipt.as_deref());
        let from_notes = self
            .payload
            .payment
            .as_ref()
            .and_then(|payment| payment.entity.notes.get("booking_id"))
            .and_then(|value| value.as_str());
        from_receipt
            .into_iter()
            .chain(from_notes)
            .find_map(|candidate| candidate.parse().ok())
    }
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    payment: Option<EntityWrapper<PaymentEntity>>,
    order: Option<EntityWrapper<OrderEntity>>,
}

#[derive(Debug, Deserialize)]
struct EntityWrapper<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    amount: i64,
    status: String,
    /// Object, or an empty array when the order had none
    #[serde(default)]
    notes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OrderEntity {
    receipt: Option<String>,
}

/// Journal key for a webhook delivery
pub fn webhook_event_id(header: Option<&str>, raw_body: &[u8]) -> String {
    match header.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => hex::encode(Sha256::digest(raw_body)),
    }
}

/// The booking's existing order, while the checkout can still be paid on it.
///
/// A failed attempt keeps its order: the provider accepts retries on the same
/// order and a late capture must still find its payment row.
fn reuse_order(existing: Payment, amount: i64) -> EngineResult<PaymentOrder> {
    match existing.status {
        PaymentStatus::Created | PaymentStatus::Failed if existing.amount == amount => {
            Ok(existing.into())
        }
        PaymentStatus::Created | PaymentStatus::Failed => Err(EngineError::AmountMismatch {
            expected: existing.amount,
            actual: amount,
        }),
        PaymentStatus::Authorized | PaymentStatus::Captured => Err(EngineError::conflict(
            "booking already has an authorized or captured payment",
        )),
    }
}

#[derive(Clone)]
pub struct PaymentReconciler {
    store: SharedStore,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    policy: SettlementPolicy,
}

impl PaymentReconciler {
    pub fn new(
        store: SharedStore,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        policy: SettlementPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            policy,
        }
    }

    async fn load_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("booking {}", booking_id)))
    }

    /// Create (or reuse) the provider order for a booking awaiting payment.
    ///
    /// `amount` is what the client believes it is paying and must equal the
    /// booking total.
    pub async fn create_payment_order(
        &self,
        caller: &Caller,
        booking_id: Uuid,
        amount: i64,
    ) -> EngineResult<PaymentOrder> {
        let booking = self.load_booking(booking_id).await?;
        caller.require(Capability::PayForBooking, &booking)?;

        if amount <= 0 {
            return Err(EngineError::invalid("amount must be positive"));
        }
        if amount != booking.total_amount {
            return Err(EngineError::AmountMismatch {
                expected: booking.total_amount,
                actual: amount,
            });
        }
        if booking.status != BookingStatus::PaymentPending {
            return Err(EngineError::conflict(format!(
                "booking is {}, not awaiting payment",
                booking.status
            )));
        }

        if let Some(existing) = self.store.get_payment_by_booking(booking_id).await? {
            return reuse_order(existing, amount);
        }

        let order = self
            .gateway
            .create_order(amount, &booking.currency, &booking_id.to_string())
            .await
            .map_err(|e| {
                warn!(%booking_id, error = %e, "Payment provider order creation failed");
                EngineError::ProviderError(e.to_string())
            })?;

        if order.amount != amount {
            return Err(EngineError::AmountMismatch {
                expected: amount,
                actual: order.amount,
            });
        }

        let payment = self
            .store
            .insert_payment_order(NewPayment {
                booking_id,
                provider: self.gateway.provider().to_string(),
                provider_order_id: order.id.clone(),
                amount,
                currency: booking.currency.clone(),
            })
            .await?;
        if payment.provider_order_id != order.id {
            // A concurrent request stored its order first; ours is never paid
            warn!(
                %booking_id,
                unused_order_id = %order.id,
                provider_order_id = %payment.provider_order_id,
                "Lost order creation race"
            );
            return reuse_order(payment, amount);
        }

        info!(%booking_id, provider_order_id = %payment.provider_order_id, "Payment order created");
        metrics::counter!("payments.orders_created_total").increment(1);
        Ok(payment.into())
    }

    /// Apply a checkout confirmation submitted by the client.
    ///
    /// The signature proves the ids came from the provider; the status is then
    /// read from the provider rather than trusted from the client.
    pub async fn confirm_payment(
        &self,
        caller: &Caller,
        booking_id: Uuid,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> EngineResult<ReconcileOutcome> {
        let booking = self.load_booking(booking_id).await?;
        caller.require(Capability::PayForBooking, &booking)?;

        if let Err(e) =
            self.verifier
                .verify_checkout(provider_order_id, provider_payment_id, signature)
        {
            metrics::counter!("payments.confirmation.signature_invalid_total").increment(1);
            warn!(%booking_id, provider_order_id, "Checkout signature rejected");
            return Err(e);
        }

        let payment = self
            .store
            .get_payment_by_order(provider_order_id)
            .await?
            .filter(|payment| payment.booking_id == booking_id)
            .ok_or_else(|| {
                EngineError::not_found(format!(
                    "payment order {} for booking {}",
                    provider_order_id, booking_id
                ))
            })?;

        if payment.status == PaymentStatus::Captured {
            return Ok(ReconcileOutcome {
                payment_id: payment.id,
                booking_id,
                payment_status: payment.status,
                booking_status: booking.status,
                booking_confirmed: false,
                payout_created: false,
            });
        }

        let remote = self
            .gateway
            .fetch_payment(provider_payment_id)
            .await
            .map_err(|e| {
                warn!(%booking_id, provider_payment_id, error = %e, "Payment lookup failed");
                EngineError::ProviderError(e.to_string())
            })?;

        if remote
            .order_id
            .as_deref()
            .is_some_and(|order_id| order_id != provider_order_id)
        {
            return Err(EngineError::invalid(format!(
                "payment {} does not belong to order {}",
                provider_payment_id, provider_order_id
            )));
        }
        if remote.amount != payment.amount {
            return Err(EngineError::AmountMismatch {
                expected: payment.amount,
                actual: remote.amount,
            });
        }

        let status = remote.local_status().ok_or_else(|| {
            EngineError::ProviderError(format!("unexpected payment status {}", remote.status))
        })?;

        self.apply_status(
            payment,
            status,
            provider_payment_id.to_string(),
            Some(signature.to_string()),
        )
        .await
    }

    /// Verify, journal and apply one webhook delivery.
    ///
    /// Returns an error for anything the provider should redeliver.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: &str,
        event_id_header: Option<&str>,
    ) -> EngineResult<WebhookAck> {
        let started = Instant::now();
        metrics::counter!("payments.webhook.received_total").increment(1);

        if let Err(e) = self.verifier.verify_webhook(raw_body, signature) {
            metrics::counter!("payments.webhook.signature_invalid_total").increment(1);
            warn!("Webhook signature rejected");
            return Err(e);
        }

        let event_id = webhook_event_id(event_id_header, raw_body);
        if self.store.is_payment_event_processed(&event_id).await? {
            info!(event_id, "Duplicate webhook delivery ignored");
            metrics::counter!("payments.webhook.duplicate_total").increment(1);
            return Ok(WebhookAck::Duplicate);
        }

        let parsed = serde_json::from_slice::<serde_json::Value>(raw_body).and_then(|payload| {
            serde_json::from_value::<WebhookEnvelope>(payload.clone())
                .map(|envelope| (envelope, payload))
        });
        let (envelope, payload) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(event_id, error = %e, "Signed webhook body is not a provider event");
                metrics::counter!("payments.webhook.malformed_total").increment(1);
                self.journal_unreadable(&event_id, raw_body, &e.to_string())
                    .await?;
                return Ok(WebhookAck::Malformed);
            }
        };

        self.store
            .record_payment_event(NewPaymentEvent {
                event_id: event_id.clone(),
                event_type: envelope.event.clone(),
                payload,
            })
            .await?;

        let result = self.process_webhook(&envelope).await;
        match &result {
            Ok(ack) => match ack.journal_error() {
                Some(reason) => {
                    self.store
                        .mark_payment_event_failed(&event_id, reason)
                        .await?;
                    warn!(event_id, event = %envelope.event, ?ack, "Webhook left for review");
                }
                None => {
                    self.store.mark_payment_event_processed(&event_id).await?;
                    info!(event_id, event = %envelope.event, ?ack, "Webhook processed");
                }
            },
            Err(e) => {
                error!(event_id, event = %envelope.event, error = %e, "Webhook processing failed");
                if let Err(mark_err) = self
                    .store
                    .mark_payment_event_failed(&event_id, &e.to_string())
                    .await
                {
                    error!(event_id, error = %mark_err, "Failed to record webhook failure");
                }
            }
        }

        metrics::histogram!("payments.webhook.processing_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Keep an unparseable body in the journal with the parse error
    async fn journal_unreadable(
        &self,
        event_id: &str,
        raw_body: &[u8],
        error: &str,
    ) -> EngineResult<()> {
        self.store
            .record_payment_event(NewPaymentEvent {
                event_id: event_id.to_string(),
                event_type: "malformed".to_string(),
                payload: serde_json::json!({ "raw": String::from_utf8_lossy(raw_body) }),
            })
            .await?;
        self.store
            .mark_payment_event_failed(event_id, &format!("malformed body: {}", error))
            .await?;
        Ok(())
    }

    async fn process_webhook(&self, envelope: &WebhookEnvelope) -> EngineResult<WebhookAck> {
        let target = match envelope.event.as_str() {
            "payment.captured" | "order.paid" => PaymentStatus::Captured,
            "payment.authorized" => PaymentStatus::Authorized,
            "payment.failed" => PaymentStatus::Failed,
            other => {
                info!(event = other, "Unhandled webhook event type");
                return Ok(WebhookAck::Ignored);
            }
        };

        let Some(entity) = envelope.payload.payment.as_ref().map(|wrapper| &wrapper.entity)
        else {
            error!(event = %envelope.event, "Payment event carries no payment entity");
            metrics::counter!("payments.webhook.malformed_total").increment(1);
            return Ok(WebhookAck::Malformed);
        };

        // The entity status is authoritative when it is further along than the event name
        let target = match provider_status(&entity.status) {
            Some(PaymentStatus::Captured) => PaymentStatus::Captured,
            _ => target,
        };

        let payment = match entity.order_id.as_deref() {
            Some(order_id) => self.store.get_payment_by_order(order_id).await?,
            None => None,
        };
        let Some(payment) = payment else {
            if target == PaymentStatus::Captured {
                return self.flag_unmatched_capture(envelope, entity).await;
            }
            warn!(
                provider_payment_id = %entity.id,
                provider_order_id = ?entity.order_id,
                "Webhook for unknown order acknowledged"
            );
            return Ok(WebhookAck::Ignored);
        };

        if entity.amount != payment.amount {
            return Err(EngineError::AmountMismatch {
                expected: payment.amount,
                actual: entity.amount,
            });
        }

        self.apply_status(payment, target, entity.id.clone(), None)
            .await?;
        Ok(WebhookAck::Processed)
    }

    /// Funds were collected on an order nothing here tracks
    async fn flag_unmatched_capture(
        &self,
        envelope: &WebhookEnvelope,
        entity: &PaymentEntity,
    ) -> EngineResult<WebhookAck> {
        error!(
            provider_payment_id = %entity.id,
            provider_order_id = ?entity.order_id,
            amount = entity.amount,
            "Captured payment matches no payment order"
        );
        metrics::counter!("payments.captured_unmatched_total").increment(1);

        let booking = match envelope.booking_hint() {
            Some(booking_id) => self.store.get_booking(booking_id).await?,
            None => None,
        };
        if let Some(booking) = booking {
            let issue = NewOpsIssue {
                booking_id: booking.id,
                issue_type: IssueType::UnmatchedCapture,
                severity: IssueSeverity::High,
                description: format!(
                    "Payment {} of {} captured on order {} which no payment row carries",
                    entity.id,
                    entity.amount,
                    entity.order_id.as_deref().unwrap_or("(none)")
                ),
            };
            if self.store.open_issue(issue).await?.is_some() {
                warn!(booking_id = %booking.id, "Opened issue for unmatched capture");
            }
        }
        Ok(WebhookAck::Unmatched)
    }

    /// Move a payment (and on capture its booking) to the provider's status
    async fn apply_status(
        &self,
        payment: Payment,
        status: PaymentStatus,
        provider_payment_id: String,
        provider_signature: Option<String>,
    ) -> EngineResult<ReconcileOutcome> {
        match status {
            PaymentStatus::Captured => {
                self.apply_capture(payment, provider_payment_id, provider_signature)
                    .await
            }
            PaymentStatus::Authorized | PaymentStatus::Failed => {
                let updated = self
                    .store
                    .advance_payment(payment.id, status, Some(provider_payment_id))
                    .await?;
                let payment = match updated {
                    Some(updated) => {
                        info!(
                            booking_id = %updated.booking_id,
                            payment_id = %updated.id,
                            status = ?updated.status,
                            "Payment status advanced"
                        );
                        if updated.status == PaymentStatus::Failed {
                            metrics::counter!("payments.failed_total").increment(1);
                        }
                        updated
                    }
                    None => payment,
                };
                let booking = self.load_booking(payment.booking_id).await?;
                Ok(ReconcileOutcome {
                    payment_id: payment.id,
                    booking_id: payment.booking_id,
                    payment_status: payment.status,
                    booking_status: booking.status,
                    booking_confirmed: false,
                    payout_created: false,
                })
            }
            PaymentStatus::Created => {
                let booking = self.load_booking(payment.booking_id).await?;
                Ok(ReconcileOutcome {
                    payment_id: payment.id,
                    booking_id: payment.booking_id,
                    payment_status: payment.status,
                    booking_status: booking.status,
                    booking_confirmed: false,
                    payout_created: false,
                })
            }
        }
    }

    async fn apply_capture(
        &self,
        payment: Payment,
        provider_payment_id: String,
        provider_signature: Option<String>,
    ) -> EngineResult<ReconcileOutcome> {
        let booking_id = payment.booking_id;
        let split = self.policy.split(payment.amount);
        debug_assert!(split.is_balanced());

        let outcome = self
            .store
            .apply_capture(CaptureWrite {
                payment_id: payment.id,
                booking_id,
                provider_payment_id,
                provider_signature,
                payout: NewPayoutEntry::from_split(booking_id, payment.id, split),
            })
            .await?;

        if outcome.payment_updated {
            metrics::counter!("payments.captured_total").increment(1);
        }
        if outcome.booking_confirmed {
            info!(%booking_id, payment_id = %payment.id, "Booking confirmed by captured payment");
            metrics::counter!("bookings.confirmed_total").increment(1);
        }
        if let Some(payout) = &outcome.payout {
            info!(
                %booking_id,
                platform_fee = payout.platform_fee,
                venue_share = payout.venue_share,
                officiant_share = payout.officiant_share,
                "Payout ledger entry created"
            );
        }

        if outcome.payment_updated && !BookingStatus::SETTLED.contains(&outcome.booking_status) {
            self.flag_inactive_capture(booking_id, outcome.booking_status, payment.amount)
                .await;
        }

        Ok(ReconcileOutcome {
            payment_id: outcome.payment.id,
            booking_id,
            payment_status: outcome.payment.status,
            booking_status: outcome.booking_status,
            booking_confirmed: outcome.booking_confirmed,
            payout_created: outcome.payout.is_some(),
        })
    }

    /// Funds were collected for a booking that can no longer be served
    async fn flag_inactive_capture(&self, booking_id: Uuid, status: BookingStatus, amount: i64) {
        warn!(%booking_id, %status, amount, "Payment captured for inactive booking");
        metrics::counter!("payments.captured_inactive_total").increment(1);

        let issue = NewOpsIssue {
            booking_id,
            issue_type: IssueType::CaptureOnInactiveBooking,
            severity: IssueSeverity::High,
            description: format!(
                "Payment of {} captured after booking became {}; refund required",
                amount, status
            ),
        };
        if let Err(e) = self.store.open_issue(issue).await {
            error!(%booking_id, error = %e, "Failed to open capture issue");
        }
    }
}
