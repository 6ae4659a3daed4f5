use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{Caller, Capability};
use crate::bookings::{Booking, BookingStatus};
use crate::clock::Clock;
use crate::errors::{EngineError, EngineResult};
use crate::outbox::{NewOutboxTask, OutboxTaskKind};
use crate::proofs::{MediaKind, NewProof, Proof, ProofDecision, ProofStatus};
use crate::store::SharedStore;

/// Tracks proof artifacts per booking and answers the completion gate
#[derive(Clone)]
pub struct ProofLedger {
    store: SharedStore,
    clock: Arc<dyn Clock>,
}

impl ProofLedger {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn load_booking(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("booking {}", booking_id)))
    }

    /// Store a new proof in `uploaded` state.
    ///
    /// The first proof of a booking queues certificate generation. Queueing
    /// failures are logged and never fail the upload.
    pub async fn record_proof(
        &self,
        caller: &Caller,
        booking_id: Uuid,
        media_kind: MediaKind,
        storage_locator: &str,
    ) -> EngineResult<Proof> {
        let booking = self.load_booking(booking_id).await?;
        caller.require(Capability::UploadProof, &booking)?;

        if matches!(
            booking.status,
            BookingStatus::PaymentPending | BookingStatus::Cancelled | BookingStatus::Refunded
        ) {
            return Err(EngineError::conflict(format!(
                "cannot upload proof for a {} booking",
                booking.status
            )));
        }

        let storage_locator = storage_locator.trim();
        if storage_locator.is_empty() {
            return Err(EngineError::invalid("storage locator must not be empty"));
        }

        let proof = self
            .store
            .insert_proof(NewProof {
                booking_id,
                media_kind,
                storage_locator: storage_locator.to_string(),
                uploader_id: caller.id,
            })
            .await?;
        metrics::counter!("proofs.uploaded_total").increment(1);

        let first_upload = self.store.mark_proof_uploaded(booking_id).await?;
        if first_upload {
            info!(%booking_id, proof_id = %proof.id, "First proof uploaded");
            self.queue_certificate(booking_id).await;
        }

        Ok(proof)
    }

    async fn queue_certificate(&self, booking_id: Uuid) {
        let task = NewOutboxTask {
            kind: OutboxTaskKind::CertificateGeneration,
            booking_id,
            next_attempt_at: self.clock.now(),
        };
        match self.store.enqueue_task(task).await {
            Ok(true) => {}
            Ok(false) => {
                info!(%booking_id, "Certificate generation already queued");
            }
            Err(e) => {
                metrics::counter!("outbox.enqueue_errors_total").increment(1);
                warn!(%booking_id, error = %e, "Failed to queue certificate generation");
            }
        }
    }

    /// Approve every `uploaded` proof of a booking, outside of completion.
    ///
    /// `BookingMachine::complete_booking` does not call this: it goes through
    /// `Store::complete_booking`, which applies the same approval in the
    /// completion write so a booking is never completed with proofs left
    /// `uploaded`.
    pub async fn approve_all(&self, booking_id: Uuid, approver_id: Uuid) -> EngineResult<usize> {
        Ok(self
            .store
            .approve_uploaded_proofs(booking_id, approver_id)
            .await?)
    }

    /// Proofs in `uploaded` or `approved` state, read fresh from the store
    pub async fn count_usable(&self, booking_id: Uuid) -> EngineResult<i64> {
        Ok(self.store.count_usable_proofs(booking_id).await?)
    }

    pub async fn list(&self, caller: &Caller, booking_id: Uuid) -> EngineResult<Vec<Proof>> {
        let booking = self.load_booking(booking_id).await?;
        caller.require(Capability::ViewBooking, &booking)?;
        Ok(self.store.list_proofs(booking_id).await?)
    }

    /// Moderate one uploaded proof. Repeating the same decision is a no-op.
    pub async fn review_proof(
        &self,
        caller: &Caller,
        proof_id: Uuid,
        decision: ProofDecision,
    ) -> EngineResult<Proof> {
        caller.require_role(Capability::ReviewProof)?;

        let target = decision.resulting_status();
        if let Some(reviewed) = self
            .store
            .review_proof(proof_id, ProofStatus::Uploaded, target, caller.id)
            .await?
        {
            info!(%proof_id, status = ?target, reviewer = %caller.id, "Proof reviewed");
            return Ok(reviewed);
        }

        let current = self
            .store
            .get_proof(proof_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("proof {}", proof_id)))?;
        if current.status == target {
            Ok(current)
        } else {
            Err(EngineError::conflict(format!(
                "proof {} is already {:?}",
                proof_id, current.status
            )))
        }
    }
}
