//! Canonical booking lifecycle.
//!
//! `payment_pending -> confirmed -> in_progress -> completed`, with
//! `cancelled` reachable from every pre-terminal state and `refunded` from
//! confirmed or completed.
//!
//! Every transition is a compare-and-set against the stored status. When the
//! set fails because another request already produced the state this caller
//! asked for, the call succeeds without writing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::access::{Caller, Capability};
use crate::bookings::{Booking, BookingStatus, NewBooking};
use crate::clock::Clock;
use crate::config::BookingPolicy;
use crate::errors::{EngineError, EngineResult};
use crate::sla;
use crate::store::{CompletionWrite, SharedStore};

/// Everything a devotee submits when requesting a booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub service_id: Uuid,
    #[serde(default)]
    pub package_id: Option<Uuid>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct BookingMachine {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
}

impl BookingMachine {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, policy: BookingPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    async fn load(&self, booking_id: Uuid) -> EngineResult<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("booking {}", booking_id)))
    }

    /// Re-read after a failed compare-and-set. `Ok` when the booking already
    /// holds `wanted`.
    async fn settle_lost_race(
        &self,
        booking_id: Uuid,
        wanted: BookingStatus,
        action: &str,
    ) -> EngineResult<Booking> {
        let current = self.load(booking_id).await?;
        if current.status == wanted {
            Ok(current)
        } else {
            Err(EngineError::conflict(format!(
                "cannot {} a {} booking",
                action, current.status
            )))
        }
    }

    pub async fn create_booking(
        &self,
        caller: &Caller,
        request: BookingRequest,
    ) -> EngineResult<Booking> {
        if request.scheduled_end <= request.scheduled_start {
            return Err(EngineError::invalid("scheduled_end must be after scheduled_start"));
        }
        if request.scheduled_start < self.clock.now() {
            return Err(EngineError::invalid("scheduled_start is in the past"));
        }

        let service = self
            .store
            .get_service(request.service_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("service {}", request.service_id)))?;
        if !service.is_open_for_booking() {
            return Err(EngineError::conflict(format!(
                "service {} is not open for booking",
                service.id
            )));
        }

        let total_amount = match request.package_id {
            Some(package_id) => {
                let package = self
                    .store
                    .get_package(package_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found(format!("package {}", package_id)))?;
                if package.service_id != service.id {
                    return Err(EngineError::invalid(format!(
                        "package {} does not belong to service {}",
                        package_id, service.id
                    )));
                }
                package.price
            }
            None => service.base_price,
        };

        let duration_minutes =
            i32::try_from((request.scheduled_end - request.scheduled_start).num_minutes())
                .map_err(|_| EngineError::invalid("booking window is too long"))?;
        let proof_sla_hours = service
            .proof_sla_hours
            .unwrap_or(self.policy.default_proof_sla_hours);
        let notes = request
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let booking = self
            .store
            .create_booking(NewBooking {
                user_id: caller.id,
                service_id: service.id,
                package_id: request.package_id,
                scheduled_start: request.scheduled_start,
                scheduled_end: request.scheduled_end,
                duration_minutes,
                total_amount,
                currency: service.currency.clone(),
                notes,
                proof_sla_hours,
                proof_sla_deadline: sla::proof_deadline(request.scheduled_end, proof_sla_hours),
            })
            .await?;

        info!(
            booking_id = %booking.id,
            service_id = %service.id,
            total_amount,
            "Booking created"
        );
        metrics::counter!("bookings.created_total").increment(1);
        Ok(booking)
    }

    pub async fn get_booking(&self, caller: &Caller, booking_id: Uuid) -> EngineResult<Booking> {
        let booking = self.load(booking_id).await?;
        caller.require(Capability::ViewBooking, &booking)?;
        Ok(booking)
    }

    /// Set the officiant. Allowed until the booking reaches a terminal state.
    pub async fn assign_officiant(
        &self,
        caller: &Caller,
        booking_id: Uuid,
        officiant_id: Uuid,
    ) -> EngineResult<Booking> {
        let booking = self.load(booking_id).await?;
        caller.require(Capability::AssignOfficiant, &booking)?;

        match self
            .store
            .assign_officiant(booking_id, officiant_id, &BookingStatus::PRE_TERMINAL)
            .await?
        {
            Some(updated) => {
                info!(%booking_id, %officiant_id, "Officiant assigned");
                Ok(updated)
            }
            None => {
                let current = self.load(booking_id).await?;
                Err(EngineError::conflict(format!(
                    "cannot assign an officiant to a {} booking",
                    current.status
                )))
            }
        }
    }

    pub async fn start_service(&self, caller: &Caller, booking_id: Uuid) -> EngineResult<Booking> {
        let booking = self.load(booking_id).await?;
        caller.require(Capability::StartService, &booking)?;

        if booking.status == BookingStatus::InProgress {
            return Ok(booking);
        }

        match self
            .store
            .transition_booking(booking_id, &[BookingStatus::Confirmed], BookingStatus::InProgress)
            .await?
        {
            Some(updated) => {
                info!(%booking_id, "Service started");
                Ok(updated)
            }
            None => {
                self.settle_lost_race(booking_id, BookingStatus::InProgress, "start")
                    .await
            }
        }
    }

    /// Complete a booking once it has proof.
    ///
    /// Outside the grace window after the scheduled end only callers allowed
    /// to force late completion may complete. Completion approves all
    /// uploaded proofs in the same write.
    pub async fn complete_booking(
        &self,
        caller: &Caller,
        booking_id: Uuid,
    ) -> EngineResult<Booking> {
        let booking = self.load(booking_id).await?;
        caller.require(Capability::CompleteBooking, &booking)?;

        if booking.status == BookingStatus::Completed {
            return Ok(booking);
        }
        if !booking.status.can_transition_to(BookingStatus::Completed) {
            return Err(EngineError::conflict(format!(
                "cannot complete a {} booking",
                booking.status
            )));
        }

        let now = self.clock.now();
        if !sla::within_completion_window(
            booking.scheduled_end,
            now,
            self.policy.completion_grace_hours,
        ) && !caller.permits(Capability::ForceLateCompletion, Some(&booking))
        {
            return Err(EngineError::forbidden(format!(
                "completion window closed {}h after scheduled end; an administrator must complete",
                self.policy.completion_grace_hours
            )));
        }

        match self.store.complete_booking(booking_id, caller.id).await? {
            CompletionWrite::Completed {
                booking,
                approved_proofs,
            } => {
                info!(
                    %booking_id,
                    completed_by = %caller.id,
                    approved_proofs,
                    "Booking completed"
                );
                metrics::counter!("bookings.completed_total").increment(1);
                Ok(booking)
            }
            CompletionWrite::StatusMismatch(BookingStatus::Completed) => self.load(booking_id).await,
            CompletionWrite::StatusMismatch(status) => Err(EngineError::conflict(format!(
                "cannot complete a {} booking",
                status
            ))),
            CompletionWrite::NoUsableProof => Err(EngineError::conflict(
                "at least one uploaded or approved proof is required to complete",
            )),
            CompletionWrite::BookingMissing => {
                Err(EngineError::not_found(format!("booking {}", booking_id)))
            }
        }
    }

    pub async fn cancel_booking(&self, caller: &Caller, booking_id: Uuid) -> EngineResult<Booking> {
        let booking = self.load(booking_id).await?;
        caller.require(Capability::CancelBooking, &booking)?;

        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        match self
            .store
            .transition_booking(
                booking_id,
                &BookingStatus::PRE_TERMINAL,
                BookingStatus::Cancelled,
            )
            .await?
        {
            Some(updated) => {
                info!(%booking_id, cancelled_by = %caller.id, "Booking cancelled");
                metrics::counter!("bookings.cancelled_total").increment(1);
                Ok(updated)
            }
            None => {
                self.settle_lost_race(booking_id, BookingStatus::Cancelled, "cancel")
                    .await
            }
        }
    }

    pub async fn refund_booking(&self, caller: &Caller, booking_id: Uuid) -> EngineResult<Booking> {
        let booking = self.load(booking_id).await?;
        caller.require(Capability::RefundBooking, &booking)?;

        if booking.status == BookingStatus::Refunded {
            return Ok(booking);
        }

        match self
            .store
            .transition_booking(
                booking_id,
                &[BookingStatus::Confirmed, BookingStatus::Completed],
                BookingStatus::Refunded,
            )
            .await?
        {
            Some(updated) => {
                info!(%booking_id, refunded_by = %caller.id, "Booking refunded");
                metrics::counter!("bookings.refunded_total").increment(1);
                Ok(updated)
            }
            None => {
                self.settle_lost_race(booking_id, BookingStatus::Refunded, "refund")
                    .await
            }
        }
    }
}
