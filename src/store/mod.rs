//! Persistence seam for the booking engine.
//!
//! Every mutating method is a conditional write: it only takes effect when the
//! row is still in the state the caller assumed, and reports whether it did.
//! Callers never read-modify-write a status column themselves.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::bookings::{Booking, BookingStatus, NewBooking};
use crate::ops_issues::{IssueType, NewOpsIssue, OpsIssue};
use crate::outbox::{NewOutboxTask, OutboxTask};
use crate::payment_events::NewPaymentEvent;
use crate::payments::{NewPayment, Payment, PaymentStatus};
use crate::payouts::{NewPayoutEntry, PayoutEntry};
use crate::proofs::{NewProof, Proof, ProofStatus};
use crate::services::{NewService, NewServicePackage, Service, ServicePackage};

pub type SharedStore = Arc<dyn Store>;

/// Result of the atomic completion write
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionWrite {
    Completed { booking: Booking, approved_proofs: usize },
    /// Booking was not in a completable status; carries the status found
    StatusMismatch(BookingStatus),
    NoUsableProof,
    BookingMissing,
}

/// Everything written when a payment reaches captured
#[derive(Debug, Clone)]
pub struct CaptureWrite {
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub provider_payment_id: String,
    pub provider_signature: Option<String>,
    pub payout: NewPayoutEntry,
}

#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub payment: Payment,
    /// False when the payment was already captured (duplicate delivery)
    pub payment_updated: bool,
    /// True only for the write that moved payment_pending to confirmed
    pub booking_confirmed: bool,
    pub booking_status: BookingStatus,
    /// Present only when this write created the ledger entry
    pub payout: Option<PayoutEntry>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // Catalog
    async fn create_service(&self, new_service: NewService) -> Result<Service>;
    async fn create_package(&self, new_package: NewServicePackage) -> Result<ServicePackage>;
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>>;
    async fn get_package(&self, package_id: Uuid) -> Result<Option<ServicePackage>>;

    // Bookings
    async fn create_booking(&self, new_booking: NewBooking) -> Result<Booking>;
    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>>;
    /// Compare-and-set on status. `None` when the booking is missing or its
    /// status is not one of `from`.
    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Option<Booking>>;
    async fn assign_officiant(
        &self,
        booking_id: Uuid,
        officiant_id: Uuid,
        allowed: &[BookingStatus],
    ) -> Result<Option<Booking>>;
    /// Moves proof_status none -> uploaded; true only for the write that did it
    async fn mark_proof_uploaded(&self, booking_id: Uuid) -> Result<bool>;
    /// Completes the booking and approves its uploaded proofs in one unit
    async fn complete_booking(&self, booking_id: Uuid, approver_id: Uuid)
    -> Result<CompletionWrite>;
    async fn list_sla_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Booking>>;
    /// Sets is_sla_breached only if it is still false
    async fn flag_sla_breach(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<bool>;
    /// Breached bookings that never received an issue of `issue_type`
    async fn list_breached_without_issue(&self, issue_type: IssueType) -> Result<Vec<Booking>>;

    // Proofs
    async fn insert_proof(&self, new_proof: NewProof) -> Result<Proof>;
    async fn get_proof(&self, proof_id: Uuid) -> Result<Option<Proof>>;
    async fn list_proofs(&self, booking_id: Uuid) -> Result<Vec<Proof>>;
    async fn count_usable_proofs(&self, booking_id: Uuid) -> Result<i64>;
    async fn approve_uploaded_proofs(&self, booking_id: Uuid, approver_id: Uuid) -> Result<usize>;
    async fn review_proof(
        &self,
        proof_id: Uuid,
        from: ProofStatus,
        to: ProofStatus,
        reviewer_id: Uuid,
    ) -> Result<Option<Proof>>;

    // Payments
    async fn get_payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>>;
    async fn get_payment_by_order(&self, provider_order_id: &str) -> Result<Option<Payment>>;
    /// Inserts the booking's payment row. A booking has one row for its
    /// lifetime: when one exists it is returned unchanged, order id included.
    async fn insert_payment_order(&self, new_payment: NewPayment) -> Result<Payment>;
    /// Forward-only status move for non-capture events
    async fn advance_payment(
        &self,
        payment_id: Uuid,
        to: PaymentStatus,
        provider_payment_id: Option<String>,
    ) -> Result<Option<Payment>>;
    async fn apply_capture(&self, capture: CaptureWrite) -> Result<CaptureOutcome>;
    async fn get_payout(&self, booking_id: Uuid) -> Result<Option<PayoutEntry>>;

    // Ops issues
    /// `None` when an open issue of the same type already exists for the booking
    async fn open_issue(&self, new_issue: NewOpsIssue) -> Result<Option<OpsIssue>>;
    async fn find_open_issue(
        &self,
        booking_id: Uuid,
        issue_type: IssueType,
    ) -> Result<Option<OpsIssue>>;
    async fn list_issues(&self, booking_id: Uuid) -> Result<Vec<OpsIssue>>;

    // Webhook journal
    /// False when the event id was already journaled
    async fn record_payment_event(&self, new_event: NewPaymentEvent) -> Result<bool>;
    async fn is_payment_event_processed(&self, event_id: &str) -> Result<bool>;
    async fn mark_payment_event_processed(&self, event_id: &str) -> Result<()>;
    /// Records the error and leaves the event unprocessed so a redelivery retries it
    async fn mark_payment_event_failed(&self, event_id: &str, error: &str) -> Result<()>;

    // Outbox
    /// False when a task of the same kind already exists for the booking
    async fn enqueue_task(&self, new_task: NewOutboxTask) -> Result<bool>;
    /// Leases up to `limit` due pending tasks by pushing next_attempt_at past `now + lease`
    async fn claim_due_tasks(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: i64,
    ) -> Result<Vec<OutboxTask>>;
    async fn complete_task(&self, task_id: Uuid) -> Result<()>;
    async fn fail_task(
        &self,
        task_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        give_up: bool,
    ) -> Result<Option<OutboxTask>>;
    async fn list_tasks(&self, booking_id: Uuid) -> Result<Vec<OutboxTask>>;
}
