use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{CaptureOutcome, CaptureWrite, CompletionWrite, Store};
use crate::bookings::{Booking, BookingStatus, NewBooking};
use crate::bookings_repo::BookingsRepository;
use crate::ops_issues::{IssueType, NewOpsIssue, OpsIssue};
use crate::ops_issues_repo::OpsIssuesRepository;
use crate::outbox::{NewOutboxTask, OutboxTask};
use crate::outbox_repo::OutboxRepository;
use crate::payment_events::NewPaymentEvent;
use crate::payment_events_repo::PaymentEventsRepository;
use crate::payments::{NewPayment, Payment, PaymentStatus};
use crate::payments_repo::PaymentsRepository;
use crate::payouts::PayoutEntry;
use crate::payouts_repo::PayoutsRepository;
use crate::proofs::{NewProof, Proof, ProofStatus};
use crate::proofs_repo::ProofsRepository;
use crate::services::{NewService, NewServicePackage, Service, ServicePackage};
use crate::services_repo::ServicesRepository;
use crate::web::PgPool;

/// `Store` backed by PostgreSQL through the Diesel repositories
#[derive(Clone)]
pub struct PgStore {
    services: ServicesRepository,
    bookings: BookingsRepository,
    proofs: ProofsRepository,
    payments: PaymentsRepository,
    payouts: PayoutsRepository,
    issues: OpsIssuesRepository,
    events: PaymentEventsRepository,
    outbox: OutboxRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            services: ServicesRepository::new(pool.clone()),
            bookings: BookingsRepository::new(pool.clone()),
            proofs: ProofsRepository::new(pool.clone()),
            payments: PaymentsRepository::new(pool.clone()),
            payouts: PayoutsRepository::new(pool.clone()),
            issues: OpsIssuesRepository::new(pool.clone()),
            events: PaymentEventsRepository::new(pool.clone()),
            outbox: OutboxRepository::new(pool),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_service(&self, new_service: NewService) -> Result<Service> {
        self.services.create(new_service).await
    }

    async fn create_package(&self, new_package: NewServicePackage) -> Result<ServicePackage> {
        self.services.create_package(new_package).await
    }

    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>> {
        self.services.get_by_id(service_id).await
    }

    async fn get_package(&self, package_id: Uuid) -> Result<Option<ServicePackage>> {
        self.services.get_package(package_id).await
    }

    async fn create_booking(&self, new_booking: NewBooking) -> Result<Booking> {
        self.bookings.create(new_booking).await
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        self.bookings.get_by_id(booking_id).await
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Option<Booking>> {
        self.bookings
            .transition(booking_id, from.to_vec(), to)
            .await
    }

    async fn assign_officiant(
        &self,
        booking_id: Uuid,
        officiant_id: Uuid,
        allowed: &[BookingStatus],
    ) -> Result<Option<Booking>> {
        self.bookings
            .assign_officiant(booking_id, officiant_id, allowed.to_vec())
            .await
    }

    async fn mark_proof_uploaded(&self, booking_id: Uuid) -> Result<bool> {
        self.bookings.mark_proof_uploaded(booking_id).await
    }

    async fn complete_booking(
        &self,
        booking_id: Uuid,
        approver_id: Uuid,
    ) -> Result<CompletionWrite> {
        self.bookings.complete(booking_id, approver_id).await
    }

    async fn list_sla_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Booking>> {
        self.bookings.list_sla_candidates(now).await
    }

    async fn flag_sla_breach(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.bookings.flag_sla_breach(booking_id, now).await
    }

    async fn list_breached_without_issue(&self, issue_type: IssueType) -> Result<Vec<Booking>> {
        self.bookings.list_breached_without_issue(issue_type).await
    }

    async fn insert_proof(&self, new_proof: NewProof) -> Result<Proof> {
        self.proofs.create(new_proof).await
    }

    async fn get_proof(&self, proof_id: Uuid) -> Result<Option<Proof>> {
        self.proofs.get_by_id(proof_id).await
    }

    async fn list_proofs(&self, booking_id: Uuid) -> Result<Vec<Proof>> {
        self.proofs.get_by_booking_id(booking_id).await
    }

    async fn count_usable_proofs(&self, booking_id: Uuid) -> Result<i64> {
        self.proofs.count_usable(booking_id).await
    }

    async fn approve_uploaded_proofs(&self, booking_id: Uuid, approver_id: Uuid) -> Result<usize> {
        self.proofs.approve_uploaded(booking_id, approver_id).await
    }

    async fn review_proof(
        &self,
        proof_id: Uuid,
        from: ProofStatus,
        to: ProofStatus,
        reviewer_id: Uuid,
    ) -> Result<Option<Proof>> {
        self.proofs.review(proof_id, from, to, reviewer_id).await
    }

    async fn get_payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        self.payments.get_by_booking_id(booking_id).await
    }

    async fn get_payment_by_order(&self, provider_order_id: &str) -> Result<Option<Payment>> {
        self.payments.get_by_order_id(provider_order_id).await
    }

    async fn insert_payment_order(&self, new_payment: NewPayment) -> Result<Payment> {
        self.payments.insert_order(new_payment).await
    }

    async fn advance_payment(
        &self,
        payment_id: Uuid,
        to: PaymentStatus,
        provider_payment_id: Option<String>,
    ) -> Result<Option<Payment>> {
        self.payments
            .advance_status(payment_id, to, provider_payment_id)
            .await
    }

    async fn apply_capture(&self, capture: CaptureWrite) -> Result<CaptureOutcome> {
        self.payments.apply_capture(capture).await
    }

    async fn get_payout(&self, booking_id: Uuid) -> Result<Option<PayoutEntry>> {
        self.payouts.get_by_booking_id(booking_id).await
    }

    async fn open_issue(&self, new_issue: NewOpsIssue) -> Result<Option<OpsIssue>> {
        self.issues.create_if_absent(new_issue).await
    }

    async fn find_open_issue(
        &self,
        booking_id: Uuid,
        issue_type: IssueType,
    ) -> Result<Option<OpsIssue>> {
        self.issues.find_open(booking_id, issue_type).await
    }

    async fn list_issues(&self, booking_id: Uuid) -> Result<Vec<OpsIssue>> {
        self.issues.get_by_booking_id(booking_id).await
    }

    async fn record_payment_event(&self, new_event: NewPaymentEvent) -> Result<bool> {
        self.events.create(new_event).await
    }

    async fn is_payment_event_processed(&self, event_id: &str) -> Result<bool> {
        self.events.is_processed(event_id).await
    }

    async fn mark_payment_event_processed(&self, event_id: &str) -> Result<()> {
        self.events.mark_processed(event_id).await
    }

    async fn mark_payment_event_failed(&self, event_id: &str, error: &str) -> Result<()> {
        self.events.mark_failed(event_id, error).await
    }

    async fn enqueue_task(&self, new_task: NewOutboxTask) -> Result<bool> {
        self.outbox.enqueue(new_task).await
    }

    async fn claim_due_tasks(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: i64,
    ) -> Result<Vec<OutboxTask>> {
        self.outbox.claim_due(now, lease, limit).await
    }

    async fn complete_task(&self, task_id: Uuid) -> Result<()> {
        self.outbox.mark_done(task_id).await
    }

    async fn fail_task(
        &self,
        task_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        give_up: bool,
    ) -> Result<Option<OutboxTask>> {
        self.outbox
            .mark_failed(task_id, error, next_attempt_at, give_up)
            .await
    }

    async fn list_tasks(&self, booking_id: Uuid) -> Result<Vec<OutboxTask>> {
        self.outbox.get_by_booking_id(booking_id).await
    }
}
