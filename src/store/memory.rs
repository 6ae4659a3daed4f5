use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CaptureOutcome, CaptureWrite, CompletionWrite, Store};
use crate::bookings::{Booking, BookingStatus, NewBooking, ProofProgress};
use crate::ops_issues::{IssueStatus, IssueType, NewOpsIssue, OpsIssue};
use crate::outbox::{NewOutboxTask, OutboxTask, OutboxTaskStatus};
use crate::payment_events::{NewPaymentEvent, PaymentEventModel};
use crate::payments::{NewPayment, Payment, PaymentStatus};
use crate::payouts::{PayoutEntry, PayoutStatus};
use crate::proofs::{NewProof, Proof, ProofStatus};
use crate::services::{NewService, NewServicePackage, Service, ServicePackage};

#[derive(Default)]
struct Tables {
    services: HashMap<Uuid, Service>,
    packages: HashMap<Uuid, ServicePackage>,
    bookings: HashMap<Uuid, Booking>,
    proofs: Vec<Proof>,
    payments: HashMap<Uuid, Payment>,
    payouts: Vec<PayoutEntry>,
    issues: Vec<OpsIssue>,
    events: HashMap<String, PaymentEventModel>,
    tasks: Vec<OutboxTask>,
}

impl Tables {
    fn payment_for_booking(&self, booking_id: Uuid) -> Option<&Payment> {
        self.payments
            .values()
            .find(|payment| payment.booking_id == booking_id)
    }

    fn usable_proofs(&self, booking_id: Uuid) -> i64 {
        self.proofs
            .iter()
            .filter(|proof| proof.booking_id == booking_id && proof.status.is_usable())
            .count() as i64
    }
}

/// In-process `Store` with the same conditional-write semantics as Postgres.
///
/// A single lock guards all tables, so each method is atomic the way a
/// transaction would be.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_service(&self, new_service: NewService) -> Result<Service> {
        let now = Utc::now();
        let service = Service {
            id: Uuid::now_v7(),
            name: new_service.name,
            published: new_service.published,
            bookable: new_service.bookable,
            base_price: new_service.base_price,
            currency: new_service.currency,
            proof_sla_hours: new_service.proof_sla_hours,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .await
            .services
            .insert(service.id, service.clone());
        Ok(service)
    }

    async fn create_package(&self, new_package: NewServicePackage) -> Result<ServicePackage> {
        let mut tables = self.tables.lock().await;
        anyhow::ensure!(
            tables.services.contains_key(&new_package.service_id),
            "service {} does not exist",
            new_package.service_id
        );
        let package = ServicePackage {
            id: Uuid::now_v7(),
            service_id: new_package.service_id,
            name: new_package.name,
            price: new_package.price,
            created_at: Utc::now(),
        };
        tables.packages.insert(package.id, package.clone());
        Ok(package)
    }

    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>> {
        Ok(self.tables.lock().await.services.get(&service_id).cloned())
    }

    async fn get_package(&self, package_id: Uuid) -> Result<Option<ServicePackage>> {
        Ok(self.tables.lock().await.packages.get(&package_id).cloned())
    }

    async fn create_booking(&self, new_booking: NewBooking) -> Result<Booking> {
        anyhow::ensure!(
            new_booking.scheduled_end > new_booking.scheduled_start,
            "scheduled_end must be after scheduled_start"
        );
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::now_v7(),
            user_id: new_booking.user_id,
            service_id: new_booking.service_id,
            package_id: new_booking.package_id,
            officiant_id: None,
            scheduled_start: new_booking.scheduled_start,
            scheduled_end: new_booking.scheduled_end,
            duration_minutes: new_booking.duration_minutes,
            total_amount: new_booking.total_amount,
            currency: new_booking.currency,
            notes: new_booking.notes,
            status: BookingStatus::PaymentPending,
            proof_status: ProofProgress::None,
            proof_sla_hours: new_booking.proof_sla_hours,
            proof_sla_deadline: new_booking.proof_sla_deadline,
            is_sla_breached: false,
            sla_breached_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .lock()
            .await
            .bookings
            .insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        Ok(self.tables.lock().await.bookings.get(&booking_id).cloned())
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Option<Booking>> {
        let mut tables = self.tables.lock().await;
        match tables.bookings.get_mut(&booking_id) {
            Some(booking) if from.contains(&booking.status) => {
                booking.status = to;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn assign_officiant(
        &self,
        booking_id: Uuid,
        officiant_id: Uuid,
        allowed: &[BookingStatus],
    ) -> Result<Option<Booking>> {
        let mut tables = self.tables.lock().await;
        match tables.bookings.get_mut(&booking_id) {
            Some(booking) if allowed.contains(&booking.status) => {
                booking.officiant_id = Some(officiant_id);
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_proof_uploaded(&self, booking_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.bookings.get_mut(&booking_id) {
            Some(booking) if booking.proof_status == ProofProgress::None => {
                booking.proof_status = ProofProgress::Uploaded;
                booking.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_booking(
        &self,
        booking_id: Uuid,
        approver_id: Uuid,
    ) -> Result<CompletionWrite> {
        let mut tables = self.tables.lock().await;
        let Some(status) = tables.bookings.get(&booking_id).map(|b| b.status) else {
            return Ok(CompletionWrite::BookingMissing);
        };
        if !status.can_transition_to(BookingStatus::Completed) {
            return Ok(CompletionWrite::StatusMismatch(status));
        }
        if tables.usable_proofs(booking_id) == 0 {
            return Ok(CompletionWrite::NoUsableProof);
        }

        let now = Utc::now();
        let mut approved_proofs = 0;
        for proof in tables
            .proofs
            .iter_mut()
            .filter(|p| p.booking_id == booking_id && p.status == ProofStatus::Uploaded)
        {
            proof.status = ProofStatus::Approved;
            proof.approver_id = Some(approver_id);
            proof.updated_at = now;
            approved_proofs += 1;
        }

        let booking = tables
            .bookings
            .get_mut(&booking_id)
            .context("booking vanished during completion")?;
        booking.status = BookingStatus::Completed;
        booking.proof_status = ProofProgress::Approved;
        booking.updated_at = now;

        Ok(CompletionWrite::Completed {
            booking: booking.clone(),
            approved_proofs,
        })
    }

    async fn list_sla_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Booking>> {
        let tables = self.tables.lock().await;
        let mut candidates: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| {
                b.proof_sla_deadline < now
                    && !b.is_sla_breached
                    && BookingStatus::SLA_WATCHED.contains(&b.status)
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|b| b.proof_sla_deadline);
        Ok(candidates)
    }

    async fn flag_sla_breach(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.bookings.get_mut(&booking_id) {
            Some(booking) if !booking.is_sla_breached => {
                booking.is_sla_breached = true;
                booking.sla_breached_at = Some(now);
                booking.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_breached_without_issue(&self, issue_type: IssueType) -> Result<Vec<Booking>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| {
                b.is_sla_breached
                    && !tables
                        .issues
                        .iter()
                        .any(|i| i.booking_id == b.id && i.issue_type == issue_type)
            })
            .cloned()
            .collect())
    }

    async fn insert_proof(&self, new_proof: NewProof) -> Result<Proof> {
        let mut tables = self.tables.lock().await;
        anyhow::ensure!(
            tables.bookings.contains_key(&new_proof.booking_id),
            "booking {} does not exist",
            new_proof.booking_id
        );
        let now = Utc::now();
        let proof = Proof {
            id: Uuid::now_v7(),
            booking_id: new_proof.booking_id,
            media_kind: new_proof.media_kind,
            storage_locator: new_proof.storage_locator,
            uploader_id: new_proof.uploader_id,
            status: ProofStatus::Uploaded,
            approver_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.proofs.push(proof.clone());
        Ok(proof)
    }

    async fn get_proof(&self, proof_id: Uuid) -> Result<Option<Proof>> {
        let tables = self.tables.lock().await;
        Ok(tables.proofs.iter().find(|p| p.id == proof_id).cloned())
    }

    async fn list_proofs(&self, booking_id: Uuid) -> Result<Vec<Proof>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .proofs
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn count_usable_proofs(&self, booking_id: Uuid) -> Result<i64> {
        Ok(self.tables.lock().await.usable_proofs(booking_id))
    }

    async fn approve_uploaded_proofs(&self, booking_id: Uuid, approver_id: Uuid) -> Result<usize> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let mut approved = 0;
        for proof in tables
            .proofs
            .iter_mut()
            .filter(|p| p.booking_id == booking_id && p.status == ProofStatus::Uploaded)
        {
            proof.status = ProofStatus::Approved;
            proof.approver_id = Some(approver_id);
            proof.updated_at = now;
            approved += 1;
        }
        Ok(approved)
    }

    async fn review_proof(
        &self,
        proof_id: Uuid,
        from: ProofStatus,
        to: ProofStatus,
        reviewer_id: Uuid,
    ) -> Result<Option<Proof>> {
        let mut tables = self.tables.lock().await;
        match tables.proofs.iter_mut().find(|p| p.id == proof_id) {
            Some(proof) if proof.status == from => {
                proof.status = to;
                proof.approver_id = Some(reviewer_id);
                proof.updated_at = Utc::now();
                Ok(Some(proof.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        let tables = self.tables.lock().await;
        Ok(tables.payment_for_booking(booking_id).cloned())
    }

    async fn get_payment_by_order(&self, provider_order_id: &str) -> Result<Option<Payment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .payments
            .values()
            .find(|p| p.provider_order_id == provider_order_id)
            .cloned())
    }

    async fn insert_payment_order(&self, new_payment: NewPayment) -> Result<Payment> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.payment_for_booking(new_payment.booking_id) {
            return Ok(existing.clone());
        }
        anyhow::ensure!(
            !tables
                .payments
                .values()
                .any(|p| p.provider_order_id == new_payment.provider_order_id),
            "provider order {} already belongs to another booking",
            new_payment.provider_order_id
        );

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::now_v7(),
            booking_id: new_payment.booking_id,
            provider: new_payment.provider,
            provider_order_id: new_payment.provider_order_id,
            provider_payment_id: None,
            provider_signature: None,
            amount: new_payment.amount,
            currency: new_payment.currency,
            status: PaymentStatus::Created,
            created_at: now,
            updated_at: now,
        };
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn advance_payment(
        &self,
        payment_id: Uuid,
        to: PaymentStatus,
        provider_payment_id: Option<String>,
    ) -> Result<Option<Payment>> {
        let mut tables = self.tables.lock().await;
        match tables.payments.get_mut(&payment_id) {
            Some(payment) if payment.status.can_advance_to(to) => {
                payment.status = to;
                if provider_payment_id.is_some() {
                    payment.provider_payment_id = provider_payment_id;
                }
                payment.updated_at = Utc::now();
                Ok(Some(payment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn apply_capture(&self, capture: CaptureWrite) -> Result<CaptureOutcome> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        let payment = tables
            .payments
            .get_mut(&capture.payment_id)
            .with_context(|| format!("payment {} not found", capture.payment_id))?;
        let payment_updated = payment.status.can_advance_to(PaymentStatus::Captured);
        if payment_updated {
            payment.status = PaymentStatus::Captured;
            payment.provider_payment_id = Some(capture.provider_payment_id.clone());
            if capture.provider_signature.is_some() {
                payment.provider_signature = capture.provider_signature.clone();
            }
            payment.updated_at = now;
        }
        let payment = payment.clone();

        let booking = tables
            .bookings
            .get_mut(&capture.booking_id)
            .with_context(|| format!("booking {} not found", capture.booking_id))?;
        let booking_confirmed = booking.status == BookingStatus::PaymentPending;
        if booking_confirmed {
            booking.status = BookingStatus::Confirmed;
            booking.updated_at = now;
        }
        let booking_status = booking.status;

        let payout = if BookingStatus::SETTLED.contains(&booking_status)
            && !tables
                .payouts
                .iter()
                .any(|entry| entry.booking_id == capture.booking_id)
        {
            let entry = PayoutEntry {
                id: Uuid::now_v7(),
                booking_id: capture.payout.booking_id,
                payment_id: capture.payout.payment_id,
                total_amount: capture.payout.total_amount,
                officiant_share: capture.payout.officiant_share,
                venue_share: capture.payout.venue_share,
                platform_fee: capture.payout.platform_fee,
                status: PayoutStatus::Pending,
                created_at: now,
            };
            tables.payouts.push(entry.clone());
            Some(entry)
        } else {
            None
        };

        Ok(CaptureOutcome {
            payment,
            payment_updated,
            booking_confirmed,
            booking_status,
            payout,
        })
    }

    async fn get_payout(&self, booking_id: Uuid) -> Result<Option<PayoutEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .payouts
            .iter()
            .find(|entry| entry.booking_id == booking_id)
            .cloned())
    }

    async fn open_issue(&self, new_issue: NewOpsIssue) -> Result<Option<OpsIssue>> {
        let mut tables = self.tables.lock().await;
        let already_open = tables.issues.iter().any(|i| {
            i.booking_id == new_issue.booking_id
                && i.issue_type == new_issue.issue_type
                && i.status == IssueStatus::Open
        });
        if already_open {
            return Ok(None);
        }
        let issue = OpsIssue {
            id: Uuid::now_v7(),
            booking_id: new_issue.booking_id,
            issue_type: new_issue.issue_type,
            severity: new_issue.severity,
            status: IssueStatus::Open,
            description: new_issue.description,
            created_at: Utc::now(),
            resolved_at: None,
        };
        tables.issues.push(issue.clone());
        Ok(Some(issue))
    }

    async fn find_open_issue(
        &self,
        booking_id: Uuid,
        issue_type: IssueType,
    ) -> Result<Option<OpsIssue>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .issues
            .iter()
            .find(|i| {
                i.booking_id == booking_id
                    && i.issue_type == issue_type
                    && i.status == IssueStatus::Open
            })
            .cloned())
    }

    async fn list_issues(&self, booking_id: Uuid) -> Result<Vec<OpsIssue>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .issues
            .iter()
            .filter(|i| i.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn record_payment_event(&self, new_event: NewPaymentEvent) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.events.contains_key(&new_event.event_id) {
            return Ok(false);
        }
        let event = PaymentEventModel {
            id: Uuid::now_v7(),
            event_id: new_event.event_id.clone(),
            event_type: new_event.event_type,
            processed: false,
            processing_error: None,
            payload: new_event.payload,
            created_at: Utc::now(),
        };
        tables.events.insert(new_event.event_id, event);
        Ok(true)
    }

    async fn is_payment_event_processed(&self, event_id: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.events.get(event_id).is_some_and(|e| e.processed))
    }

    async fn mark_payment_event_processed(&self, event_id: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(event) = tables.events.get_mut(event_id) {
            event.processed = true;
            event.processing_error = None;
        }
        Ok(())
    }

    async fn mark_payment_event_failed(&self, event_id: &str, error: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(event) = tables.events.get_mut(event_id) {
            event.processed = false;
            event.processing_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn enqueue_task(&self, new_task: NewOutboxTask) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let exists = tables
            .tasks
            .iter()
            .any(|t| t.kind == new_task.kind && t.booking_id == new_task.booking_id);
        if exists {
            return Ok(false);
        }
        let now = Utc::now();
        tables.tasks.push(OutboxTask {
            id: Uuid::now_v7(),
            kind: new_task.kind,
            booking_id: new_task.booking_id,
            status: OutboxTaskStatus::Pending,
            attempts: 0,
            last_error: None,
            next_attempt_at: new_task.next_attempt_at,
            created_at: now,
            updated_at: now,
        });
        Ok(true)
    }

    async fn claim_due_tasks(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: i64,
    ) -> Result<Vec<OutboxTask>> {
        let mut tables = self.tables.lock().await;
        let mut due: Vec<&mut OutboxTask> = tables
            .tasks
            .iter_mut()
            .filter(|t| t.status == OutboxTaskStatus::Pending && t.next_attempt_at <= now)
            .collect();
        due.sort_by_key(|t| t.next_attempt_at);

        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(due
            .into_iter()
            .take(limit)
            .map(|task| {
                task.next_attempt_at = now + lease;
                task.updated_at = Utc::now();
                task.clone()
            })
            .collect())
    }

    async fn complete_task(&self, task_id: Uuid) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if let Some(task) = tables.tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = OutboxTaskStatus::Done;
            task.attempts += 1;
            task.last_error = None;
            task.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn fail_task(
        &self,
        task_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        give_up: bool,
    ) -> Result<Option<OutboxTask>> {
        let mut tables = self.tables.lock().await;
        match tables.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) if task.status == OutboxTaskStatus::Pending => {
                task.status = if give_up {
                    OutboxTaskStatus::Dead
                } else {
                    OutboxTaskStatus::Pending
                };
                task.attempts += 1;
                task.last_error = Some(error.to_string());
                task.next_attempt_at = next_attempt_at;
                task.updated_at = Utc::now();
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_tasks(&self, booking_id: Uuid) -> Result<Vec<OutboxTask>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tasks
            .iter()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::OutboxTaskKind;
    use crate::ops_issues::IssueSeverity;
    use crate::payouts::NewPayoutEntry;
    use crate::settlement::SettlementPolicy;

    async fn seeded_booking(store: &MemoryStore) -> Booking {
        let now = Utc::now();
        let service = store
            .create_service(NewService {
                name: "Rudrabhishek".into(),
                published: true,
                bookable: true,
                base_price: 110_000,
                currency: "INR".into(),
                proof_sla_hours: None,
            })
            .await
            .unwrap();
        store
            .create_booking(NewBooking {
                user_id: Uuid::now_v7(),
                service_id: service.id,
                package_id: None,
                scheduled_start: now,
                scheduled_end: now + Duration::hours(1),
                duration_minutes: 60,
                total_amount: 110_000,
                currency: "INR".into(),
                notes: None,
                proof_sla_hours: 24,
                proof_sla_deadline: now + Duration::hours(25),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let booking = seeded_booking(&store).await;

        let cancelled = store
            .transition_booking(booking.id, &BookingStatus::PRE_TERMINAL, BookingStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.unwrap().status, BookingStatus::Cancelled);

        let confirmed = store
            .transition_booking(
                booking.id,
                &[BookingStatus::PaymentPending],
                BookingStatus::Confirmed,
            )
            .await
            .unwrap();
        assert!(confirmed.is_none());
    }

    #[tokio::test]
    async fn test_capture_twice_writes_one_payout() {
        let store = MemoryStore::new();
        let booking = seeded_booking(&store).await;
        let payment = store
            .insert_payment_order(NewPayment {
                booking_id: booking.id,
                provider: "razorpay".into(),
                provider_order_id: "order_1".into(),
                amount: booking.total_amount,
                currency: "INR".into(),
            })
            .await
            .unwrap();

        let split = SettlementPolicy::default().split(booking.total_amount);
        let capture = CaptureWrite {
            payment_id: payment.id,
            booking_id: booking.id,
            provider_payment_id: "pay_1".into(),
            provider_signature: None,
            payout: NewPayoutEntry::from_split(booking.id, payment.id, split),
        };

        let first = store.apply_capture(capture.clone()).await.unwrap();
        assert!(first.payment_updated);
        assert!(first.booking_confirmed);
        assert!(first.payout.is_some());

        let second = store.apply_capture(capture).await.unwrap();
        assert!(!second.payment_updated);
        assert!(!second.booking_confirmed);
        assert!(second.payout.is_none());
        assert_eq!(second.booking_status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_payment_order_is_never_replaced() {
        let store = MemoryStore::new();
        let booking = seeded_booking(&store).await;
        let order = |id: &str| NewPayment {
            booking_id: booking.id,
            provider: "razorpay".into(),
            provider_order_id: id.into(),
            amount: booking.total_amount,
            currency: "INR".into(),
        };

        let payment = store.insert_payment_order(order("order_1")).await.unwrap();
        let again = store.insert_payment_order(order("order_2")).await.unwrap();
        assert_eq!(again.id, payment.id);
        assert_eq!(again.provider_order_id, "order_1");
        assert!(store.get_payment_by_order("order_2").await.unwrap().is_none());

        store
            .advance_payment(payment.id, PaymentStatus::Failed, Some("pay_1".into()))
            .await
            .unwrap()
            .unwrap();
        let after_failure = store.insert_payment_order(order("order_3")).await.unwrap();
        assert_eq!(after_failure.provider_order_id, "order_1");
        assert_eq!(after_failure.status, PaymentStatus::Failed);
        let by_order = store.get_payment_by_order("order_1").await.unwrap().unwrap();
        assert_eq!(by_order.id, payment.id);
    }

    #[tokio::test]
    async fn test_one_open_issue_per_type() {
        let store = MemoryStore::new();
        let booking = seeded_booking(&store).await;
        let issue = || NewOpsIssue {
            booking_id: booking.id,
            issue_type: IssueType::SlaBreach,
            severity: IssueSeverity::Low,
            description: "proof missing".into(),
        };
        assert!(store.open_issue(issue()).await.unwrap().is_some());
        assert!(store.open_issue(issue()).await.unwrap().is_none());
        assert_eq!(store.list_issues(booking.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claimed_task_is_leased() {
        let store = MemoryStore::new();
        let booking = seeded_booking(&store).await;
        let now = Utc::now();
        assert!(
            store
                .enqueue_task(NewOutboxTask {
                    kind: OutboxTaskKind::CertificateGeneration,
                    booking_id: booking.id,
                    next_attempt_at: now,
                })
                .await
                .unwrap()
        );

        let claimed = store
            .claim_due_tasks(now, Duration::minutes(5), 10)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);

        let again = store
            .claim_due_tasks(now, Duration::minutes(5), 10)
            .await
            .unwrap();
        assert!(again.is_empty());
    }
}
