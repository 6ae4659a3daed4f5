use std::sync::Arc;

use crate::access::{Caller, Capability};
use crate::booking_machine::BookingMachine;
use crate::certificates::CertificateGenerator;
use crate::clock::Clock;
use crate::config::BookingPolicy;
use crate::errors::EngineResult;
use crate::gateway::PaymentGateway;
use crate::outbox_worker::OutboxWorker;
use crate::proof_ledger::ProofLedger;
use crate::reconciler::PaymentReconciler;
use crate::signature::SignatureVerifier;
use crate::sla_scanner::{SlaScanReport, SlaScanner};
use crate::store::SharedStore;

/// Collaborators the engine is built from
pub struct EngineDeps {
    pub store: SharedStore,
    pub gateway: Arc<dyn PaymentGateway>,
    pub certificates: Arc<dyn CertificateGenerator>,
    pub verifier: SignatureVerifier,
    pub clock: Arc<dyn Clock>,
    pub policy: BookingPolicy,
}

/// Booking lifecycle and payment reconciliation, wired over one store
#[derive(Clone)]
pub struct Engine {
    pub bookings: BookingMachine,
    pub proofs: ProofLedger,
    pub payments: PaymentReconciler,
    pub sla: SlaScanner,
    pub outbox: OutboxWorker,
    pub store: SharedStore,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(deps: EngineDeps) -> Self {
        let EngineDeps {
            store,
            gateway,
            certificates,
            verifier,
            clock,
            policy,
        } = deps;

        let proofs = ProofLedger::new(store.clone(), clock.clone());
        Self {
            bookings: BookingMachine::new(store.clone(), clock.clone(), policy.clone()),
            payments: PaymentReconciler::new(
                store.clone(),
                gateway,
                verifier,
                policy.settlement,
            ),
            sla: SlaScanner::new(store.clone(), proofs.clone()),
            outbox: OutboxWorker::new(store.clone(), certificates, policy.outbox_max_attempts),
            proofs,
            store,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Staff-triggered SLA sweep at the current time
    pub async fn scan_for_sla_breaches(&self, caller: &Caller) -> EngineResult<SlaScanReport> {
        caller.require_role(Capability::RunSlaScan)?;
        self.sla.scan(self.clock.now()).await
    }
}
