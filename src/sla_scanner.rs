use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::bookings::Booking;
use crate::errors::EngineResult;
use crate::ops_issues::{IssueType, NewOpsIssue};
use crate::proof_ledger::ProofLedger;
use crate::sla;
use crate::store::SharedStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaScanReport {
    /// Bookings past their deadline with no usable proof
    pub breaches_found: usize,
    /// Breaches this scan flagged; overlapping scans never count one twice
    pub breaches_processed: usize,
    pub issues_created: usize,
    pub errors: Vec<String>,
}

/// Periodic sweep raising one `sla_breach` issue per booking whose proof
/// deadline passed without usable proof.
///
/// Safe to run concurrently with itself: the breach flag is set with a
/// conditional write and issue creation is deduplicated by the store.
#[derive(Clone)]
pub struct SlaScanner {
    store: SharedStore,
    ledger: ProofLedger,
}

impl SlaScanner {
    pub fn new(store: SharedStore, ledger: ProofLedger) -> Self {
        Self { store, ledger }
    }

    pub async fn scan(&self, now: DateTime<Utc>) -> EngineResult<SlaScanReport> {
        let mut report = SlaScanReport::default();

        let candidates = self.store.list_sla_candidates(now).await?;
        for booking in candidates {
            let usable = match self.ledger.count_usable(booking.id).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "Failed to count proofs");
                    report.errors.push(format!("booking {}: {}", booking.id, e));
                    continue;
                }
            };
            if usable > 0 {
                continue;
            }
            report.breaches_found += 1;

            match self.store.flag_sla_breach(booking.id, now).await {
                Ok(true) => {
                    report.breaches_processed += 1;
                    metrics::counter!("sla.breaches_flagged_total").increment(1);
                    if self.raise_issue(&booking, now, &mut report).await {
                        report.issues_created += 1;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "Failed to flag SLA breach");
                    report.errors.push(format!("booking {}: {}", booking.id, e));
                }
            }
        }

        // Bookings flagged by an earlier pass whose issue could not be written
        match self
            .store
            .list_breached_without_issue(IssueType::SlaBreach)
            .await
        {
            Ok(orphans) => {
                for booking in orphans {
                    if self.raise_issue(&booking, now, &mut report).await {
                        report.issues_created += 1;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to list breached bookings without issues");
                report.errors.push(e.to_string());
            }
        }

        info!(
            breaches_found = report.breaches_found,
            breaches_processed = report.breaches_processed,
            issues_created = report.issues_created,
            errors = report.errors.len(),
            "SLA scan finished"
        );
        Ok(report)
    }

    async fn raise_issue(
        &self,
        booking: &Booking,
        now: DateTime<Utc>,
        report: &mut SlaScanReport,
    ) -> bool {
        let severity = sla::breach_severity(booking.scheduled_end, now);
        let issue = NewOpsIssue {
            booking_id: booking.id,
            issue_type: IssueType::SlaBreach,
            severity,
            description: format!(
                "No proof uploaded by deadline {} ({} hours after scheduled end)",
                booking.proof_sla_deadline.to_rfc3339(),
                booking.proof_sla_hours
            ),
        };
        match self.store.open_issue(issue).await {
            Ok(Some(issue)) => {
                info!(
                    booking_id = %booking.id,
                    issue_id = %issue.id,
                    severity = ?issue.severity,
                    "SLA breach issue opened"
                );
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!(booking_id = %booking.id, error = %e, "Failed to open SLA breach issue");
                report.errors.push(format!("booking {}: {}", booking.id, e));
                false
            }
        }
    }
}
