use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::certificates::CertificateGenerator;
use crate::errors::EngineResult;
use crate::outbox::{OutboxTask, OutboxTaskKind};
use crate::store::SharedStore;

const BASE_BACKOFF_SECS: i64 = 30;
const MAX_BACKOFF_SECS: i64 = 3600;

/// Delay before retry number `attempts` (1-based), doubling up to an hour
pub fn backoff(attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 20) as u32;
    let secs = BASE_BACKOFF_SECS.saturating_mul(1_i64 << exponent);
    Duration::seconds(secs.min(MAX_BACKOFF_SECS))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutboxRunReport {
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub dead: usize,
}

/// Executes side tasks queued by request handlers
#[derive(Clone)]
pub struct OutboxWorker {
    store: SharedStore,
    certificates: Arc<dyn CertificateGenerator>,
    max_attempts: i32,
    batch_size: i64,
    lease: Duration,
}

impl OutboxWorker {
    pub fn new(
        store: SharedStore,
        certificates: Arc<dyn CertificateGenerator>,
        max_attempts: i32,
    ) -> Self {
        Self {
            store,
            certificates,
            max_attempts,
            batch_size: 50,
            lease: Duration::minutes(5),
        }
    }

    async fn execute(&self, task: &OutboxTask) -> anyhow::Result<()> {
        match task.kind {
            OutboxTaskKind::CertificateGeneration => {
                self.certificates.generate(task.booking_id).await
            }
        }
    }

    /// Run every task due at `now` once
    pub async fn run_once(&self, now: DateTime<Utc>) -> EngineResult<OutboxRunReport> {
        let tasks = self
            .store
            .claim_due_tasks(now, self.lease, self.batch_size)
            .await?;
        let mut report = OutboxRunReport {
            claimed: tasks.len(),
            ..Default::default()
        };

        for task in tasks {
            match self.execute(&task).await {
                Ok(()) => {
                    self.store.complete_task(task.id).await?;
                    report.completed += 1;
                    metrics::counter!("outbox.tasks_completed_total").increment(1);
                }
                Err(e) => {
                    let attempts = task.attempts + 1;
                    let give_up = attempts >= self.max_attempts;
                    let next_attempt_at = now + backoff(attempts);
                    self.store
                        .fail_task(task.id, &e.to_string(), next_attempt_at, give_up)
                        .await?;
                    metrics::counter!("outbox.tasks_failed_total").increment(1);

                    if give_up {
                        report.dead += 1;
                        error!(
                            task_id = %task.id,
                            booking_id = %task.booking_id,
                            kind = ?task.kind,
                            attempts,
                            error = %e,
                            "Outbox task gave up"
                        );
                    } else {
                        report.retried += 1;
                        warn!(
                            task_id = %task.id,
                            booking_id = %task.booking_id,
                            attempts,
                            %next_attempt_at,
                            error = %e,
                            "Outbox task failed, will retry"
                        );
                    }
                }
            }
        }

        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                completed = report.completed,
                retried = report.retried,
                dead = report.dead,
                "Outbox pass finished"
            );
        }
        Ok(report)
    }
}
