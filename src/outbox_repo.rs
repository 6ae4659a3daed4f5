use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::outbox::{NewOutboxTask, OutboxTask, OutboxTaskStatus};
use crate::web::PgPool;

#[derive(Clone)]
pub struct OutboxRepository {
    pool: PgPool,
}

impl OutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a task; returns false if one of the same kind exists for the booking
    pub async fn enqueue(&self, new_task: NewOutboxTask) -> Result<bool> {
        use crate::schema::outbox_tasks::dsl;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let rows = diesel::insert_into(dsl::outbox_tasks)
                .values(&new_task)
                .on_conflict((dsl::kind, dsl::booking_id))
                .do_nothing()
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows == 1)
    }

    /// Lease due pending tasks. Rows locked by another worker are skipped and
    /// the lease pushes next_attempt_at forward so a crashed worker's tasks
    /// become due again later.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: i64,
    ) -> Result<Vec<OutboxTask>> {
        use crate::schema::outbox_tasks;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                let due: Vec<Uuid> = outbox_tasks::table
                    .filter(outbox_tasks::status.eq(OutboxTaskStatus::Pending))
                    .filter(outbox_tasks::next_attempt_at.le(now))
                    .order_by(outbox_tasks::next_attempt_at.asc())
                    .limit(limit)
                    .select(outbox_tasks::id)
                    .for_update()
                    .skip_locked()
                    .load(conn)?;

                if due.is_empty() {
                    return Ok(Vec::new());
                }

                let claimed: Vec<OutboxTask> = diesel::update(outbox_tasks::table)
                    .filter(outbox_tasks::id.eq_any(due))
                    .set((
                        outbox_tasks::next_attempt_at.eq(now + lease),
                        outbox_tasks::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(OutboxTask::as_returning())
                    .get_results(conn)?;

                Ok(claimed)
            })
        })
        .await??;

        Ok(result)
    }

    pub async fn mark_done(&self, task_id: Uuid) -> Result<()> {
        use crate::schema::outbox_tasks;

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::update(outbox_tasks::table)
                .filter(outbox_tasks::id.eq(task_id))
                .set((
                    outbox_tasks::status.eq(OutboxTaskStatus::Done),
                    outbox_tasks::attempts.eq(outbox_tasks::attempts + 1),
                    outbox_tasks::last_error.eq(None::<String>),
                    outbox_tasks::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    /// Record a failed attempt and either reschedule or give up
    pub async fn mark_failed(
        &self,
        task_id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        give_up: bool,
    ) -> Result<Option<OutboxTask>> {
        use crate::schema::outbox_tasks;

        let pool = self.pool.clone();
        let error = error.to_string();
        let status = if give_up {
            OutboxTaskStatus::Dead
        } else {
            OutboxTaskStatus::Pending
        };
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<OutboxTask> = diesel::update(outbox_tasks::table)
                .filter(outbox_tasks::id.eq(task_id))
                .filter(outbox_tasks::status.eq(OutboxTaskStatus::Pending))
                .set((
                    outbox_tasks::status.eq(status),
                    outbox_tasks::attempts.eq(outbox_tasks::attempts + 1),
                    outbox_tasks::last_error.eq(Some(error)),
                    outbox_tasks::next_attempt_at.eq(next_attempt_at),
                    outbox_tasks::updated_at.eq(diesel::dsl::now),
                ))
                .returning(OutboxTask::as_returning())
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<OutboxTask>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result)
    }

    pub async fn get_by_booking_id(&self, booking_id: Uuid) -> Result<Vec<OutboxTask>> {
        use crate::schema::outbox_tasks::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let tasks: Vec<OutboxTask> = dsl::outbox_tasks
                .filter(dsl::booking_id.eq(booking_id))
                .select(OutboxTask::as_select())
                .load(&mut conn)?;

            Ok::<Vec<OutboxTask>, anyhow::Error>(tasks)
        })
        .await??;

        Ok(result)
    }
}
