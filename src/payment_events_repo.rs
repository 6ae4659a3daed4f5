use anyhow::Result;
use diesel::prelude::*;

use crate::payment_events::NewPaymentEvent;
use crate::web::PgPool;

/// Journal of provider webhook deliveries, keyed by provider event id
#[derive(Clone)]
pub struct PaymentEventsRepository {
    pool: PgPool,
}

impl PaymentEventsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check if an event has already been processed (idempotency)
    pub async fn is_processed(&self, event_id: &str) -> Result<bool> {
        use crate::schema::payment_events::dsl;

        let pool = self.pool.clone();
        let event_id = event_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let exists: bool = diesel::select(diesel::dsl::exists(
                dsl::payment_events
                    .filter(dsl::event_id.eq(&event_id))
                    .filter(dsl::processed.eq(true)),
            ))
            .get_result(&mut conn)?;

            Ok::<bool, anyhow::Error>(exists)
        })
        .await??;

        Ok(result)
    }

    /// Record a delivery; returns false if the event id is already journaled
    pub async fn create(&self, new_event: NewPaymentEvent) -> Result<bool> {
        use crate::schema::payment_events::dsl;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let rows = diesel::insert_into(dsl::payment_events)
                .values(&new_event)
                .on_conflict(dsl::event_id)
                .do_nothing()
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows == 1)
    }

    pub async fn mark_processed(&self, event_id: &str) -> Result<()> {
        use crate::schema::payment_events;

        let pool = self.pool.clone();
        let event_id = event_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::update(payment_events::table)
                .filter(payment_events::event_id.eq(&event_id))
                .set((
                    payment_events::processed.eq(true),
                    payment_events::processing_error.eq(None::<String>),
                ))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }

    /// Keep the event unprocessed so the provider's redelivery runs it again
    pub async fn mark_failed(&self, event_id: &str, error: &str) -> Result<()> {
        use crate::schema::payment_events;

        let pool = self.pool.clone();
        let event_id = event_id.to_string();
        let error = error.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            diesel::update(payment_events::table)
                .filter(payment_events::event_id.eq(&event_id))
                .set((
                    payment_events::processed.eq(false),
                    payment_events::processing_error.eq(Some(&error)),
                ))
                .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
