use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::payouts::PayoutEntry;
use crate::web::PgPool;

/// Read side of the payout ledger. Entries are only written inside the
/// capture transaction in `PaymentsRepository::apply_capture`.
#[derive(Clone)]
pub struct PayoutsRepository {
    pool: PgPool,
}

impl PayoutsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_booking_id(&self, booking_id: Uuid) -> Result<Option<PayoutEntry>> {
        use crate::schema::payout_ledger::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let entry: Option<PayoutEntry> = dsl::payout_ledger
                .filter(dsl::booking_id.eq(booking_id))
                .select(PayoutEntry::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<PayoutEntry>, anyhow::Error>(entry)
        })
        .await??;

        Ok(result)
    }
}
