use anyhow::{Context, Result};
use diesel::prelude::*;
use uuid::Uuid;

use crate::bookings::{BookingModel, BookingStatus};
use crate::payments::{NewPayment, Payment, PaymentModel, PaymentStatus};
use crate::payouts::PayoutEntry;
use crate::store::{CaptureOutcome, CaptureWrite};
use crate::web::PgPool;

#[derive(Clone)]
pub struct PaymentsRepository {
    pool: PgPool,
}

impl PaymentsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the payment attached to a booking
    pub async fn get_by_booking_id(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let payment: Option<PaymentModel> = dsl::payments
                .filter(dsl::booking_id.eq(booking_id))
                .select(PaymentModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<PaymentModel>, anyhow::Error>(payment)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Get a payment by provider order ID
    pub async fn get_by_order_id(&self, provider_order_id: &str) -> Result<Option<Payment>> {
        use crate::schema::payments::dsl;

        let pool = self.pool.clone();
        let provider_order_id = provider_order_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let payment: Option<PaymentModel> = dsl::payments
                .filter(dsl::provider_order_id.eq(&provider_order_id))
                .select(PaymentModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<PaymentModel>, anyhow::Error>(payment)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Insert the booking's payment row. If the booking already has one
    /// (an earlier order, or a concurrent request that won the race) that
    /// row is returned as it stands.
    pub async fn insert_order(&self, new_payment: NewPayment) -> Result<Payment> {
        use crate::schema::payments;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || -> Result<PaymentModel> {
            let mut conn = pool.get()?;

            let inserted: Option<PaymentModel> = diesel::insert_into(payments::table)
                .values(&new_payment)
                .on_conflict(payments::booking_id)
                .do_nothing()
                .returning(PaymentModel::as_returning())
                .get_result(&mut conn)
                .optional()?;
            if let Some(inserted) = inserted {
                return Ok(inserted);
            }

            let existing: PaymentModel = payments::table
                .filter(payments::booking_id.eq(new_payment.booking_id))
                .select(PaymentModel::as_select())
                .first(&mut conn)?;
            Ok(existing)
        })
        .await??;

        Ok(result.into())
    }

    /// Move a payment forward to `to`; None if its current status does not allow it
    pub async fn advance_status(
        &self,
        payment_id: Uuid,
        to: PaymentStatus,
        provider_payment_id: Option<String>,
    ) -> Result<Option<Payment>> {
        use crate::schema::payments;

        let pool = self.pool.clone();
        let from = PaymentStatus::predecessors(to).to_vec();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let target = payments::table
                .filter(payments::id.eq(payment_id))
                .filter(payments::status.eq_any(from));

            let updated: Option<PaymentModel> = match provider_payment_id {
                Some(provider_payment_id) => diesel::update(target)
                    .set((
                        payments::status.eq(to),
                        payments::provider_payment_id.eq(Some(provider_payment_id)),
                        payments::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(PaymentModel::as_returning())
                    .get_result(&mut conn)
                    .optional()?,
                None => diesel::update(target)
                    .set((
                        payments::status.eq(to),
                        payments::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(PaymentModel::as_returning())
                    .get_result(&mut conn)
                    .optional()?,
            };

            Ok::<Option<PaymentModel>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Record a capture: payment status, booking confirmation and payout entry
    /// in one transaction. Safe to repeat; later calls change nothing.
    pub async fn apply_capture(&self, capture: CaptureWrite) -> Result<CaptureOutcome> {
        use crate::schema::{bookings, payments, payout_ledger};

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                let current: PaymentModel = payments::table
                    .filter(payments::id.eq(capture.payment_id))
                    .select(PaymentModel::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?
                    .with_context(|| format!("payment {} not found", capture.payment_id))?;

                let (payment, payment_updated) =
                    if current.status.can_advance_to(PaymentStatus::Captured) {
                        let signature = capture
                            .provider_signature
                            .clone()
                            .or(current.provider_signature.clone());
                        let updated: PaymentModel = diesel::update(payments::table)
                            .filter(payments::id.eq(current.id))
                            .set((
                                payments::status.eq(PaymentStatus::Captured),
                                payments::provider_payment_id
                                    .eq(Some(capture.provider_payment_id.clone())),
                                payments::provider_signature.eq(signature),
                                payments::updated_at.eq(diesel::dsl::now),
                            ))
                            .returning(PaymentModel::as_returning())
                            .get_result(conn)?;
                        (updated, true)
                    } else {
                        (current, false)
                    };

                let confirmed: Option<BookingModel> = diesel::update(bookings::table)
                    .filter(bookings::id.eq(capture.booking_id))
                    .filter(bookings::status.eq(BookingStatus::PaymentPending))
                    .set((
                        bookings::status.eq(BookingStatus::Confirmed),
                        bookings::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(BookingModel::as_returning())
                    .get_result(conn)
                    .optional()?;

                let booking_status = match &confirmed {
                    Some(booking) => booking.status,
                    None => bookings::table
                        .filter(bookings::id.eq(capture.booking_id))
                        .select(bookings::status)
                        .first::<BookingStatus>(conn)?,
                };

                let payout = if BookingStatus::SETTLED.contains(&booking_status) {
                    diesel::insert_into(payout_ledger::table)
                        .values(&capture.payout)
                        .on_conflict(payout_ledger::booking_id)
                        .do_nothing()
                        .returning(PayoutEntry::as_returning())
                        .get_result(conn)
                        .optional()?
                } else {
                    None
                };

                Ok(CaptureOutcome {
                    payment: payment.into(),
                    payment_updated,
                    booking_confirmed: confirmed.is_some(),
                    booking_status,
                    payout,
                })
            })
        })
        .await??;

        Ok(result)
    }
}
