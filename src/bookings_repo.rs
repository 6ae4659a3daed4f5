use anyhow::Result;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::bookings::{Booking, BookingModel, BookingStatus, NewBooking, ProofProgress};
use crate::ops_issues::IssueType;
use crate::proofs::ProofStatus;
use crate::store::CompletionWrite;
use crate::web::PgPool;

#[derive(Clone)]
pub struct BookingsRepository {
    pool: PgPool,
}

impl BookingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new booking in payment_pending
    pub async fn create(&self, new_booking: NewBooking) -> Result<Booking> {
        use crate::schema::bookings::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: BookingModel = diesel::insert_into(dsl::bookings)
                .values(&new_booking)
                .returning(BookingModel::as_returning())
                .get_result(&mut conn)?;

            Ok::<BookingModel, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result.into())
    }

    /// Get a booking by ID
    pub async fn get_by_id(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        use crate::schema::bookings::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let booking: Option<BookingModel> = dsl::bookings
                .filter(dsl::id.eq(booking_id))
                .select(BookingModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<BookingModel>, anyhow::Error>(booking)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Move a booking to `to` only while its status is one of `from`
    pub async fn transition(
        &self,
        booking_id: Uuid,
        from: Vec<BookingStatus>,
        to: BookingStatus,
    ) -> Result<Option<Booking>> {
        use crate::schema::bookings;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<BookingModel> = diesel::update(bookings::table)
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::status.eq_any(from))
                .set((
                    bookings::status.eq(to),
                    bookings::updated_at.eq(diesel::dsl::now),
                ))
                .returning(BookingModel::as_returning())
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<BookingModel>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    pub async fn assign_officiant(
        &self,
        booking_id: Uuid,
        officiant_id: Uuid,
        allowed: Vec<BookingStatus>,
    ) -> Result<Option<Booking>> {
        use crate::schema::bookings;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<BookingModel> = diesel::update(bookings::table)
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::status.eq_any(allowed))
                .set((
                    bookings::officiant_id.eq(Some(officiant_id)),
                    bookings::updated_at.eq(diesel::dsl::now),
                ))
                .returning(BookingModel::as_returning())
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<BookingModel>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    pub async fn mark_proof_uploaded(&self, booking_id: Uuid) -> Result<bool> {
        use crate::schema::bookings;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let rows = diesel::update(bookings::table)
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::proof_status.eq(ProofProgress::None))
                .set((
                    bookings::proof_status.eq(ProofProgress::Uploaded),
                    bookings::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows == 1)
    }

    /// Complete the booking and approve its uploaded proofs in one transaction.
    ///
    /// The usable proof count is re-read under the booking row lock so a
    /// concurrent rejection cannot slip between check and write.
    pub async fn complete(&self, booking_id: Uuid, approver_id: Uuid) -> Result<CompletionWrite> {
        use crate::schema::{bookings, proofs};

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                let current: Option<BookingModel> = bookings::table
                    .filter(bookings::id.eq(booking_id))
                    .select(BookingModel::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?;

                let Some(current) = current else {
                    return Ok(CompletionWrite::BookingMissing);
                };

                if !current.status.can_transition_to(BookingStatus::Completed) {
                    return Ok(CompletionWrite::StatusMismatch(current.status));
                }

                let usable: i64 = proofs::table
                    .filter(proofs::booking_id.eq(booking_id))
                    .filter(proofs::status.eq_any(ProofStatus::USABLE.to_vec()))
                    .count()
                    .get_result(conn)?;

                if usable == 0 {
                    return Ok(CompletionWrite::NoUsableProof);
                }

                let approved_proofs = diesel::update(proofs::table)
                    .filter(proofs::booking_id.eq(booking_id))
                    .filter(proofs::status.eq(ProofStatus::Uploaded))
                    .set((
                        proofs::status.eq(ProofStatus::Approved),
                        proofs::approver_id.eq(Some(approver_id)),
                        proofs::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;

                let booking: BookingModel = diesel::update(bookings::table)
                    .filter(bookings::id.eq(booking_id))
                    .set((
                        bookings::status.eq(BookingStatus::Completed),
                        bookings::proof_status.eq(ProofProgress::Approved),
                        bookings::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(BookingModel::as_returning())
                    .get_result(conn)?;

                Ok(CompletionWrite::Completed {
                    booking: booking.into(),
                    approved_proofs,
                })
            })
        })
        .await??;

        Ok(result)
    }

    /// Bookings past their proof deadline that have not been flagged yet
    pub async fn list_sla_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Booking>> {
        use crate::schema::bookings::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let bookings: Vec<BookingModel> = dsl::bookings
                .filter(dsl::proof_sla_deadline.lt(now))
                .filter(dsl::is_sla_breached.eq(false))
                .filter(dsl::status.eq_any(BookingStatus::SLA_WATCHED.to_vec()))
                .order_by(dsl::proof_sla_deadline.asc())
                .select(BookingModel::as_select())
                .load(&mut conn)?;

            Ok::<Vec<BookingModel>, anyhow::Error>(bookings)
        })
        .await??;

        Ok(result.into_iter().map(|model| model.into()).collect())
    }

    /// Flip is_sla_breached; only one concurrent caller observes `true`
    pub async fn flag_sla_breach(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        use crate::schema::bookings;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let rows = diesel::update(bookings::table)
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::is_sla_breached.eq(false))
                .set((
                    bookings::is_sla_breached.eq(true),
                    bookings::sla_breached_at.eq(Some(now)),
                    bookings::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(rows)
        })
        .await??;

        Ok(rows == 1)
    }

    pub async fn list_breached_without_issue(&self, issue_type: IssueType) -> Result<Vec<Booking>> {
        use crate::schema::{bookings, ops_issues};

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let bookings: Vec<BookingModel> = bookings::table
                .filter(bookings::is_sla_breached.eq(true))
                .filter(diesel::dsl::not(diesel::dsl::exists(
                    ops_issues::table
                        .filter(ops_issues::booking_id.eq(bookings::id))
                        .filter(ops_issues::issue_type.eq(issue_type)),
                )))
                .select(BookingModel::as_select())
                .load(&mut conn)?;

            Ok::<Vec<BookingModel>, anyhow::Error>(bookings)
        })
        .await??;

        Ok(result.into_iter().map(|model| model.into()).collect())
    }
}
