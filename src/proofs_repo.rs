use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::proofs::{NewProof, Proof, ProofStatus};
use crate::web::PgPool;

#[derive(Clone)]
pub struct ProofsRepository {
    pool: PgPool,
}

impl ProofsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_proof: NewProof) -> Result<Proof> {
        use crate::schema::proofs::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Proof = diesel::insert_into(dsl::proofs)
                .values(&new_proof)
                .returning(Proof::as_returning())
                .get_result(&mut conn)?;

            Ok::<Proof, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    pub async fn get_by_id(&self, proof_id: Uuid) -> Result<Option<Proof>> {
        use crate::schema::proofs::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let proof: Option<Proof> = dsl::proofs
                .filter(dsl::id.eq(proof_id))
                .select(Proof::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<Proof>, anyhow::Error>(proof)
        })
        .await??;

        Ok(result)
    }

    /// All proofs for a booking, oldest first
    pub async fn get_by_booking_id(&self, booking_id: Uuid) -> Result<Vec<Proof>> {
        use crate::schema::proofs::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let proofs: Vec<Proof> = dsl::proofs
                .filter(dsl::booking_id.eq(booking_id))
                .order_by(dsl::created_at.asc())
                .select(Proof::as_select())
                .load(&mut conn)?;

            Ok::<Vec<Proof>, anyhow::Error>(proofs)
        })
        .await??;

        Ok(result)
    }

    /// Count proofs in uploaded or approved state
    pub async fn count_usable(&self, booking_id: Uuid) -> Result<i64> {
        use crate::schema::proofs::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let count: i64 = dsl::proofs
                .filter(dsl::booking_id.eq(booking_id))
                .filter(dsl::status.eq_any(ProofStatus::USABLE.to_vec()))
                .count()
                .get_result(&mut conn)?;

            Ok::<i64, anyhow::Error>(count)
        })
        .await??;

        Ok(result)
    }

    pub async fn approve_uploaded(&self, booking_id: Uuid, approver_id: Uuid) -> Result<usize> {
        use crate::schema::proofs;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let rows = diesel::update(proofs::table)
                .filter(proofs::booking_id.eq(booking_id))
                .filter(proofs::status.eq(ProofStatus::Uploaded))
                .set((
                    proofs::status.eq(ProofStatus::Approved),
                    proofs::approver_id.eq(Some(approver_id)),
                    proofs::updated_at.eq(diesel::dsl::now),
                ))
                .execute(&mut conn)?;

            Ok::<usize, anyhow::Error>(rows)
        })
        .await??;

        Ok(result)
    }

    /// Moderate a single proof while it is still in `from`
    pub async fn review(
        &self,
        proof_id: Uuid,
        from: ProofStatus,
        to: ProofStatus,
        reviewer_id: Uuid,
    ) -> Result<Option<Proof>> {
        use crate::schema::proofs;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let updated: Option<Proof> = diesel::update(proofs::table)
                .filter(proofs::id.eq(proof_id))
                .filter(proofs::status.eq(from))
                .set((
                    proofs::status.eq(to),
                    proofs::approver_id.eq(Some(reviewer_id)),
                    proofs::updated_at.eq(diesel::dsl::now),
                ))
                .returning(Proof::as_returning())
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<Proof>, anyhow::Error>(updated)
        })
        .await??;

        Ok(result)
    }
}
