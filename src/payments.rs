use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::PaymentStatus")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[db_enum(rename = "created")]
    Created,
    #[db_enum(rename = "authorized")]
    Authorized,
    #[db_enum(rename = "captured")]
    Captured,
    #[db_enum(rename = "failed")]
    Failed,
}

impl PaymentStatus {
    /// Statuses a payment may hold immediately before moving to `next`.
    ///
    /// Captured is final. A capture reported after a failure is still applied:
    /// the provider has collected the funds.
    pub fn predecessors(next: PaymentStatus) -> &'static [PaymentStatus] {
        match next {
            PaymentStatus::Created => &[],
            PaymentStatus::Authorized => &[PaymentStatus::Created],
            PaymentStatus::Captured => &[
                PaymentStatus::Created,
                PaymentStatus::Authorized,
                PaymentStatus::Failed,
            ],
            PaymentStatus::Failed => &[PaymentStatus::Created, PaymentStatus::Authorized],
        }
    }

    pub fn can_advance_to(self, next: PaymentStatus) -> bool {
        Self::predecessors(next).contains(&self)
    }
}

/// API model for payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider: String,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub provider_signature: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Diesel model for the payments table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentModel {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub provider: String,
    pub provider_order_id: String,
    pub provider_payment_id: Option<String>,
    pub provider_signature: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for a freshly created provider order
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPayment {
    pub booking_id: Uuid,
    pub provider: String,
    pub provider_order_id: String,
    pub amount: i64,
    pub currency: String,
}

impl From<PaymentModel> for Payment {
    fn from(model: PaymentModel) -> Self {
        Self {
            id: model.id,
            booking_id: model.booking_id,
            provider: model.provider,
            provider_order_id: model.provider_order_id,
            provider_payment_id: model.provider_payment_id,
            provider_signature: model.provider_signature,
            amount: model.amount,
            currency: model.currency,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
