use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::BookingStatus")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[db_enum(rename = "payment_pending")]
    PaymentPending,
    #[db_enum(rename = "confirmed")]
    Confirmed,
    #[db_enum(rename = "in_progress")]
    InProgress,
    #[db_enum(rename = "completed")]
    Completed,
    #[db_enum(rename = "cancelled")]
    Cancelled,
    #[db_enum(rename = "refunded")]
    Refunded,
}

impl BookingStatus {
    /// States from which cancellation is still possible
    pub const PRE_TERMINAL: [BookingStatus; 3] = [
        BookingStatus::PaymentPending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
    ];

    /// States whose proof deadline is watched by the SLA scanner
    pub const SLA_WATCHED: [BookingStatus; 3] = [
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
    ];

    /// States in which a captured payment is owed to the officiant and venue
    pub const SETTLED: [BookingStatus; 3] = [
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Refunded
        )
    }

    /// Legal edges of the booking lifecycle
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (PaymentPending, Confirmed) => true,
            (Confirmed, InProgress) => true,
            (Confirmed | InProgress, Completed) => true,
            (PaymentPending | Confirmed | InProgress, Cancelled) => true,
            (Confirmed | Completed, Refunded) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::PaymentPending => "payment_pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking-level summary of proof artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::ProofProgress")]
#[serde(rename_all = "snake_case")]
pub enum ProofProgress {
    #[db_enum(rename = "none")]
    None,
    #[db_enum(rename = "uploaded")]
    Uploaded,
    #[db_enum(rename = "approved")]
    Approved,
}

/// API model for bookings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub package_id: Option<Uuid>,
    pub officiant_id: Option<Uuid>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub duration_minutes: i32,
    /// Total in minor currency units
    pub total_amount: i64,
    pub currency: String,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub proof_status: ProofProgress,
    pub proof_sla_hours: i32,
    pub proof_sla_deadline: DateTime<Utc>,
    pub is_sla_breached: bool,
    pub sla_breached_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_assigned_to(&self, officiant_id: Uuid) -> bool {
        self.officiant_id == Some(officiant_id)
    }
}

/// Diesel model for the bookings table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingModel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub package_id: Option<Uuid>,
    pub officiant_id: Option<Uuid>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_amount: i64,
    pub currency: String,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub proof_status: ProofProgress,
    pub proof_sla_hours: i32,
    pub proof_sla_deadline: DateTime<Utc>,
    pub is_sla_breached: bool,
    pub sla_breached_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for new bookings; status starts at payment_pending
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBooking {
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub package_id: Option<Uuid>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_amount: i64,
    pub currency: String,
    pub notes: Option<String>,
    pub proof_sla_hours: i32,
    pub proof_sla_deadline: DateTime<Utc>,
}

impl From<BookingModel> for Booking {
    fn from(model: BookingModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            service_id: model.service_id,
            package_id: model.package_id,
            officiant_id: model.officiant_id,
            scheduled_start: model.scheduled_start,
            scheduled_end: model.scheduled_end,
            duration_minutes: model.duration_minutes,
            total_amount: model.total_amount,
            currency: model.currency,
            notes: model.notes,
            status: model.status,
            proof_status: model.proof_status,
            proof_sla_hours: model.proof_sla_hours,
            proof_sla_deadline: model.proof_sla_deadline,
            is_sla_breached: model.is_sla_breached,
            sla_breached_at: model.sla_breached_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
