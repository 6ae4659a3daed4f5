use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Diesel model for the payment_events table (webhook journal)
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::payment_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentEventModel {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub processed: bool,
    pub processing_error: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Insert model for a newly delivered webhook event
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payment_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPaymentEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
}
