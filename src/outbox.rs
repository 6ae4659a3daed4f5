use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::OutboxTaskKind")]
#[serde(rename_all = "snake_case")]
pub enum OutboxTaskKind {
    #[db_enum(rename = "certificate_generation")]
    CertificateGeneration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::OutboxTaskStatus")]
#[serde(rename_all = "snake_case")]
pub enum OutboxTaskStatus {
    #[db_enum(rename = "pending")]
    Pending,
    #[db_enum(rename = "done")]
    Done,
    /// Gave up after too many attempts
    #[db_enum(rename = "dead")]
    Dead,
}

/// Side task recorded alongside the request that triggered it and
/// executed later by the outbox worker
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::outbox_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxTask {
    pub id: Uuid,
    pub kind: OutboxTaskKind,
    pub booking_id: Uuid,
    pub status: OutboxTaskStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::outbox_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewOutboxTask {
    pub kind: OutboxTaskKind,
    pub booking_id: Uuid,
    pub next_attempt_at: DateTime<Utc>,
}
