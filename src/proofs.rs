use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::MediaKind")]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[db_enum(rename = "image")]
    Image,
    #[db_enum(rename = "video")]
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::ProofStatus")]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    #[db_enum(rename = "uploaded")]
    Uploaded,
    #[db_enum(rename = "approved")]
    Approved,
    #[db_enum(rename = "rejected")]
    Rejected,
}

impl ProofStatus {
    /// Statuses that count towards completion and the SLA
    pub const USABLE: [ProofStatus; 2] = [ProofStatus::Uploaded, ProofStatus::Approved];

    pub fn is_usable(self) -> bool {
        Self::USABLE.contains(&self)
    }
}

/// One uploaded proof artifact. The locator points into the blob store.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::proofs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Proof {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub media_kind: MediaKind,
    pub storage_locator: String,
    pub uploader_id: Uuid,
    pub status: ProofStatus,
    pub approver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::proofs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewProof {
    pub booking_id: Uuid,
    pub media_kind: MediaKind,
    pub storage_locator: String,
    pub uploader_id: Uuid,
}

/// Outcome of a moderation review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofDecision {
    Approve,
    Reject,
}

impl ProofDecision {
    pub fn resulting_status(self) -> ProofStatus {
        match self {
            ProofDecision::Approve => ProofStatus::Approved,
            ProofDecision::Reject => ProofStatus::Rejected,
        }
    }
}
