use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::IssueType")]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    #[db_enum(rename = "sla_breach")]
    SlaBreach,
    /// Funds captured for a booking that had already left payment_pending
    #[db_enum(rename = "capture_on_inactive_booking")]
    CaptureOnInactiveBooking,
    /// Provider captured funds on an order no payment row carries
    #[db_enum(rename = "unmatched_capture")]
    UnmatchedCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::IssueSeverity")]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    #[db_enum(rename = "low")]
    Low,
    #[db_enum(rename = "medium")]
    Medium,
    #[db_enum(rename = "high")]
    High,
    #[db_enum(rename = "critical")]
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::IssueStatus")]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[db_enum(rename = "open")]
    Open,
    #[db_enum(rename = "resolved")]
    Resolved,
}

/// Operational alert raised for staff follow-up
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::ops_issues)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OpsIssue {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub issue_type: IssueType,
    pub severity: IssueSeverity,
    pub status: IssueStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// New issues are always inserted open; at most one open issue per
/// (booking, type) exists.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::ops_issues)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewOpsIssue {
    pub booking_id: Uuid,
    pub issue_type: IssueType,
    pub severity: IssueSeverity,
    pub description: String,
}
