use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::ops_issues::{IssueStatus, IssueType, NewOpsIssue, OpsIssue};
use crate::web::PgPool;

#[derive(Clone)]
pub struct OpsIssuesRepository {
    pool: PgPool,
}

impl OpsIssuesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open an issue unless one of the same type is already open for the
    /// booking. Relies on the partial unique index `ops_issues_one_open_per_type`.
    pub async fn create_if_absent(&self, new_issue: NewOpsIssue) -> Result<Option<OpsIssue>> {
        use crate::schema::ops_issues::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Option<OpsIssue> = diesel::insert_into(dsl::ops_issues)
                .values(&new_issue)
                .on_conflict_do_nothing()
                .returning(OpsIssue::as_returning())
                .get_result(&mut conn)
                .optional()?;

            Ok::<Option<OpsIssue>, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    pub async fn find_open(&self, booking_id: Uuid, issue_type: IssueType) -> Result<Option<OpsIssue>> {
        use crate::schema::ops_issues::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let issue: Option<OpsIssue> = dsl::ops_issues
                .filter(dsl::booking_id.eq(booking_id))
                .filter(dsl::issue_type.eq(issue_type))
                .filter(dsl::status.eq(IssueStatus::Open))
                .select(OpsIssue::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<OpsIssue>, anyhow::Error>(issue)
        })
        .await??;

        Ok(result)
    }

    pub async fn get_by_booking_id(&self, booking_id: Uuid) -> Result<Vec<OpsIssue>> {
        use crate::schema::ops_issues::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let issues: Vec<OpsIssue> = dsl::ops_issues
                .filter(dsl::booking_id.eq(booking_id))
                .order_by(dsl::created_at.asc())
                .select(OpsIssue::as_select())
                .load(&mut conn)?;

            Ok::<Vec<OpsIssue>, anyhow::Error>(issues)
        })
        .await??;

        Ok(result)
    }
}
