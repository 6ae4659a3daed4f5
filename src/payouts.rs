use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::settlement::SettlementSplit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::PayoutStatus")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    #[db_enum(rename = "pending")]
    Pending,
    #[db_enum(rename = "paid")]
    Paid,
}

/// Settlement record written once per captured payment
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::payout_ledger)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PayoutEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub total_amount: i64,
    pub officiant_share: i64,
    pub venue_share: i64,
    pub platform_fee: i64,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::payout_ledger)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPayoutEntry {
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub total_amount: i64,
    pub officiant_share: i64,
    pub venue_share: i64,
    pub platform_fee: i64,
}

impl NewPayoutEntry {
    pub fn from_split(booking_id: Uuid, payment_id: Uuid, split: SettlementSplit) -> Self {
        Self {
            booking_id,
            payment_id,
            total_amount: split.total_amount,
            officiant_share: split.officiant_share,
            venue_share: split.venue_share,
            platform_fee: split.platform_fee,
        }
    }
}
