use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable ritual offering from the catalog
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::services)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub published: bool,
    pub bookable: bool,
    /// Price in minor currency units when no package is chosen
    pub base_price: i64,
    pub currency: String,
    /// Overrides the policy default proof SLA when set
    pub proof_sla_hours: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn is_open_for_booking(&self) -> bool {
        self.published && self.bookable
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::service_packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServicePackage {
    pub id: Uuid,
    pub service_id: Uuid,
    pub name: String,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::services)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewService {
    pub name: String,
    pub published: bool,
    pub bookable: bool,
    pub base_price: i64,
    pub currency: String,
    pub proof_sla_hours: Option<i32>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::service_packages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewServicePackage {
    pub service_id: Uuid,
    pub name: String,
    pub price: i64,
}
