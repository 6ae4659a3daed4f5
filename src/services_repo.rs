use anyhow::Result;
use diesel::prelude::*;
use uuid::Uuid;

use crate::services::{NewService, NewServicePackage, Service, ServicePackage};
use crate::web::PgPool;

#[derive(Clone)]
pub struct ServicesRepository {
    pool: PgPool,
}

impl ServicesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_service: NewService) -> Result<Service> {
        use crate::schema::services::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: Service = diesel::insert_into(dsl::services)
                .values(&new_service)
                .returning(Service::as_returning())
                .get_result(&mut conn)?;

            Ok::<Service, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    pub async fn create_package(&self, new_package: NewServicePackage) -> Result<ServicePackage> {
        use crate::schema::service_packages::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let inserted: ServicePackage = diesel::insert_into(dsl::service_packages)
                .values(&new_package)
                .returning(ServicePackage::as_returning())
                .get_result(&mut conn)?;

            Ok::<ServicePackage, anyhow::Error>(inserted)
        })
        .await??;

        Ok(result)
    }

    pub async fn get_by_id(&self, service_id: Uuid) -> Result<Option<Service>> {
        use crate::schema::services::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let service: Option<Service> = dsl::services
                .filter(dsl::id.eq(service_id))
                .select(Service::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<Service>, anyhow::Error>(service)
        })
        .await??;

        Ok(result)
    }

    pub async fn get_package(&self, package_id: Uuid) -> Result<Option<ServicePackage>> {
        use crate::schema::service_packages::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let package: Option<ServicePackage> = dsl::service_packages
                .filter(dsl::id.eq(package_id))
                .select(ServicePackage::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<ServicePackage>, anyhow::Error>(package)
        })
        .await??;

        Ok(result)
    }
}
