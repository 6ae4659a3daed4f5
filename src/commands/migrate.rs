use anyhow::{Result, anyhow};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use seva::web::PgPool;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

/// Apply pending migrations on a pooled connection
pub async fn run_migrations(pool: PgPool) -> Result<()> {
    let applied = tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run migrations: {}", e))?
            .iter()
            .map(|version| version.to_string())
            .collect::<Vec<_>>();
        Ok::<Vec<String>, anyhow::Error>(applied)
    })
    .await??;

    if applied.is_empty() {
        info!("Database schema is up to date");
    } else {
        info!(count = applied.len(), migrations = ?applied, "Applied migrations");
    }
    Ok(())
}

pub async fn handle_migrate(pool: PgPool) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "migrate");
    });
    run_migrations(pool).await
}
