use anyhow::Result;
use tracing::info;

use seva::engine::Engine;

/// One SLA sweep; prints the summary as JSON
pub async fn handle_scan_sla(engine: Engine) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "scan-sla");
    });

    let now = engine.clock().now();
    info!(%now, "Scanning for SLA breaches");
    let report = engine.sla.scan(now).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
