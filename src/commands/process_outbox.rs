use anyhow::Result;

use seva::engine::Engine;

/// One pass over due outbox tasks; prints the summary as JSON
pub async fn handle_process_outbox(engine: Engine) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "process-outbox");
    });

    let report = engine.outbox.run_once(engine.clock().now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
