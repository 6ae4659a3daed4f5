use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use seva::auth::JwtService;
use seva::engine::Engine;
use seva::web::{AppState, start_web_server};

/// Intervals of the background loops started next to the HTTP server
#[derive(Debug, Clone, Copy)]
pub struct BackgroundSchedule {
    pub sla_scan: Duration,
    pub outbox: Duration,
}

impl Default for BackgroundSchedule {
    fn default() -> Self {
        Self {
            sla_scan: Duration::from_secs(300),
            outbox: Duration::from_secs(30),
        }
    }
}

fn spawn_sla_scan_loop(engine: Engine, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = engine.sla.scan(engine.clock().now()).await {
                error!(error = %e, "Scheduled SLA scan failed");
            }
        }
    });
}

fn spawn_outbox_loop(engine: Engine, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = engine.outbox.run_once(engine.clock().now()).await {
                error!(error = %e, "Scheduled outbox pass failed");
            }
        }
    });
}

pub async fn handle_web(
    interface: String,
    port: u16,
    engine: Engine,
    jwt_secret: &str,
    schedule: BackgroundSchedule,
) -> Result<()> {
    info!(
        sla_scan_secs = schedule.sla_scan.as_secs(),
        outbox_secs = schedule.outbox.as_secs(),
        "Starting background SLA scan and outbox loops"
    );
    spawn_sla_scan_loop(engine.clone(), schedule.sla_scan);
    spawn_outbox_loop(engine.clone(), schedule.outbox);

    let state = AppState {
        engine,
        jwt: Arc::new(JwtService::new(jwt_secret)),
    };
    start_web_server(interface, port, state).await
}
