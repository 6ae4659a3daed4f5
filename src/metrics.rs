use anyhow::{Context, Result};
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::info;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        // Millisecond histograms (webhook processing, HTTP requests): 1ms .. 10s
        .set_buckets_for_metric(
            Matcher::Suffix("_ms".to_string()),
            &[
                1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
            ],
        )
        .context("failed to set buckets for millisecond histograms")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Updates uptime and memory usage every 5 seconds
pub async fn process_metrics_task() {
    let start_time = Instant::now();

    loop {
        metrics::gauge!("process.uptime.seconds").set(start_time.elapsed().as_secs() as f64);
        metrics::gauge!("process.is_up").set(1.0);

        #[cfg(target_os = "linux")]
        {
            if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
                for line in status.lines() {
                    if line.starts_with("VmRSS:") {
                        if let Some(kb_str) = line.split_whitespace().nth(1)
                            && let Ok(kb) = kb_str.parse::<f64>()
                        {
                            metrics::gauge!("process.memory.bytes").set(kb * 1024.0);
                        }
                        break;
                    }
                }
            }
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

/// Register engine counters at zero so dashboards show them before the first event
pub fn initialize_engine_metrics() {
    for name in [
        "bookings.created_total",
        "bookings.confirmed_total",
        "bookings.completed_total",
        "bookings.cancelled_total",
        "bookings.refunded_total",
        "payments.orders_created_total",
        "payments.captured_total",
        "payments.captured_inactive_total",
        "payments.captured_unmatched_total",
        "payments.failed_total",
        "payments.confirmation.signature_invalid_total",
        "payments.webhook.received_total",
        "payments.webhook.duplicate_total",
        "payments.webhook.signature_invalid_total",
        "payments.webhook.malformed_total",
        "proofs.uploaded_total",
        "sla.breaches_flagged_total",
        "outbox.enqueue_errors_total",
        "outbox.tasks_completed_total",
        "outbox.tasks_failed_total",
    ] {
        metrics::counter!(name).absolute(0);
    }
}

async fn render_metrics() -> impl IntoResponse {
    match METRICS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// Serve `/metrics` on its own port
pub async fn start_metrics_server(port: u16) -> Result<()> {
    let handle = init_metrics()?;
    if METRICS_HANDLE.set(handle).is_err() {
        anyhow::bail!("metrics handle already initialized");
    }
    initialize_engine_metrics();

    tokio::spawn(process_metrics_task());

    let app = Router::new().route("/metrics", get(render_metrics));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("Metrics server failed")
}
