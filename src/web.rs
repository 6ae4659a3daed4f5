use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use tower_http::cors::CorsLayer;
use tracing::{Instrument, error, info, info_span, warn};

use crate::actions;
use crate::auth::JwtService;
use crate::engine::Engine;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub jwt: Arc<JwtService>,
}

/// Logs each request inside a span carrying a short request id and records
/// its duration.
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = Uuid::now_v7().simple().to_string()[24..].to_string();
    let span = info_span!("request", %method, %path, %request_id);

    let started = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();

    metrics::histogram!("http.request.duration_ms", "status" => status.to_string())
        .record(elapsed_ms);
    span.in_scope(|| {
        if response.status().is_client_error() {
            warn!(status, elapsed_ms, "Request rejected");
        } else {
            info!(status, elapsed_ms, "Request completed");
        }
    });

    response
}

/// Reports server errors to Sentry; client errors are expected traffic.
async fn sentry_error_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();
    if !status.is_server_error() {
        return response;
    }

    error!(%method, %path, status = status.as_u16(), "Server error");
    sentry::with_scope(
        |scope| {
            scope.set_tag("http.method", method.as_str());
            scope.set_tag("http.path", &path);
            scope.set_tag("http.status_code", status.as_u16());
        },
        || {
            sentry::capture_message(
                &format!("{} {} failed with {}", method, path, status.as_u16()),
                sentry::Level::Error,
            )
        },
    );

    response
}

/// Full HTTP application: JSON API under `/api` plus `/health`
pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        // Booking lifecycle
        .route("/bookings", post(actions::create_booking))
        .route("/bookings/{id}", get(actions::get_booking))
        .route(
            "/bookings/{id}/assignment",
            post(actions::assign_officiant),
        )
        .route("/bookings/{id}/start", post(actions::start_service))
        .route("/bookings/{id}/completion", post(actions::complete_booking))
        .route(
            "/bookings/{id}/cancellation",
            post(actions::cancel_booking),
        )
        .route("/bookings/{id}/refund", post(actions::refund_booking))
        // Payments
        .route(
            "/bookings/{id}/payment-order",
            post(actions::create_payment_order),
        )
        .route(
            "/bookings/{id}/payment-confirmation",
            post(actions::confirm_payment),
        )
        .route("/payments/webhook", post(actions::handle_payment_webhook))
        // Proofs
        .route(
            "/bookings/{id}/proofs",
            post(actions::record_proof).get(actions::list_proofs),
        )
        .route("/proofs/{id}/review", post(actions::review_proof))
        // Operations
        .route("/ops/sla-scan", post(actions::run_sla_scan))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(actions::health))
        .nest("/api", api_router)
        .with_state(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(sentry_error_middleware))
        .layer(CorsLayer::permissive())
}

pub async fn start_web_server(interface: String, port: u16, state: AppState) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "web-server");
    });
    info!("Starting web server on {}:{}", interface, port);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", interface, port)).await?;
    info!("Web server listening on http://{}:{}", interface, port);

    axum::serve(listener, app).await?;

    Ok(())
}
