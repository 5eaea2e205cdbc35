//! HTTP surface of the conversion service.
//!
//! ```text
//! POST /convert ──▶ require_service_key ──▶ Json<ConvertRequest> ──▶ ConversionJob
//!                       │ 401                    │ 422                 │ 422 (unknown track)
//!                                                                     ▼
//!                                          TaskTracker::spawn(Orchestrator::run) ──▶ 200 {"ok": true}
//! GET  /health  ──▶ 200 {"ok": true}
//! ```
//!
//! The shared-secret check runs as middleware, before the body is read, so an
//! unauthenticated request never reaches JSON validation.
//!
//! Accepted jobs run on the state's [`TaskTracker`]. On shutdown the server
//! stops accepting connections and then drains the tracker, so every accepted
//! job still uploads and posts its callback.

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::job::{ConversionJob, ConvertRequest};
use crate::orchestrator::Orchestrator;
use crate::transport::ReqwestTransport;
use crate::SERVICE_KEY_HEADER;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    shared_secret: Arc<str>,
    jobs: TaskTracker,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, shared_secret: impl Into<Arc<str>>) -> Self {
        Self {
            orchestrator,
            shared_secret: shared_secret.into(),
            jobs: TaskTracker::new(),
        }
    }

    /// Number of accepted jobs still running.
    pub fn jobs_in_flight(&self) -> usize {
        self.jobs.len()
    }

    /// Close the job tracker and wait for every accepted job to finish.
    pub async fn drain(&self) {
        self.jobs.close();
        if !self.jobs.is_empty() {
            info!(in_flight = self.jobs.len(), "Waiting for accepted jobs to finish");
        }
        self.jobs.wait().await;
    }
}

/// Build the router: authenticated `/convert`, open `/health`.
pub fn build_router(state: AppState) -> Router {
    let convert = Router::new()
        .route("/convert", post(submit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_service_key,
        ));

    Router::new()
        .merge(convert)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject requests whose service-key header is missing or wrong.
async fn require_service_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if keys_match(key, &state.shared_secret) => Ok(next.run(request).await),
        _ => {
            warn!("Rejected submission with missing or invalid service key");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Compare two keys in time independent of where they differ.
///
/// Both sides are hashed first so the comparison length is fixed.
fn keys_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn submit(
    State(state): State<AppState>,
    body: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let job = ConversionJob::try_from(request)?;

    info!(
        source_uid = %job.source_uid,
        conversion_job_id = %job.conversion_job_id,
        "Accepted conversion job"
    );

    let orchestrator = state.orchestrator.clone();
    state.jobs.spawn(async move {
        orchestrator.run(&job).await;
    });

    Ok(Json(json!({ "ok": true })))
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Serve on `addr` until Ctrl-C, then wait for accepted jobs to finish.
pub async fn run_server(config: ServiceConfig, addr: SocketAddr) -> std::io::Result<()> {
    let orchestrator = Orchestrator::from_config(&config, Arc::new(ReqwestTransport::new()));
    let state = AppState::new(orchestrator, config.shared_secret.as_str());
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Conversion service listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.drain().await;
    info!("All accepted jobs finished");
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping server");
}
