// src/api.rs
//
// HTTP surface: /metrics behind basic auth, /health and /ready open for the
// orchestrator's probes. Handlers only ever read the snapshot store.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;

use crate::config::AuthConfig;
use crate::metrics::Exporter;
use crate::snapshot::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub store: SnapshotStore,
    pub exporter: Arc<Exporter>,
}

pub fn create_router(state: AppState, auth: &AuthConfig) -> Router {
    let protected = Router::new()
        .route("/metrics", get(metrics))
        .layer(ValidateRequestHeaderLayer::basic(
            &auth.username,
            &auth.password,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Project the current snapshot (if any) and serve the text exposition
/// format. Before the first pipeline run only the static info series shows.
async fn metrics(State(state): State<AppState>) -> Response {
    let snapshot = state.store.current();
    match state.exporter.project_and_render(snapshot.as_deref()) {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response()
        }
    }
}

#[derive(serde::Serialize)]
struct HealthBody {
    status: &'static str,
    last_update: Option<DateTime<Utc>>,
    last_update_success: bool,
    last_error: Option<String>,
    version: &'static str,
}

/// Liveness: reflects that the process is serving and scheduling, not
/// whether the upstream is reachable — always 200 once we are up.
async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let snapshot = state.store.current();
    Json(HealthBody {
        status: "healthy",
        last_update: snapshot.as_ref().map(|s| s.scraped_at),
        last_update_success: snapshot.as_ref().map(|s| s.success).unwrap_or(false),
        last_error: snapshot.as_ref().and_then(|s| s.error.clone()),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(serde::Serialize)]
struct ReadyBody {
    ready: bool,
    last_update: Option<DateTime<Utc>>,
}

/// Readiness: do we hold servable data? Latched by the first successful
/// scrape and kept through later failures (the last good schedule still
/// serves).
async fn ready(State(state): State<AppState>) -> Response {
    let ready = state.store.ever_succeeded();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyBody {
        ready,
        last_update: state.store.current().map(|s| s.scraped_at),
    };
    (status, Json(body)).into_response()
}
