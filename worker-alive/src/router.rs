use std::future::ready;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::liveness::LivenessChecker;
use crate::metrics::{setup_metrics_recorder, track_metrics};

#[derive(Clone)]
pub struct AppState {
    pub liveness: LivenessChecker,
}

/// Probe handler: 200 while the liveness key is fresh, 404 once it is absent
/// or expired, 503 when the store itself cannot be queried.
async fn probe(State(state): State<AppState>) -> impl IntoResponse {
    match state.liveness.is_alive().await {
        Ok(true) => (StatusCode::OK, "Alive!".to_string()),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            "Can't find the alive key".to_string(),
        ),
        Err(err) => {
            tracing::warn!("liveness probe could not query the store: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Liveness check failed: {}", err),
            )
        }
    }
}

pub fn router(liveness: LivenessChecker, metrics: bool) -> Router {
    let state = AppState { liveness };

    let router = Router::new()
        .route("/", get(probe))
        .route("/health", get(probe))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // Don't install metrics unless asked to. Installing a global recorder
    // when this crate is used as a library (during tests etc) does not work
    // well.
    if metrics {
        let recorder_handle = setup_metrics_recorder();

        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
