//! Liveness endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use super::AppState;
use crate::store::{self, ObjectStore};

/// Returns 200 OK while the store can list clusters, 503 otherwise.
pub async fn health_handler<S: ObjectStore>(
    State(app_state): State<AppState<S>>,
) -> (StatusCode, &'static str) {
    match store::list_cluster_keys(app_state.store()).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            warn!(error = %e, "Health check could not reach the store");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}
