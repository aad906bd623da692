//! HTTP surface of the operator.
//!
//! Operators create clusters and inspect their status here; the task executor
//! reads tasks and writes completion records back.
//!
//! # Endpoints
//!
//! - `GET /health` - 200 while the store answers
//! - `POST /api/v1/namespaces/{namespace}/clusters` - create a cluster
//! - `GET /api/v1/namespaces/{namespace}/clusters/{name}` - cluster with status
//! - `GET /api/v1/namespaces/{namespace}/tasks/{kind}/{name}` - a task
//! - `PUT /api/v1/namespaces/{namespace}/tasks/{kind}/{name}/result` - executor
//!   write-back for Command and FactFile tasks

use std::sync::Arc;

use axum::routing::{get, post, put};

use crate::store::ObjectStore;

pub mod api;
pub mod health;

pub use api::ApiError;
pub use health::health_handler;

/// Shared application state, handed to every handler through `State`.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    store: Arc<S>,
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { store }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<S: ObjectStore>(app_state: AppState<S>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health_handler::<S>))
        .route(
            "/api/v1/namespaces/{namespace}/clusters",
            post(api::create_cluster::<S>),
        )
        .route(
            "/api/v1/namespaces/{namespace}/clusters/{name}",
            get(api::get_cluster::<S>),
        )
        .route(
            "/api/v1/namespaces/{namespace}/tasks/{kind}/{name}",
            get(api::get_task::<S>),
        )
        .route(
            "/api/v1/namespaces/{namespace}/tasks/{kind}/{name}/result",
            put(api::put_task_result::<S>),
        )
        .with_state(app_state)
}
