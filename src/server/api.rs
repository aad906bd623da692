//! Cluster and task endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use super::AppState;
use crate::store::{self, ObjectStore, StoreError};
use crate::types::{
    Cluster, ClusterSpec, Kind, Object, ObjectKey, ResourceVersion, Task, TaskResult, UnknownKind,
};

/// Errors returned by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{kind} {key} not found")]
    NotFound { kind: Kind, key: ObjectKey },

    #[error("{0}")]
    UnknownKind(#[from] UnknownKind),

    #[error("{0} is not a task kind")]
    NotATask(Kind),

    #[error("{kind} tasks carry no result record")]
    NoResult { kind: Kind },

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound { .. } | ApiError::Store(StoreError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            ApiError::UnknownKind(_)
            | ApiError::NotATask(_)
            | ApiError::NoResult { .. }
            | ApiError::Store(StoreError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::AlreadyExists { .. } | StoreError::Conflict { .. }) => {
                StatusCode::CONFLICT
            }
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Body of a cluster creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCluster {
    pub name: String,
    pub spec: ClusterSpec,
}

/// Body of an executor result write-back.
///
/// With `resource_version` set, the write only succeeds if the task has not
/// changed since the executor read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResult {
    #[serde(flatten)]
    pub result: TaskResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<ResourceVersion>,
}

/// `POST /api/v1/namespaces/{namespace}/clusters`
#[instrument(skip_all, fields(%namespace, name = %body.name))]
pub async fn create_cluster<S: ObjectStore>(
    State(app_state): State<AppState<S>>,
    Path(namespace): Path<String>,
    Json(body): Json<CreateCluster>,
) -> Result<(StatusCode, Json<Cluster>), ApiError> {
    let key = ObjectKey::new(namespace, body.name);
    let created = app_state
        .store()
        .create(Object::from(Cluster::new(&key, body.spec)))
        .await?;
    info!("Cluster created");

    match created.into_cluster() {
        Some(cluster) => Ok((StatusCode::CREATED, Json(cluster))),
        None => Err(StoreError::UnexpectedKind {
            kind: Kind::Cluster,
            key,
        }
        .into()),
    }
}

/// `GET /api/v1/namespaces/{namespace}/clusters/{name}`
pub async fn get_cluster<S: ObjectStore>(
    State(app_state): State<AppState<S>>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Cluster>, ApiError> {
    let key = ObjectKey::new(namespace, name);
    store::get_cluster(app_state.store(), &key)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound {
            kind: Kind::Cluster,
            key,
        })
}

/// `GET /api/v1/namespaces/{namespace}/tasks/{kind}/{name}`
pub async fn get_task<S: ObjectStore>(
    State(app_state): State<AppState<S>>,
    Path((namespace, kind, name)): Path<(String, String, String)>,
) -> Result<Json<Task>, ApiError> {
    let kind = task_kind(&kind)?;
    let key = ObjectKey::new(namespace, name);
    read_task(app_state.store(), kind, key).await.map(Json)
}

/// `PUT /api/v1/namespaces/{namespace}/tasks/{kind}/{name}/result`
#[instrument(skip_all, fields(%namespace, %kind, %name))]
pub async fn put_task_result<S: ObjectStore>(
    State(app_state): State<AppState<S>>,
    Path((namespace, kind, name)): Path<(String, String, String)>,
    Json(body): Json<PutResult>,
) -> Result<Json<Task>, ApiError> {
    let kind = task_kind(&kind)?;
    let key = ObjectKey::new(namespace, name);
    let store = app_state.store();

    let mut task = read_task(store, kind, key).await?;
    if let Some(version) = body.resource_version {
        task.metadata.resource_version = version;
    }
    if !task.record_result(body.result) {
        return Err(ApiError::NoResult { kind });
    }

    let stored = store.update(Object::from(task)).await?;
    info!(version = %stored.resource_version(), "Task result recorded");
    let key = stored.key();
    stored
        .into_task()
        .map(Json)
        .ok_or(ApiError::Store(StoreError::UnexpectedKind { kind, key }))
}

fn task_kind(raw: &str) -> Result<Kind, ApiError> {
    let kind: Kind = raw.parse()?;
    if !kind.is_task() {
        return Err(ApiError::NotATask(kind));
    }
    Ok(kind)
}

async fn read_task<S: ObjectStore>(store: &S, kind: Kind, key: ObjectKey) -> Result<Task, ApiError> {
    store::get_task(store, kind, &key)
        .await?
        .ok_or(ApiError::NotFound { kind, key })
}
