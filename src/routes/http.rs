// HTTP handlers: version, metric queries and ingestion, container target

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::AppState;
use crate::docker_repo::ContainerTarget;
use crate::error::{StoreError, TransportError};
use crate::fanout::{Broadcaster, TOPIC_ALERT};
use crate::models::{Category, Reading, value::two_decimals};
use crate::version::{NAME, VERSION};

/// Error body for the monitoring API: `{"error": "..."}`.
pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match e {
            StoreError::InvalidRecord(_) => StatusCode::BAD_REQUEST,
            StoreError::Timeout(_) | StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

/// Body of POST /api/monitoring and /api/monitoring/stream. Timestamp defaults to now.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MetricInput {
    name: String,
    category: Category,
    #[serde(with = "two_decimals")]
    value: f64,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    entity: Option<String>,
}

impl MetricInput {
    fn into_reading(self) -> Result<Reading, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError(
                StatusCode::BAD_REQUEST,
                "name must be non-empty".into(),
            ));
        }
        if !self.value.is_finite() {
            return Err(ApiError(
                StatusCode::BAD_REQUEST,
                "value must be a finite number".into(),
            ));
        }
        Ok(Reading {
            name: self.name,
            category: self.category,
            value: self.value,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            entity: self.entity,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StreamResponse {
    reading: Reading,
    alert: Option<String>,
}

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/monitoring
pub(super) async fn list_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let records = state.store.query(None).await?;
    Ok(Json(records).into_response())
}

/// GET /api/monitoring/{category}
pub(super) async fn metrics_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Response, ApiError> {
    let category = Category::parse(&category).ok_or_else(|| {
        ApiError(StatusCode::BAD_REQUEST, "category must be non-empty".into())
    })?;
    let records = state.store.query(Some(&category)).await?;
    Ok(Json(records).into_response())
}

/// POST /api/monitoring
pub(super) async fn add_metric(
    State(state): State<AppState>,
    Json(input): Json<MetricInput>,
) -> Result<Response, ApiError> {
    let reading = input.into_reading()?;
    state.store.append(&reading).await?;
    Ok((StatusCode::CREATED, Json(reading)).into_response())
}

/// POST /api/monitoring/stream — store, then raise an alert on the hub if a rule fires.
pub(super) async fn stream_metric(
    State(state): State<AppState>,
    Json(input): Json<MetricInput>,
) -> Result<Response, ApiError> {
    let reading = input.into_reading()?;
    state.store.append(&reading).await?;

    let alert = state.evaluator.evaluate(&reading);
    if let Some(ref event) = alert {
        match state.hub.publish(TOPIC_ALERT, json!([event.message])).await {
            Ok(()) | Err(TransportError::NoSubscribers) => {}
            Err(e) => tracing::warn!(
                error = %e,
                operation = "publish",
                category = %event.category,
                "alert broadcast failed"
            ),
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(StreamResponse {
            reading,
            alert: alert.map(|e| e.message),
        }),
    )
        .into_response())
}

/// POST /api/monitoring/container/{id} — "*" samples every running container.
pub(super) async fn set_container_target(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let target = ContainerTarget::parse(&id);
    tracing::info!(container = ?target, "container target changed");
    state.container_target.send_replace(target);
    Json(json!({ "containerId": id.trim() }))
}

/// DELETE /api/monitoring/container — back to host-only sampling.
pub(super) async fn clear_container_target(State(state): State<AppState>) -> StatusCode {
    tracing::info!("container target cleared");
    state.container_target.send_replace(ContainerTarget::None);
    StatusCode::NO_CONTENT
}
