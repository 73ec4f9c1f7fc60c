use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::{Value, json};
use storefront_core::Document;
use storefront_search::{ListParams, Page};

use crate::cache::with_timeout;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::metrics;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready as long as the process can serve; cache reachability is reported
/// but does not fail readiness since reads fall back to the datastore.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.service.cache();
    let store = cache.store();
    let reachable = with_timeout(cache.op_timeout(), store.ping()).await.is_ok();
    let body = json!({
        "status": "ready",
        "cache": { "mode": store.mode(), "reachable": reachable },
        "resources": state.service.registry().len(),
    });
    (StatusCode::OK, Json(body))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}

pub async fn list_resources(
    State(state): State<AppState>,
    ApiPath(resource): ApiPath<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Page>, ApiError> {
    Ok(Json(state.service.list(&resource, &params).await?))
}

pub async fn read_resource(
    State(state): State<AppState>,
    ApiPath((resource, id)): ApiPath<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.service.get(&resource, &id).await?))
}

pub async fn create_resource(
    State(state): State<AppState>,
    ApiPath(resource): ApiPath<String>,
    ApiJson(payload): ApiJson<Value>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let created = state.service.create(&resource, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_resource(
    State(state): State<AppState>,
    ApiPath((resource, id)): ApiPath<(String, String)>,
    ApiJson(payload): ApiJson<Value>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.service.update(&resource, &id, payload).await?))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    ApiPath((resource, id)): ApiPath<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.service.delete(&resource, &id).await?))
}

#[derive(Serialize)]
pub struct SweepResponse {
    deleted: u64,
}

pub async fn invalidate_topic(
    State(state): State<AppState>,
    ApiPath(topic): ApiPath<String>,
) -> Result<Json<SweepResponse>, ApiError> {
    let deleted = state.service.invalidate_topic(&topic).await?;
    tracing::info!(topic = %topic, deleted, "manual cache sweep");
    Ok(Json(SweepResponse { deleted }))
}
