//! 网络注册表 API
//! 请求体中除 `name` 外的字段整体作为元数据保存

use std::sync::Arc;

use axum::extract::{Path, State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    api::{
        extract::ApiJson,
        middleware::TraceId,
        response::{success_response, success_response_with_message, ApiResult},
    },
    app_state::AppState,
    domain::HtlcError,
    error::AppError,
    repository::NetworkEntry,
};

/// 文档用：`{ "name": "...", ...metadata }`
#[derive(Serialize, ToSchema)]
pub struct AddNetworkDoc {
    pub name: String,
}

fn split_name(body: serde_json::Value) -> Result<(String, serde_json::Value), HtlcError> {
    let serde_json::Value::Object(mut fields) = body else {
        return Err(HtlcError::invalid("request body must be a JSON object"));
    };

    let name = match fields.remove("name") {
        Some(serde_json::Value::String(name)) => name,
        _ => return Err(HtlcError::invalid("name is required")),
    };

    Ok((name, serde_json::Value::Object(fields)))
}

#[utoipa::path(
    post,
    path = "/blockchain-transaction/network",
    request_body = AddNetworkDoc,
    responses(
        (status = 200, description = "Network added"),
        (status = 401, description = "network already exist", body = crate::error::ErrorBodyDoc)
    )
)]
pub async fn add_network(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> ApiResult<NetworkEntry> {
    let trace = |e: HtlcError| AppError::from(e).with_trace_id(trace_id.0.clone());

    let (name, metadata) = split_name(body).map_err(trace)?;
    let entry = state
        .networks
        .register(&name, metadata)
        .await
        .map_err(trace)?;

    success_response_with_message(entry, "network add successfully")
}

#[utoipa::path(
    get,
    path = "/blockchain-transaction/network",
    responses((status = 200, description = "All registered networks"))
)]
pub async fn list_networks(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
) -> ApiResult<Vec<NetworkEntry>> {
    let networks = state
        .networks
        .list()
        .await
        .map_err(|e| AppError::from(e).with_trace_id(trace_id.0.clone()))?;

    success_response_with_message(networks, "fetch successfully")
}

#[utoipa::path(
    patch,
    path = "/blockchain-transaction/network/{name}",
    params(("name" = String, Path, description = "Network name, case-insensitive")),
    responses(
        (status = 200, description = "Updated network"),
        (status = 404, description = "Unknown network", body = crate::error::ErrorBodyDoc)
    )
)]
pub async fn update_network(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    Path(name): Path<String>,
    ApiJson(patch): ApiJson<serde_json::Value>,
) -> ApiResult<NetworkEntry> {
    let entry = state
        .networks
        .update(&name, patch)
        .await
        .map_err(|e| AppError::from(e).with_trace_id(trace_id.0.clone()))?;

    success_response(entry)
}
