//! 交易历史API

use std::sync::Arc;

use axum::extract::State;

use crate::{
    api::{
        middleware::{AuthUser, TraceId},
        response::{success_response_with_message, ApiResult},
    },
    app_state::AppState,
    error::AppError,
    infrastructure::log_redact::redact_email,
    repository::TransactionRecord,
};

#[utoipa::path(
    get,
    path = "/blockchain-transaction/transaction",
    responses(
        (status = 200, description = "Caller's transaction records, newest first"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBodyDoc)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    auth: AuthUser,
) -> ApiResult<Vec<TransactionRecord>> {
    tracing::info!(owner = %redact_email(&auth.email), "Listing transaction history");

    let records = state
        .history
        .history(&auth.email)
        .await
        .map_err(|e| AppError::from(e).with_trace_id(trace_id.0.clone()))?;

    success_response_with_message(records, "fetch successfully")
}
