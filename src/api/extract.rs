//! 请求体提取器
//! JSON 解析失败统一转为 400 `invalid_parameter`，沿用 AppError 响应体

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::{api::middleware::TraceId, error::AppError};

/// `Json<T>` 的替代，拒绝时返回 [`AppError`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let trace_id = req.extensions().get::<TraceId>().map(|t| t.0.clone());

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => {
                tracing::warn!(
                    trace_id = ?trace_id,
                    status = %rejection.status(),
                    error = %rejection.body_text(),
                    "Rejected request body"
                );
                let err = AppError::invalid_parameter(rejection.body_text());
                Err(match trace_id {
                    Some(id) => err.with_trace_id(id),
                    None => err,
                })
            }
        }
    }
}
