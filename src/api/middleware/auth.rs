//! 认证中间件
//! 验证 Bearer Token，并把调用方邮箱注入请求扩展

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{app_state::AppState, error::AppError, infrastructure::jwt::verify_token};

/// 认证信息（从Token中提取）
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
}

/// 认证中间件
///
/// 1. 提取 Authorization 头并校验 Bearer 格式
/// 2. 校验 JWT 签名与过期时间
/// 3. 注入 [`AuthUser`]
pub async fn require_auth(
    State(st): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Authorization header required"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid authorization header format"))?;

    let claims = verify_token(token, &st.config.jwt.secret)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    req.extensions_mut().insert(AuthUser {
        email: claims.email().to_string(),
    });

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Not authenticated"))
    }
}
