use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::HtlcError;

/// 未分类错误对外统一使用的提示
pub const GENERIC_ERROR_MESSAGE: &str = "Oops, something went wrong";
pub const DUPLICATE_NETWORK_MESSAGE: &str = "network already exist";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    Unauthorized,
    NotFound,

    // 业务错误码
    ChainRevert,
    ChainNotSupported,
    RpcUnavailable,
    InvalidParameter,
    DecryptionFailed,
    NetworkExists,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::ChainRevert => "chain_revert",
            AppErrorCode::ChainNotSupported => "chain_not_supported",
            AppErrorCode::RpcUnavailable => "rpc_unavailable",
            AppErrorCode::InvalidParameter => "invalid_parameter",
            AppErrorCode::DecryptionFailed => "decryption_failed",
            AppErrorCode::NetworkExists => "network_exists",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

/// 错误响应文档
#[derive(Serialize, ToSchema)]
pub struct ErrorBodyDoc {
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    /// 通用失败：不透出内部细节
    pub fn generic() -> Self {
        Self::new(
            AppErrorCode::BadRequest,
            StatusCode::BAD_REQUEST,
            GENERIC_ERROR_MESSAGE,
        )
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Unauthorized, StatusCode::UNAUTHORIZED, msg)
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidParameter, StatusCode::BAD_REQUEST, msg)
    }

    pub fn decryption_failed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::DecryptionFailed, StatusCode::BAD_REQUEST, msg)
    }

    pub fn chain_revert(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::ChainRevert, StatusCode::BAD_REQUEST, msg)
    }

    pub fn chain_not_supported(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::ChainNotSupported, StatusCode::BAD_REQUEST, msg)
    }

    pub fn rpc_unavailable(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::RpcUnavailable, StatusCode::BAD_REQUEST, msg)
    }

    /// 重复网络沿用 401
    pub fn network_exists() -> Self {
        Self::new(
            AppErrorCode::NetworkExists,
            StatusCode::UNAUTHORIZED,
            DUPLICATE_NETWORK_MESSAGE,
        )
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

impl From<HtlcError> for AppError {
    fn from(err: HtlcError) -> Self {
        match err {
            HtlcError::ChainRevert(detail) => Self::chain_revert(detail),
            HtlcError::UnsupportedChain(id) => {
                Self::chain_not_supported(format!("unsupported chain id: {}", id))
            }
            HtlcError::RpcUnavailable(detail) => {
                tracing::warn!(error = %detail, "Chain RPC unavailable");
                Self::rpc_unavailable("chain rpc unavailable, please retry later")
            }
            HtlcError::InvalidInput(detail) => Self::invalid_parameter(detail),
            HtlcError::DuplicateNetwork(_) => Self::network_exists(),
            HtlcError::NotFound(what) => Self::not_found(format!("{} not found", what)),
            HtlcError::Storage(detail) | HtlcError::Generic(detail) => {
                tracing::error!(error = %detail, "Request failed");
                Self::generic()
            }
        }
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Unhandled error");
        Self::generic()
    }
}
