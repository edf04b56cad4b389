//! HTLC 合约操作 API
//!
//! 字段名沿用既有客户端：`chainID`、`contractID`、`pk` 等。
//! `pk` 为 hex(nonce || AES-256-GCM 密文)，解密后只在本次请求内存中使用。
//! `rpc` 字段仅为兼容保留，RPC 地址由链配置决定。

use std::sync::Arc;

use axum::extract::State;
use ethers::types::TransactionReceipt;
use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::{
    api::{
        extract::ApiJson,
        middleware::{AuthUser, TraceId},
        response::{success_response, ApiResult},
    },
    app_state::AppState,
    domain::{
        BlockRange, EventLookup, HtlcError, LockRecord, LockRequest, RefundRequest,
        WithdrawRequest,
    },
    error::AppError,
    infrastructure::{encryption::decrypt_private_key, log_redact::redact_email},
};

/// 接受 `"123"` 或 `123`
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(u64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.trim().to_string(),
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

fn parse_u64(field: &str, value: &str) -> Result<u64, HtlcError> {
    value
        .parse::<u64>()
        .map_err(|_| HtlcError::invalid(format!("{} must be a non-negative integer", field)))
}

fn traced(trace_id: &TraceId) -> impl FnOnce(HtlcError) -> AppError + '_ {
    move |e| AppError::from(e).with_trace_id(trace_id.0.clone())
}

fn decrypt_pk(state: &AppState, pk: &str, trace_id: &TraceId) -> Result<Zeroizing<String>, AppError> {
    decrypt_private_key(pk, &state.encryption_key).map_err(|e| {
        tracing::warn!(trace_id = %trace_id.0, error = %e, "Private key decryption failed");
        AppError::decryption_failed("unable to decrypt pk").with_trace_id(trace_id.0.clone())
    })
}

/// 记录交易；链上已成功，存储失败只记日志
async fn record_transaction(state: &AppState, email: &str, chain_id: &str, receipt: &TransactionReceipt) {
    let raw = serde_json::json!({
        "contract_data": receipt,
        "chainID": chain_id,
    });
    if let Err(e) = state.history.record(email, chain_id, raw).await {
        tracing::error!(
            owner = %redact_email(email),
            tx_hash = ?receipt.transaction_hash,
            error = %e,
            "Failed to save transaction record"
        );
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewContractBody {
    pub from: String,
    pub to: String,
    /// 口令明文，服务端计算 keccak-256 后上链
    pub pass: String,
    /// 超时时间戳（Unix 秒）
    #[serde(deserialize_with = "string_or_number")]
    pub time: String,
    pub pk: String,
    #[serde(default)]
    pub rpc: Option<String>,
    #[serde(rename = "chainID")]
    pub chain_id: String,
    /// 整币金额，例如 "0.5"
    #[serde(deserialize_with = "string_or_number")]
    pub coins: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[utoipa::path(
    post,
    path = "/blockchain-transaction/new-contract",
    request_body = NewContractBody,
    responses(
        (status = 200, description = "Lock event emitted in the receipt's block"),
        (status = 400, description = "Revert or failure", body = crate::error::ErrorBodyDoc)
    )
)]
pub async fn new_contract(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    ApiJson(body): ApiJson<NewContractBody>,
) -> ApiResult<EventLookup> {
    let signing_key = decrypt_pk(&state, &body.pk, &trace_id)?;
    let timelock = parse_u64("time", &body.time).map_err(traced(&trace_id))?;

    let receipt = state
        .htlc
        .create_lock(LockRequest {
            sender: body.from,
            receiver: body.to,
            passphrase: Zeroizing::new(body.pass),
            timelock,
            signing_key,
            chain_id: body.chain_id.clone(),
            amount: body.coins,
        })
        .await
        .map_err(traced(&trace_id))?;

    // 未带 email 时以空 owner 记录，任何登录用户都查不到
    let owner = body.email.as_deref().unwrap_or_default();
    if owner.is_empty() {
        tracing::warn!(trace_id = %trace_id.0, "new-contract without email, recording without owner");
    }
    record_transaction(&state, owner, &body.chain_id, &receipt).await;

    let block = receipt
        .block_number
        .ok_or_else(|| HtlcError::generic("receipt has no block number"))
        .map_err(traced(&trace_id))?;

    let lookup = state
        .htlc
        .query_lock_events(&body.chain_id, BlockRange::single(block.as_u64()))
        .await
        .map_err(traced(&trace_id))?;

    success_response(lookup)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WithdrawBody {
    #[serde(rename = "contractID")]
    pub contract_id: String,
    pub secret: String,
    pub from: String,
    pub pk: String,
    #[serde(rename = "chainID")]
    pub chain_id: String,
    #[serde(default)]
    pub rpc: Option<String>,
}

#[utoipa::path(
    post,
    path = "/blockchain-transaction/withdraw",
    request_body = WithdrawBody,
    responses(
        (status = 200, description = "Transaction receipt"),
        (status = 400, description = "Revert or failure", body = crate::error::ErrorBodyDoc),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBodyDoc)
    ),
    security(("bearer_auth" = []))
)]
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    auth: AuthUser,
    ApiJson(body): ApiJson<WithdrawBody>,
) -> ApiResult<TransactionReceipt> {
    let signing_key = decrypt_pk(&state, &body.pk, &trace_id)?;

    let receipt = state
        .htlc
        .withdraw(WithdrawRequest {
            contract_id: body.contract_id,
            secret: Zeroizing::new(body.secret),
            sender: body.from,
            signing_key,
            chain_id: body.chain_id.clone(),
        })
        .await
        .map_err(traced(&trace_id))?;

    record_transaction(&state, &auth.email, &body.chain_id, &receipt).await;

    success_response(receipt)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefundBody {
    #[serde(rename = "contractID")]
    pub contract_id: String,
    pub from: String,
    pub pk: String,
    #[serde(rename = "chainID")]
    pub chain_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[utoipa::path(
    post,
    path = "/blockchain-transaction/refund",
    request_body = RefundBody,
    responses(
        (status = 200, description = "Latest lock event on the chain"),
        (status = 400, description = "Revert or failure", body = crate::error::ErrorBodyDoc)
    )
)]
pub async fn refund(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    ApiJson(body): ApiJson<RefundBody>,
) -> ApiResult<EventLookup> {
    let signing_key = decrypt_pk(&state, &body.pk, &trace_id)?;

    let receipt = state
        .htlc
        .refund(RefundRequest {
            contract_id: body.contract_id,
            sender: body.from,
            signing_key,
            chain_id: body.chain_id.clone(),
        })
        .await
        .map_err(traced(&trace_id))?;

    if let Some(email) = body.email.as_deref().filter(|e| !e.is_empty()) {
        record_transaction(&state, email, &body.chain_id, &receipt).await;
    }

    let lookup = state
        .htlc
        .query_lock_events(&body.chain_id, BlockRange::all())
        .await
        .map_err(traced(&trace_id))?;

    success_response(lookup)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EventByBlockBody {
    /// 区块号
    #[serde(deserialize_with = "string_or_number")]
    pub bn: String,
    #[serde(rename = "chainID")]
    pub chain_id: String,
    #[serde(default)]
    pub rpc: Option<String>,
}

#[utoipa::path(
    post,
    path = "/blockchain-transaction/get-event-by-Block",
    request_body = EventByBlockBody,
    responses(
        (status = 200, description = "Lock event in the block, or {msg: \"no log found\"}"),
        (status = 400, description = "Failure", body = crate::error::ErrorBodyDoc)
    )
)]
pub async fn get_event_by_block(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    ApiJson(body): ApiJson<EventByBlockBody>,
) -> ApiResult<EventLookup> {
    let block = parse_u64("bn", &body.bn).map_err(traced(&trace_id))?;

    let lookup = state
        .htlc
        .query_lock_events(&body.chain_id, BlockRange::single(block))
        .await
        .map_err(traced(&trace_id))?;

    success_response(lookup)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GetContractBody {
    #[serde(rename = "chainID")]
    pub chain_id: String,
    /// 锁 ID（bytes32）
    pub contract_address: String,
    pub from: String,
}

#[utoipa::path(
    post,
    path = "/blockchain-transaction/get-contract",
    request_body = GetContractBody,
    responses(
        (status = 200, description = "On-chain lock record"),
        (status = 400, description = "Failure", body = crate::error::ErrorBodyDoc)
    )
)]
pub async fn get_contract(
    State(state): State<Arc<AppState>>,
    trace_id: TraceId,
    ApiJson(body): ApiJson<GetContractBody>,
) -> ApiResult<LockRecord> {
    let record = state
        .htlc
        .get_lock(&body.chain_id, &body.contract_address, &body.from)
        .await
        .map_err(traced(&trace_id))?;

    success_response(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_fields_accept_strings_and_numbers() {
        let body: EventByBlockBody =
            serde_json::from_value(serde_json::json!({ "bn": 42, "chainID": "97" })).unwrap();
        assert_eq!(body.bn, "42");

        let body: EventByBlockBody =
            serde_json::from_value(serde_json::json!({ "bn": "43", "chainID": "97", "rpc": "x" }))
                .unwrap();
        assert_eq!(body.bn, "43");
        assert_eq!(body.chain_id, "97");
    }

    #[test]
    fn test_new_contract_body_uses_client_field_names() {
        let body: NewContractBody = serde_json::from_value(serde_json::json!({
            "from": "0x01", "to": "0x02", "pass": "secret1", "time": 1900000000u64,
            "pk": "00", "chainID": "80002", "coins": 0.5, "email": "a@example.com"
        }))
        .unwrap();
        assert_eq!(body.time, "1900000000");
        assert_eq!(body.coins, "0.5");
        assert_eq!(body.chain_id, "80002");
        assert!(body.rpc.is_none());
    }
}
