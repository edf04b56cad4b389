//! HTLC 领域模型
//!
//! 链上的锁记录只读不写：本服务只提交状态转换交易并观察结果。

use ethers::types::{Address, BlockNumber, H256, U256};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// 创建锁请求
///
/// 口令明文只用于计算哈希，不落库、不记日志。
pub struct LockRequest {
    pub sender: String,
    pub receiver: String,
    pub passphrase: Zeroizing<String>,
    /// 超时时间戳（Unix 秒）
    pub timelock: u64,
    pub signing_key: Zeroizing<String>,
    pub chain_id: String,
    /// 以整币为单位的金额，例如 "0.5"
    pub amount: String,
}

/// 提取请求（揭示原像）
pub struct WithdrawRequest {
    pub contract_id: String,
    pub secret: Zeroizing<String>,
    pub sender: String,
    pub signing_key: Zeroizing<String>,
    pub chain_id: String,
}

/// 退款请求（超时后）
pub struct RefundRequest {
    pub contract_id: String,
    pub sender: String,
    pub signing_key: Zeroizing<String>,
    pub chain_id: String,
}

/// 链上锁记录，对应 `getContract(bytes32)` 的返回值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub contract_id: H256,
    pub sender: Address,
    pub receiver: Address,
    pub amount: U256,
    pub hashlock: H256,
    pub timelock: U256,
    pub withdrawn: bool,
    pub refunded: bool,
    pub preimage: H256,
}

/// 解码后的 `LogHTLCNew` 事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEvent {
    pub contract_id: H256,
    pub sender: Address,
    pub receiver: Address,
    pub amount: U256,
    pub hashlock: H256,
    pub timelock: U256,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<H256>,
    pub log_index: Option<u64>,
}

pub const NO_EVENT_FOUND: &str = "no log found";

/// 事件查询结果：要么找到事件，要么显式的“未找到”
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventLookup {
    Found(LockEvent),
    NotFound { msg: String },
}

impl EventLookup {
    pub fn not_found() -> Self {
        Self::NotFound {
            msg: NO_EVENT_FOUND.to_string(),
        }
    }

    pub fn event(&self) -> Option<&LockEvent> {
        match self {
            Self::Found(event) => Some(event),
            Self::NotFound { .. } => None,
        }
    }
}

/// 闭区间区块范围
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockRange {
    pub from: BlockNumber,
    pub to: BlockNumber,
}

impl BlockRange {
    /// 创世块到最新块
    pub fn all() -> Self {
        Self {
            from: BlockNumber::Number(0u64.into()),
            to: BlockNumber::Latest,
        }
    }

    /// 单个区块
    pub fn single(block: u64) -> Self {
        Self {
            from: BlockNumber::Number(block.into()),
            to: BlockNumber::Number(block.into()),
        }
    }

    pub fn between(from: u64, to: u64) -> Self {
        Self {
            from: BlockNumber::Number(from.into()),
            to: BlockNumber::Number(to.into()),
        }
    }
}
