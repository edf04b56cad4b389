//! HTLC 业务错误分类

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HtlcError {
    /// 未知链标识
    #[error("unsupported chain id: {0}")]
    UnsupportedChain(String),

    /// 链上执行回滚
    #[error("execution reverted: {0}")]
    ChainRevert(String),

    /// RPC 传输失败或超时
    #[error("rpc unavailable: {0}")]
    RpcUnavailable(String),

    #[error("network already exist: {0}")]
    DuplicateNetwork(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Generic(String),
}

impl HtlcError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// 是否为链上回滚
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::ChainRevert(_))
    }
}

impl From<ethers::abi::AbiError> for HtlcError {
    fn from(err: ethers::abi::AbiError) -> Self {
        Self::Generic(format!("ABI error: {}", err))
    }
}

impl From<ethers::abi::Error> for HtlcError {
    fn from(err: ethers::abi::Error) -> Self {
        Self::Generic(format!("ABI error: {}", err))
    }
}
