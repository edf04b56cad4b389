//! Domain 模块
//!
//! 链配置、HTLC 领域模型与错误分类

pub mod chain_config;
pub mod error;
pub mod htlc;

// 重新导出常用类型
pub use chain_config::{ChainConfig, ChainRegistry};
pub use error::HtlcError;
pub use htlc::{
    BlockRange, EventLookup, LockEvent, LockRecord, LockRequest, RefundRequest, WithdrawRequest,
};
