//! HTLC Bridge - 跨链哈希时间锁交换后端
//!
//! 支持 Polygon Amoy（80002）与 BNB 测试网（97）上部署的 HashedTimelock 合约

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};
