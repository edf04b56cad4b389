//! 按发送方串行化交易提交
//!
//! 同一 `(链, 发送地址)` 从读取 nonce 到拿到回执期间独占；不同发送方、不同链并行。
//! 只在进程内生效，多实例共用同一发送地址时仍可能冲突。

use std::{collections::HashMap, sync::Arc};

use ethers::types::Address;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 发送方提交槽位的持有凭证，drop 时释放
pub struct SubmissionSlot {
    _guard: OwnedMutexGuard<()>,
}

#[derive(Default)]
pub struct SubmissionQueue {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 等待并占用发送方的提交槽位
    pub async fn acquire(&self, chain_id: &str, sender: Address) -> SubmissionSlot {
        let key = format!("{}:{:?}", chain_id, sender);

        let slot = {
            let mut slots = self.slots.lock().await;
            // 清理无人持有的槽位
            slots.retain(|k, s| k == &key || Arc::strong_count(s) > 1);
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        tracing::debug!(sender_slot = %key, "Waiting for submission slot");
        let guard = slot.lock_owned().await;

        SubmissionSlot { _guard: guard }
    }

    /// 当前登记的槽位数
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}
