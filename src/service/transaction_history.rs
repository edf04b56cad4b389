//! 交易记录服务

use std::sync::Arc;

use crate::{
    domain::HtlcError,
    infrastructure::log_redact::redact_email,
    repository::{NewTransactionRecord, TransactionRecord, TransactionRecordRepository},
};

pub struct TransactionHistory {
    repo: Arc<dyn TransactionRecordRepository>,
}

impl TransactionHistory {
    pub fn new(repo: Arc<dyn TransactionRecordRepository>) -> Self {
        Self { repo }
    }

    pub async fn record(
        &self,
        owner_email: &str,
        chain_id: &str,
        raw_result: serde_json::Value,
    ) -> Result<TransactionRecord, HtlcError> {
        let saved = self
            .repo
            .save(NewTransactionRecord {
                owner_email: owner_email.to_string(),
                chain_id: chain_id.to_string(),
                raw_result,
            })
            .await
            .map_err(|e| HtlcError::Storage(e.to_string()))?;

        tracing::info!(
            owner = %redact_email(owner_email),
            chain_id = %chain_id,
            record_id = %saved.id,
            "Transaction recorded"
        );
        Ok(saved)
    }

    /// 调用方自己的记录，最新在前
    pub async fn history(&self, owner_email: &str) -> Result<Vec<TransactionRecord>, HtlcError> {
        self.repo
            .find_by_owner(owner_email)
            .await
            .map_err(|e| HtlcError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryTransactionRecordRepository;

    #[tokio::test]
    async fn test_history_is_scoped_to_owner() {
        let history = TransactionHistory::new(Arc::new(MemoryTransactionRecordRepository::new()));
        history
            .record("a@example.com", "80002", serde_json::json!({ "status": "0x1" }))
            .await
            .unwrap();
        history
            .record("b@example.com", "97", serde_json::json!({ "status": "0x1" }))
            .await
            .unwrap();

        let mine = history.history("a@example.com").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].chain_id, "80002");
    }
}
