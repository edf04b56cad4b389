// 交易记录数据访问 Repository
// 只追加：创建后不更新、不删除

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use uuid::Uuid;

// ============ 领域模型 ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub owner_email: String,
    pub chain_id: String,
    /// 原始回执 JSON
    pub raw_result: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransactionRecord {
    pub owner_email: String,
    pub chain_id: String,
    pub raw_result: serde_json::Value,
}

// ============ Repository Trait ============

#[async_trait]
pub trait TransactionRecordRepository: Send + Sync {
    async fn save(&self, record: NewTransactionRecord) -> Result<TransactionRecord>;
    /// 按创建时间倒序
    async fn find_by_owner(&self, email: &str) -> Result<Vec<TransactionRecord>>;
}

// ============ PostgreSQL 实现 ============

pub struct PgTransactionRecordRepository {
    pool: PgPool,
}

impl PgTransactionRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRecordRepository for PgTransactionRecordRepository {
    async fn save(&self, record: NewTransactionRecord) -> Result<TransactionRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO transaction_records (id, owner_email, chain_id, raw_result, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&record.owner_email)
        .bind(&record.chain_id)
        .bind(&record.raw_result)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(TransactionRecord {
            id,
            owner_email: record.owner_email,
            chain_id: record.chain_id,
            raw_result: record.raw_result,
            created_at: now,
        })
    }

    async fn find_by_owner(&self, email: &str) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_email, chain_id, raw_result, created_at
            FROM transaction_records
            WHERE owner_email = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(TransactionRecord {
                id: row.try_get("id")?,
                owner_email: row.try_get("owner_email")?,
                chain_id: row.try_get("chain_id")?,
                raw_result: row.try_get("raw_result")?,
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(records)
    }
}

// ============ 内存实现 ============

#[derive(Default)]
pub struct MemoryTransactionRecordRepository {
    records: Arc<RwLock<Vec<TransactionRecord>>>,
}

impl MemoryTransactionRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRecordRepository for MemoryTransactionRecordRepository {
    async fn save(&self, record: NewTransactionRecord) -> Result<TransactionRecord> {
        let saved = TransactionRecord {
            id: Uuid::new_v4(),
            owner_email: record.owner_email,
            chain_id: record.chain_id,
            raw_result: record.raw_result,
            created_at: Utc::now(),
        };
        self.records.write().await.push(saved.clone());
        Ok(saved)
    }

    async fn find_by_owner(&self, email: &str) -> Result<Vec<TransactionRecord>> {
        let records = self.records.read().await;
        // 插入顺序即时间顺序，倒序输出
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.owner_email == email)
            .cloned()
            .collect())
    }
}
