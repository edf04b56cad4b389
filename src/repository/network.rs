// 网络注册表数据访问 Repository
// 名称大小写不敏感唯一；元数据以 JSONB 存放

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{postgres::PgRow, PgPool, Row};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

// ============ 领域模型 ============

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEntry {
    pub id: Uuid,
    pub name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNetworkEntry {
    pub name: String,
    pub metadata: serde_json::Value,
}

/// 查询条件；`name` 为大小写不敏感的精确匹配
#[derive(Debug, Clone, Default)]
pub struct NetworkFilter {
    pub name: Option<String>,
}

impl NetworkFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// 唯一约束冲突
#[derive(Debug, Error)]
#[error("network name already taken: {0}")]
pub struct NameTaken(pub String);

// ============ Repository Trait ============

#[async_trait]
pub trait NetworkRepository: Send + Sync {
    /// 名称冲突时返回 [`NameTaken`]
    async fn save(&self, entry: NewNetworkEntry) -> Result<NetworkEntry>;
    async fn find(&self, filter: NetworkFilter) -> Result<Vec<NetworkEntry>>;
    /// 把 `patch` 合并进元数据；不存在时返回 `None`
    async fn find_one_and_update(
        &self,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<Option<NetworkEntry>>;
}

// ============ PostgreSQL 实现 ============

pub struct PgNetworkRepository {
    pool: PgPool,
}

impl PgNetworkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &PgRow) -> Result<NetworkEntry> {
    Ok(NetworkEntry {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl NetworkRepository for PgNetworkRepository {
    async fn save(&self, entry: NewNetworkEntry) -> Result<NetworkEntry> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO networks (id, name, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&entry.name)
        .bind(&entry.metadata)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(ref db_err)) = result {
            // PostgreSQL unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return Err(NameTaken(entry.name).into());
            }
        }
        result?;

        Ok(NetworkEntry {
            id,
            name: entry.name,
            metadata: entry.metadata,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find(&self, filter: NetworkFilter) -> Result<Vec<NetworkEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, metadata, created_at, updated_at
            FROM networks
            WHERE ($1::TEXT IS NULL OR LOWER(name) = LOWER($1))
            ORDER BY created_at ASC
            "#,
        )
        .bind(filter.name.as_deref())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn find_one_and_update(
        &self,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<Option<NetworkEntry>> {
        let row = sqlx::query(
            r#"
            UPDATE networks
            SET metadata = metadata || $2, updated_at = NOW()
            WHERE LOWER(name) = LOWER($1)
            RETURNING id, name, metadata, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(&patch)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }
}

// ============ 内存实现 ============

#[derive(Default)]
pub struct MemoryNetworkRepository {
    entries: Arc<RwLock<Vec<NetworkEntry>>>,
}

impl MemoryNetworkRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// 对象按键浅合并，其他情况整体替换（与 JSONB `||` 一致）
fn merge_metadata(target: &mut serde_json::Value, patch: serde_json::Value) {
    match (target.as_object_mut(), patch) {
        (Some(obj), serde_json::Value::Object(patch)) => {
            for (k, v) in patch {
                obj.insert(k, v);
            }
        }
        (_, patch) => *target = patch,
    }
}

#[async_trait]
impl NetworkRepository for MemoryNetworkRepository {
    async fn save(&self, entry: NewNetworkEntry) -> Result<NetworkEntry> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| same_name(&e.name, &entry.name)) {
            return Err(NameTaken(entry.name).into());
        }

        let now = Utc::now();
        let saved = NetworkEntry {
            id: Uuid::new_v4(),
            name: entry.name,
            metadata: entry.metadata,
            created_at: now,
            updated_at: now,
        };
        entries.push(saved.clone());
        Ok(saved)
    }

    async fn find(&self, filter: NetworkFilter) -> Result<Vec<NetworkEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| match &filter.name {
                Some(name) => same_name(&e.name, name),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn find_one_and_update(
        &self,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<Option<NetworkEntry>> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.iter_mut().find(|e| same_name(&e.name, name)) else {
            return Ok(None);
        };

        merge_metadata(&mut entry.metadata, patch);
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }
}
