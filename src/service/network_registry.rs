//! 网络注册表服务

use std::sync::Arc;

use crate::{
    domain::HtlcError,
    repository::{NameTaken, NetworkEntry, NetworkFilter, NetworkRepository, NewNetworkEntry},
};

pub struct NetworkRegistry {
    repo: Arc<dyn NetworkRepository>,
}

impl NetworkRegistry {
    pub fn new(repo: Arc<dyn NetworkRepository>) -> Self {
        Self { repo }
    }

    /// 注册网络；名称大小写不敏感地已存在时拒绝，且不写入
    pub async fn register(
        &self,
        name: &str,
        metadata: serde_json::Value,
    ) -> Result<NetworkEntry, HtlcError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(HtlcError::invalid("name is required"));
        }

        let existing = self
            .repo
            .find(NetworkFilter::by_name(name))
            .await
            .map_err(storage_error)?;
        if !existing.is_empty() {
            return Err(HtlcError::DuplicateNetwork(name.to_string()));
        }

        let entry = self
            .repo
            .save(NewNetworkEntry {
                name: name.to_string(),
                metadata,
            })
            .await
            .map_err(|e| match e.downcast_ref::<NameTaken>() {
                // 预检查与写入之间的并发注册
                Some(taken) => HtlcError::DuplicateNetwork(taken.0.clone()),
                None => storage_error(e),
            })?;

        tracing::info!(network = %entry.name, id = %entry.id, "Network registered");
        Ok(entry)
    }

    pub async fn list(&self) -> Result<Vec<NetworkEntry>, HtlcError> {
        self.repo
            .find(NetworkFilter::default())
            .await
            .map_err(storage_error)
    }

    /// 合并元数据
    pub async fn update(
        &self,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<NetworkEntry, HtlcError> {
        if !patch.is_object() {
            return Err(HtlcError::invalid("metadata patch must be a JSON object"));
        }

        let updated = self
            .repo
            .find_one_and_update(name.trim(), patch)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| HtlcError::NotFound(format!("network {}", name)))?;

        tracing::info!(network = %updated.name, "Network metadata updated");
        Ok(updated)
    }
}

fn storage_error(e: anyhow::Error) -> HtlcError {
    tracing::error!(error = %e, "Network storage failure");
    HtlcError::Storage(e.to_string())
}
