use std::sync::Arc;

use anyhow::Context;

use crate::{
    config::{Config, StorageBackend},
    domain::ChainRegistry,
    infrastructure::{db, encryption::EncryptionKey},
    repository::{
        MemoryNetworkRepository, MemoryTransactionRecordRepository, NetworkRepository,
        PgNetworkRepository, PgTransactionRecordRepository, TransactionRecordRepository,
    },
    service::{
        ChainClientAdapter, HtlcService, HttpRpcConnector, NetworkRegistry, RpcConnector,
        SubmissionQueue, TransactionHistory,
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub htlc: Arc<HtlcService>,
    pub networks: Arc<NetworkRegistry>,
    pub history: Arc<TransactionHistory>,
    pub encryption_key: Arc<EncryptionKey>,
    /// 仅 postgres 后端存在
    pub pool: Option<db::PgPool>,
}

/// 存储层依赖
pub struct Storage {
    pub transactions: Arc<dyn TransactionRecordRepository>,
    pub networks: Arc<dyn NetworkRepository>,
    pub pool: Option<db::PgPool>,
}

impl Storage {
    pub fn memory() -> Self {
        Self {
            transactions: Arc::new(MemoryTransactionRecordRepository::new()),
            networks: Arc::new(MemoryNetworkRepository::new()),
            pool: None,
        }
    }

    /// 按配置选择后端；postgres 后端会执行迁移
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, records are lost on restart");
                Ok(Self::memory())
            }
            StorageBackend::Postgres => {
                let pool = db::init_pool(&config.storage)
                    .await
                    .context("Failed to connect to database")?;
                db::run_migrations(&pool).await?;
                Ok(Self {
                    transactions: Arc::new(PgTransactionRecordRepository::new(pool.clone())),
                    networks: Arc::new(PgNetworkRepository::new(pool.clone())),
                    pool: Some(pool),
                })
            }
        }
    }
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        config: Arc<Config>,
        connector: Arc<dyn RpcConnector>,
        storage: Storage,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(ChainRegistry::new(&config.chains)?);
        tracing::info!(
            chains = ?registry.supported_chain_ids(),
            "Chain registry initialized"
        );

        let chains = Arc::new(ChainClientAdapter::new(registry, connector));
        let htlc = Arc::new(HtlcService::new(chains, Arc::new(SubmissionQueue::new())));

        let encryption_key = Arc::new(
            EncryptionKey::parse(&config.encryption.key).context("Invalid PK_ENC_KEY")?,
        );

        Ok(Self {
            htlc,
            networks: Arc::new(NetworkRegistry::new(storage.networks)),
            history: Arc::new(TransactionHistory::new(storage.transactions)),
            encryption_key,
            pool: storage.pool,
            config,
        })
    }

    /// 生产装配：HTTP RPC + 配置选定的存储
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let connector = Arc::new(HttpRpcConnector::new(&config.chains));
        let storage = Storage::from_config(&config).await?;
        Self::new(Arc::new(config), connector, storage)
    }
}
