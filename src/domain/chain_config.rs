//! 链配置模块
//!
//! 定义支持的 EVM 测试网及其 HashedTimelock 合约部署信息

use std::{collections::HashMap, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use ethers::{abi::Abi, types::Address};
use serde::Deserialize;

use crate::config::ChainsConfig;

pub const POLYGON_AMOY_CHAIN_ID: &str = "80002";
pub const BNB_TESTNET_CHAIN_ID: &str = "97";

pub const POLYGON_AMOY_RPC_URL: &str = "https://rpc-amoy.polygon.technology/";
pub const BNB_TESTNET_RPC_URL: &str = "https://data-seed-prebsc-2-s1.binance.org:8545/";

const POLYGON_AMOY_ARTIFACT: &str =
    include_str!("../../contracts/polygon-amoy/HashedTimelock.json");
const BNB_TESTNET_ARTIFACT: &str = include_str!("../../contracts/bnb-testnet/HashedTimelock.json");

/// 合约编译产物（Truffle 格式）
#[derive(Debug, Deserialize)]
struct ContractArtifact {
    abi: Abi,
    #[serde(default)]
    networks: HashMap<String, NetworkDeployment>,
}

#[derive(Debug, Deserialize)]
struct NetworkDeployment {
    address: String,
}

/// 链配置
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// 对外使用的链标识（"80002"、"97"）
    pub chain_id: String,
    /// EIP-155 链 ID，签名时使用
    pub numeric_chain_id: u64,
    /// 链名称
    pub name: String,
    /// 固定 RPC 端点
    pub rpc_url: String,
    /// HashedTimelock 合约地址
    pub contract_address: Address,
    /// HashedTimelock 合约 ABI
    pub contract_abi: Abi,
}

impl ChainConfig {
    /// 从编译产物构建链配置
    ///
    /// `contract_override` 优先于产物中 `networks[chain_id].address`。
    fn from_artifact(
        chain_id: &str,
        name: &str,
        rpc_url: String,
        artifact_json: &str,
        contract_override: Option<&str>,
    ) -> Result<Self> {
        let artifact: ContractArtifact = serde_json::from_str(artifact_json)
            .with_context(|| format!("Failed to parse HashedTimelock artifact for {}", name))?;

        let address_str = match contract_override {
            Some(addr) => addr.to_string(),
            None => artifact
                .networks
                .get(chain_id)
                .map(|d| d.address.clone())
                .ok_or_else(|| anyhow!("Artifact has no deployment for chain {}", chain_id))?,
        };

        let contract_address = Address::from_str(&address_str)
            .with_context(|| format!("Invalid contract address for chain {}", chain_id))?;

        let numeric_chain_id = chain_id
            .parse::<u64>()
            .with_context(|| format!("Chain id {} is not numeric", chain_id))?;

        Ok(Self {
            chain_id: chain_id.to_string(),
            numeric_chain_id,
            name: name.to_string(),
            rpc_url,
            contract_address,
            contract_abi: artifact.abi,
        })
    }
}

/// 链配置注册表
///
/// 每个链标识恰好对应一个配置；未知链标识返回 `None`，不做默认回退。
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    configs: HashMap<String, Arc<ChainConfig>>,
}

impl ChainRegistry {
    /// 创建预配置的注册表（Polygon Amoy + BNB 测试网）
    pub fn new(chains: &ChainsConfig) -> Result<Self> {
        let mut registry = Self {
            configs: HashMap::new(),
        };

        registry.register(ChainConfig::from_artifact(
            POLYGON_AMOY_CHAIN_ID,
            "Polygon Amoy",
            chains
                .polygon_amoy_rpc_url
                .clone()
                .unwrap_or_else(|| POLYGON_AMOY_RPC_URL.to_string()),
            POLYGON_AMOY_ARTIFACT,
            chains.polygon_amoy_contract.as_deref(),
        )?);

        registry.register(ChainConfig::from_artifact(
            BNB_TESTNET_CHAIN_ID,
            "BNB Smart Chain Testnet",
            chains
                .bnb_testnet_rpc_url
                .clone()
                .unwrap_or_else(|| BNB_TESTNET_RPC_URL.to_string()),
            BNB_TESTNET_ARTIFACT,
            chains.bnb_testnet_contract.as_deref(),
        )?);

        Ok(registry)
    }

    fn register(&mut self, config: ChainConfig) {
        tracing::debug!(
            chain_id = %config.chain_id,
            name = %config.name,
            contract = ?config.contract_address,
            "Registered HTLC chain"
        );
        self.configs
            .insert(config.chain_id.clone(), Arc::new(config));
    }

    /// 根据链标识获取配置
    pub fn get(&self, chain_id: &str) -> Option<Arc<ChainConfig>> {
        self.configs.get(chain_id.trim()).cloned()
    }

    /// 所有支持的链标识（排序后）
    pub fn supported_chain_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.configs.keys().cloned().collect();
        ids.sort();
        ids
    }
}
