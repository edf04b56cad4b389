// 链客户端适配器
// 按链标识解析出 RPC 客户端与 HashedTimelock 合约句柄，每次操作重新构建，不做连接复用

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::{
    contract::BaseContract,
    providers::{Http, Middleware, Provider, ProviderError, RpcError},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, Filter, Log,
        TransactionReceipt, U256, U64,
    },
};

use crate::{
    config::ChainsConfig,
    domain::{ChainConfig, ChainRegistry, HtlcError},
};

/// 链上 RPC 操作抽象
///
/// `send_raw_transaction` 提交后等待回执；已上链但 `status == 0` 的回执视为错误完成。
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn transaction_count(&self, address: Address) -> Result<U256, HtlcError>;

    async fn gas_price(&self) -> Result<U256, HtlcError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TransactionReceipt, HtlcError>;

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, HtlcError>;

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, HtlcError>;
}

/// RPC 客户端构造器
pub trait RpcConnector: Send + Sync {
    fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainRpc>, HtlcError>;
}

/// 单次操作的链上下文
///
/// 由 [`ChainClientAdapter::resolve`] 生成，显式传入每个 HTLC 操作。
pub struct ChainContext {
    pub chain: Arc<ChainConfig>,
    pub rpc: Arc<dyn ChainRpc>,
    pub contract: BaseContract,
}

impl ChainContext {
    pub fn contract_address(&self) -> Address {
        self.chain.contract_address
    }
}

/// 链客户端适配器
pub struct ChainClientAdapter {
    registry: Arc<ChainRegistry>,
    connector: Arc<dyn RpcConnector>,
}

impl ChainClientAdapter {
    pub fn new(registry: Arc<ChainRegistry>, connector: Arc<dyn RpcConnector>) -> Self {
        Self {
            registry,
            connector,
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// 解析链上下文；未知链标识在构建客户端之前失败
    pub fn resolve(&self, chain_id: &str) -> Result<ChainContext, HtlcError> {
        let chain = self
            .registry
            .get(chain_id)
            .ok_or_else(|| HtlcError::UnsupportedChain(chain_id.to_string()))?;

        let rpc = self.connector.connect(&chain)?;
        let contract = BaseContract::from(chain.contract_abi.clone());

        tracing::debug!(
            chain_id = %chain.chain_id,
            rpc_url = %chain.rpc_url,
            contract = ?chain.contract_address,
            "Resolved chain context"
        );

        Ok(ChainContext {
            chain,
            rpc,
            contract,
        })
    }
}

/// 基于 ethers `Provider<Http>` 的连接器
pub struct HttpRpcConnector {
    rpc_timeout: Duration,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl HttpRpcConnector {
    pub fn new(config: &ChainsConfig) -> Self {
        Self {
            rpc_timeout: Duration::from_secs(config.rpc_timeout_secs),
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms.max(100)),
        }
    }
}

impl RpcConnector for HttpRpcConnector {
    fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainRpc>, HtlcError> {
        let url = reqwest::Url::parse(&chain.rpc_url)
            .map_err(|e| HtlcError::generic(format!("Invalid RPC url for {}: {}", chain.name, e)))?;

        let client = reqwest::Client::builder()
            .timeout(self.rpc_timeout)
            .connect_timeout(Duration::from_secs(10).min(self.rpc_timeout))
            .build()
            .map_err(|e| HtlcError::RpcUnavailable(format!("Failed to build HTTP client: {}", e)))?;

        let provider = Provider::new(Http::new_with_client(url, client)).interval(self.poll_interval);

        Ok(Arc::new(ProviderRpc {
            provider,
            rpc_timeout: self.rpc_timeout,
            receipt_timeout: self.receipt_timeout,
        }))
    }
}

struct ProviderRpc {
    provider: Provider<Http>,
    rpc_timeout: Duration,
    receipt_timeout: Duration,
}

impl ProviderRpc {
    /// 为单次 RPC 调用加超时
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, HtlcError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.rpc_timeout, fut).await {
            Ok(result) => result.map_err(classify_provider_error),
            Err(_) => Err(HtlcError::RpcUnavailable(format!(
                "{} timed out after {:?}",
                op, self.rpc_timeout
            ))),
        }
    }
}

#[async_trait]
impl ChainRpc for ProviderRpc {
    async fn transaction_count(&self, address: Address) -> Result<U256, HtlcError> {
        self.bounded(
            "eth_getTransactionCount",
            self.provider
                .get_transaction_count(address, Some(BlockNumber::Pending.into())),
        )
        .await
    }

    async fn gas_price(&self) -> Result<U256, HtlcError> {
        self.bounded("eth_gasPrice", self.provider.get_gas_price())
            .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TransactionReceipt, HtlcError> {
        let pending = self
            .bounded(
                "eth_sendRawTransaction",
                self.provider.send_raw_transaction(raw),
            )
            .await?;
        let tx_hash = *pending;

        tracing::info!(tx_hash = ?tx_hash, "Transaction submitted, waiting for receipt");

        let receipt = match tokio::time::timeout(self.receipt_timeout, pending).await {
            Ok(result) => result.map_err(classify_provider_error)?,
            Err(_) => {
                return Err(HtlcError::RpcUnavailable(format!(
                    "receipt for {:?} not available after {:?}",
                    tx_hash, self.receipt_timeout
                )))
            }
        };

        let receipt = receipt.ok_or_else(|| {
            HtlcError::generic(format!("transaction {:?} dropped from mempool", tx_hash))
        })?;

        ensure_receipt_succeeded(receipt)
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, HtlcError> {
        self.bounded("eth_getLogs", self.provider.get_logs(filter))
            .await
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, HtlcError> {
        self.bounded("eth_call", self.provider.call(tx, None))
            .await
    }
}

/// 已上链但执行失败的回执转为回滚错误
pub fn ensure_receipt_succeeded(receipt: TransactionReceipt) -> Result<TransactionReceipt, HtlcError> {
    if receipt.status == Some(U64::zero()) {
        return Err(HtlcError::ChainRevert(format!(
            "transaction {:?} reverted in block {:?}",
            receipt.transaction_hash, receipt.block_number
        )));
    }
    Ok(receipt)
}

/// 按 ethers 的结构化错误分类
///
/// JSON-RPC 错误体优先使用 `is_revert()`；没有错误体时，传输层错误归为不可用，
/// 其余错误才退回到字符串匹配。
pub fn classify_provider_error(err: ProviderError) -> HtlcError {
    if let Some(resp) = err.as_error_response() {
        if resp.is_revert() {
            return HtlcError::ChainRevert(resp.message.clone());
        }
        return HtlcError::Generic(resp.to_string());
    }

    if err.as_serde_error().is_some() {
        return HtlcError::Generic(err.to_string());
    }

    match err {
        ProviderError::JsonRpcClientError(inner) => HtlcError::RpcUnavailable(inner.to_string()),
        ProviderError::HTTPError(e) => HtlcError::RpcUnavailable(e.to_string()),
        other => {
            let msg = other.to_string();
            if msg.to_lowercase().contains("revert") {
                HtlcError::ChainRevert(msg)
            } else {
                HtlcError::Generic(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::providers::{HttpClientError, JsonRpcError};

    use super::*;
    use crate::config::ChainsConfig;

    fn chains_config() -> ChainsConfig {
        ChainsConfig {
            rpc_timeout_secs: 5,
            receipt_timeout_secs: 30,
            receipt_poll_interval_ms: 100,
            polygon_amoy_rpc_url: None,
            bnb_testnet_rpc_url: None,
            polygon_amoy_contract: None,
            bnb_testnet_contract: None,
        }
    }

    fn rpc_error(code: i64, message: &str) -> ProviderError {
        ProviderError::JsonRpcClientError(Box::new(HttpClientError::JsonRpcError(JsonRpcError {
            code,
            message: message.to_string(),
            data: None,
        })))
    }

    #[test]
    fn test_structured_revert_is_classified() {
        let err = classify_provider_error(rpc_error(3, "execution reverted: FORBIDDEN"));
        assert!(err.is_revert());

        let err = classify_provider_error(rpc_error(-32000, "execution reverted"));
        assert!(err.is_revert());
    }

    #[test]
    fn test_non_revert_rpc_error_is_generic() {
        let err = classify_provider_error(rpc_error(-32000, "nonce too low"));
        assert!(matches!(err, HtlcError::Generic(_)));
    }

    #[test]
    fn test_unstructured_revert_falls_back_to_message() {
        let err = classify_provider_error(ProviderError::CustomError(
            "VM Exception while processing transaction: revert".into(),
        ));
        assert!(err.is_revert());

        let err = classify_provider_error(ProviderError::CustomError("boom".into()));
        assert!(matches!(err, HtlcError::Generic(_)));
    }

    #[test]
    fn test_failed_receipt_is_revert() {
        let receipt = TransactionReceipt {
            status: Some(U64::zero()),
            ..Default::default()
        };
        assert!(ensure_receipt_succeeded(receipt).unwrap_err().is_revert());

        let receipt = TransactionReceipt {
            status: Some(U64::one()),
            block_number: Some(U64::from(12)),
            ..Default::default()
        };
        assert_eq!(
            ensure_receipt_succeeded(receipt).unwrap().block_number,
            Some(U64::from(12))
        );
    }

    #[test]
    fn test_http_connector_builds_client_for_known_chain() {
        let registry = ChainRegistry::new(&chains_config()).unwrap();
        let adapter = ChainClientAdapter::new(
            Arc::new(registry),
            Arc::new(HttpRpcConnector::new(&chains_config())),
        );

        let ctx = adapter.resolve("80002").unwrap();
        assert_eq!(ctx.chain.rpc_url, "https://rpc-amoy.polygon.technology/");

        match adapter.resolve("1") {
            Err(HtlcError::UnsupportedChain(id)) => assert_eq!(id, "1"),
            _ => panic!("expected unsupported chain"),
        }
    }

    /// 指向本地端点的链配置
    fn local_chain(url: &str, rpc_timeout_secs: u64) -> (ChainConfig, HttpRpcConnector) {
        let config = ChainsConfig {
            rpc_timeout_secs,
            receipt_timeout_secs: 5,
            polygon_amoy_rpc_url: Some(url.to_string()),
            ..chains_config()
        };
        let registry = ChainRegistry::new(&config).unwrap();
        let chain = registry.get("80002").unwrap().as_ref().clone();
        (chain, HttpRpcConnector::new(&config))
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out_as_unavailable() {
        // 只监听不应答
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (chain, connector) = local_chain(&format!("http://{}", addr), 1);
        let rpc = connector.connect(&chain).unwrap();

        let started = std::time::Instant::now();
        let err = rpc.transaction_count(Address::zero()).await.unwrap_err();

        assert!(matches!(err, HtlcError::RpcUnavailable(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
        drop(listener);
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let (chain, connector) = local_chain("http://127.0.0.1:1", 2);
        let rpc = connector.connect(&chain).unwrap();

        let err = rpc.gas_price().await.unwrap_err();
        assert!(matches!(err, HtlcError::RpcUnavailable(_)), "got {err:?}");
    }

    /// 最小 JSON-RPC 节点：交易上链但回执 status = 0
    async fn reverting_node() -> std::net::SocketAddr {
        use axum::{routing::post, Json, Router};
        use serde_json::{json, Value};

        const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
        const BLOCK_HASH: &str =
            "0x2222222222222222222222222222222222222222222222222222222222222222";
        const FROM: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
        const TO: &str = "0x5c3d2e6a0a5b8e9b1f3f2d7c4e8a9b0c1d2e3f4a";

        async fn handle(Json(req): Json<Value>) -> Json<Value> {
            let result = match req["method"].as_str().unwrap_or_default() {
                "eth_sendRawTransaction" => json!(TX_HASH),
                "eth_getTransactionByHash" => json!({
                    "hash": TX_HASH,
                    "nonce": "0x0",
                    "blockHash": BLOCK_HASH,
                    "blockNumber": "0x7",
                    "transactionIndex": "0x0",
                    "from": FROM,
                    "to": TO,
                    "value": "0x0",
                    "gasPrice": "0x1",
                    "gas": "0x249f0",
                    "input": "0x",
                    "v": "0x1b",
                    "r": "0x1",
                    "s": "0x1"
                }),
                "eth_getTransactionReceipt" => json!({
                    "transactionHash": TX_HASH,
                    "transactionIndex": "0x0",
                    "blockHash": BLOCK_HASH,
                    "blockNumber": "0x7",
                    "from": FROM,
                    "to": TO,
                    "cumulativeGasUsed": "0x5208",
                    "gasUsed": "0x5208",
                    "contractAddress": null,
                    "logs": [],
                    "logsBloom": format!("0x{}", "0".repeat(512)),
                    "status": "0x0",
                    "type": "0x0",
                    "effectiveGasPrice": "0x1"
                }),
                "eth_blockNumber" => json!("0x7"),
                _ => Value::Null,
            };
            Json(json!({ "jsonrpc": "2.0", "id": req["id"].clone(), "result": result }))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = Router::new().route("/", post(handle));
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_mined_failed_receipt_is_revert() {
        let addr = reverting_node().await;
        let (chain, connector) = local_chain(&format!("http://{}", addr), 5);
        let rpc = connector.connect(&chain).unwrap();

        let err = rpc
            .send_raw_transaction(Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]))
            .await
            .unwrap_err();

        assert!(err.is_revert(), "got {err:?}");
    }
}
