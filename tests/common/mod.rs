//! 测试辅助模块
//! 进程内模拟链 + 测试应用状态

#![allow(dead_code)]

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ethers::{
    abi::{self, Token},
    contract::BaseContract,
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, Filter,
        FilterBlockOption, Log, Transaction, TransactionReceipt, ValueOrArray, H256, U256, U64,
    },
    utils::{keccak256, rlp},
};
use htlc_bridge::{
    app_state::{AppState, Storage},
    config::{
        ChainsConfig, Config, EncryptionConfig, JwtConfig, LoggingConfig, ServerConfig,
        StorageBackend, StorageConfig,
    },
    domain::{ChainConfig, ChainRegistry, HtlcError},
    infrastructure::{encryption::encrypt_private_key, jwt::generate_token},
    service::{ChainClientAdapter, ChainRpc, HtlcService, RpcConnector, SubmissionQueue},
};

/// Hardhat 默认账户 #0
pub const ALICE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
/// Hardhat 默认账户 #1
pub const BOB_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-with-at-least-32-bytes!!";
pub const TEST_ENCRYPTION_KEY: &str =
    "1111111111111111111111111111111111111111111111111111111111111111";

pub const GAS_PRICE_WEI: u64 = 30_000_000_000;

pub fn address_of(key: &str) -> Address {
    LocalWallet::from_str(key).unwrap().address()
}

/// 0x 前缀的小写完整地址
pub fn addr_str(address: Address) -> String {
    format!("{:?}", address)
}

/// 一小时后的超时时间戳
pub fn future_timelock() -> u64 {
    chrono::Utc::now().timestamp() as u64 + 3600
}

/// 注入的失败类型
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Revert,
    Generic,
    Unavailable,
}

impl Failure {
    fn into_error(self) -> HtlcError {
        match self {
            Failure::Revert => HtlcError::ChainRevert("injected revert".into()),
            Failure::Generic => HtlcError::generic("injected failure"),
            Failure::Unavailable => HtlcError::RpcUnavailable("injected outage".into()),
        }
    }
}

#[derive(Debug, Clone)]
struct MockLock {
    sender: Address,
    receiver: Address,
    amount: U256,
    hashlock: H256,
    timelock: U256,
    withdrawn: bool,
    refunded: bool,
    preimage: H256,
}

#[derive(Default)]
struct ChainState {
    block: u64,
    nonces: HashMap<Address, U256>,
    logs: Vec<Log>,
    locks: HashMap<H256, MockLock>,
    sent: Vec<Transaction>,
    fail_next: Option<Failure>,
}

/// 模拟链
///
/// 每笔交易单独出一个块；按 HashedTimelock 语义执行 newContract/withdraw/refund，
/// 回滚的交易照样消耗 nonce。
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
    contract: BaseContract,
    connects: Arc<AtomicUsize>,
    now: Arc<AtomicU64>,
    send_delay: Duration,
}

impl MockChain {
    pub fn new() -> Self {
        let registry = ChainRegistry::new(&chains_config()).unwrap();
        let abi = registry.get("80002").unwrap().contract_abi.clone();

        Self {
            state: Arc::new(Mutex::new(ChainState::default())),
            contract: BaseContract::from(abi),
            connects: Arc::new(AtomicUsize::new(0)),
            now: Arc::new(AtomicU64::new(chrono::Utc::now().timestamp() as u64)),
            send_delay: Duration::ZERO,
        }
    }

    /// 广播到出块之间的延迟，用于放大并发窗口
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub fn fail_next(&self, failure: Failure) {
        self.state.lock().unwrap().fail_next = Some(failure);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// 已上链（含回滚）的交易
    pub fn sent(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().unwrap().block
    }

    pub fn advance_time(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    fn now(&self) -> U256 {
        U256::from(self.now.load(Ordering::SeqCst))
    }

    fn is_call(&self, name: &str, data: &[u8]) -> bool {
        data.len() >= 4
            && self
                .contract
                .abi()
                .function(name)
                .map(|f| f.short_signature()[..] == data[..4])
                .unwrap_or(false)
    }

    fn event_log(&self, name: &str, topics: Vec<H256>, data: Vec<u8>, tx: &Transaction, block: u64) -> Log {
        let signature = self.contract.abi().event(name).unwrap().signature();
        let mut all_topics = vec![signature];
        all_topics.extend(topics);

        Log {
            address: tx.to.unwrap_or_default(),
            topics: all_topics,
            data: data.into(),
            block_number: Some(U64::from(block)),
            transaction_hash: Some(tx.hash),
            log_index: Some(U256::zero()),
            ..Default::default()
        }
    }

    /// 执行合约调用，返回产生的日志或回滚原因
    fn execute(
        &self,
        st: &mut ChainState,
        from: Address,
        tx: &Transaction,
        block: u64,
    ) -> Result<Vec<Log>, String> {
        let data = tx.input.as_ref();

        if self.is_call("newContract", data) {
            let (receiver, hashlock, timelock): (Address, H256, U256) = self
                .contract
                .decode("newContract", data)
                .map_err(|e| e.to_string())?;

            if tx.value.is_zero() {
                return Err("msg.value must be > 0".into());
            }
            if timelock <= self.now() {
                return Err("timelock time must be in the future".into());
            }

            let contract_id = H256::from(keccak256(abi::encode(&[
                Token::Address(from),
                Token::Address(receiver),
                Token::Uint(tx.value),
                Token::FixedBytes(hashlock.as_bytes().to_vec()),
                Token::Uint(timelock),
            ])));
            if st.locks.contains_key(&contract_id) {
                return Err("Contract already exists".into());
            }

            st.locks.insert(
                contract_id,
                MockLock {
                    sender: from,
                    receiver,
                    amount: tx.value,
                    hashlock,
                    timelock,
                    withdrawn: false,
                    refunded: false,
                    preimage: H256::zero(),
                },
            );

            let payload = abi::encode(&[
                Token::Uint(tx.value),
                Token::FixedBytes(hashlock.as_bytes().to_vec()),
                Token::Uint(timelock),
            ]);
            return Ok(vec![self.event_log(
                "LogHTLCNew",
                vec![contract_id, H256::from(from), H256::from(receiver)],
                payload,
                tx,
                block,
            )]);
        }

        if self.is_call("withdraw", data) {
            let (contract_id, preimage): (H256, H256) = self
                .contract
                .decode("withdraw", data)
                .map_err(|e| e.to_string())?;
            let now = self.now();
            let lock = st
                .locks
                .get_mut(&contract_id)
                .ok_or_else(|| "contractId does not exist".to_string())?;

            if lock.receiver != from {
                return Err("withdrawable: not receiver".into());
            }
            if lock.withdrawn || lock.refunded {
                return Err("withdrawable: already settled".into());
            }
            if lock.timelock <= now {
                return Err("withdrawable: timelock time must be in the future".into());
            }
            if H256::from(keccak256(preimage.as_bytes())) != lock.hashlock {
                return Err("hashlock hash does not match".into());
            }

            lock.withdrawn = true;
            lock.preimage = preimage;
            return Ok(vec![self.event_log("LogHTLCWithdraw", vec![contract_id], Vec::new(), tx, block)]);
        }

        if self.is_call("refund", data) {
            let contract_id: H256 = self
                .contract
                .decode("refund", data)
                .map_err(|e| e.to_string())?;
            let now = self.now();
            let lock = st
                .locks
                .get_mut(&contract_id)
                .ok_or_else(|| "contractId does not exist".to_string())?;

            if lock.sender != from {
                return Err("refundable: not sender".into());
            }
            if lock.withdrawn || lock.refunded {
                return Err("refundable: already settled".into());
            }
            if lock.timelock > now {
                return Err("refundable: timelock not yet passed".into());
            }

            lock.refunded = true;
            return Ok(vec![self.event_log("LogHTLCRefund", vec![contract_id], Vec::new(), tx, block)]);
        }

        Err("unknown selector".into())
    }
}

fn topic0(filter: &Filter) -> Option<H256> {
    match &filter.topics[0] {
        Some(ValueOrArray::Value(Some(topic))) => Some(*topic),
        _ => None,
    }
}

fn resolve_block(block: Option<BlockNumber>, default: u64, latest: u64) -> u64 {
    match block {
        Some(BlockNumber::Number(n)) => n.as_u64(),
        Some(BlockNumber::Earliest) => 0,
        Some(_) => latest,
        None => default,
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn transaction_count(&self, address: Address) -> Result<U256, HtlcError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nonces
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<U256, HtlcError> {
        Ok(U256::from(GAS_PRICE_WEI))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TransactionReceipt, HtlcError> {
        let tx: Transaction =
            rlp::decode(raw.as_ref()).map_err(|e| HtlcError::generic(format!("bad rlp: {}", e)))?;
        let from = tx
            .recover_from()
            .map_err(|e| HtlcError::generic(format!("bad signature: {}", e)))?;

        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }

        let mut st = self.state.lock().unwrap();
        if let Some(failure) = st.fail_next.take() {
            return Err(failure.into_error());
        }

        let expected = st.nonces.get(&from).copied().unwrap_or_default();
        if tx.nonce != expected {
            return Err(HtlcError::generic(format!(
                "nonce too low: expected {}, got {}",
                expected, tx.nonce
            )));
        }
        st.nonces.insert(from, expected + 1);
        st.block += 1;
        let block = st.block;
        st.sent.push(tx.clone());

        match self.execute(&mut st, from, &tx, block) {
            Ok(logs) => {
                st.logs.extend(logs.iter().cloned());
                Ok(TransactionReceipt {
                    transaction_hash: tx.hash,
                    block_number: Some(U64::from(block)),
                    from,
                    to: tx.to,
                    status: Some(U64::one()),
                    gas_used: Some(U256::from(60_000u64)),
                    logs,
                    ..Default::default()
                })
            }
            Err(reason) => Err(HtlcError::ChainRevert(reason)),
        }
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, HtlcError> {
        let st = self.state.lock().unwrap();
        let latest = st.block;

        let (from, to) = match &filter.block_option {
            FilterBlockOption::Range {
                from_block,
                to_block,
            } => (
                resolve_block(*from_block, latest, latest),
                resolve_block(*to_block, latest, latest),
            ),
            FilterBlockOption::AtBlockHash(_) => return Ok(Vec::new()),
        };
        let address = match &filter.address {
            Some(ValueOrArray::Value(address)) => Some(*address),
            _ => None,
        };
        let topic = topic0(filter);

        Ok(st
            .logs
            .iter()
            .filter(|log| {
                let block = log.block_number.map(|b| b.as_u64()).unwrap_or_default();
                block >= from
                    && block <= to
                    && address.map_or(true, |a| log.address == a)
                    && topic.map_or(true, |t| log.topics.first() == Some(&t))
            })
            .cloned()
            .collect())
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, HtlcError> {
        let data = tx
            .data()
            .ok_or_else(|| HtlcError::generic("call without data"))?;
        let contract_id: H256 = self.contract.decode("getContract", data)?;

        let st = self.state.lock().unwrap();
        let tokens = match st.locks.get(&contract_id) {
            Some(lock) => vec![
                Token::Address(lock.sender),
                Token::Address(lock.receiver),
                Token::Uint(lock.amount),
                Token::FixedBytes(lock.hashlock.as_bytes().to_vec()),
                Token::Uint(lock.timelock),
                Token::Bool(lock.withdrawn),
                Token::Bool(lock.refunded),
                Token::FixedBytes(lock.preimage.as_bytes().to_vec()),
            ],
            None => vec![
                Token::Address(Address::zero()),
                Token::Address(Address::zero()),
                Token::Uint(U256::zero()),
                Token::FixedBytes(vec![0u8; 32]),
                Token::Uint(U256::zero()),
                Token::Bool(false),
                Token::Bool(false),
                Token::FixedBytes(vec![0u8; 32]),
            ],
        };

        Ok(abi::encode(&tokens).into())
    }
}

impl RpcConnector for MockChain {
    fn connect(&self, _chain: &ChainConfig) -> Result<Arc<dyn ChainRpc>, HtlcError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }
}

pub fn chains_config() -> ChainsConfig {
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

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".into(),
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            database_url: String::new(),
            max_connections: 1,
            acquire_timeout_secs: 1,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.into(),
            token_expiry_secs: 3600,
        },
        logging: LoggingConfig {
            level: "debug".into(),
            format: "text".into(),
        },
        encryption: EncryptionConfig {
            key: TEST_ENCRYPTION_KEY.into(),
        },
        chains: chains_config(),
    }
}

/// 直接装配 HTLC 服务
pub fn htlc_service(chain: &MockChain) -> HtlcService {
    let registry = Arc::new(ChainRegistry::new(&chains_config()).unwrap());
    let adapter = Arc::new(ChainClientAdapter::new(registry, Arc::new(chain.clone())));
    HtlcService::new(adapter, Arc::new(SubmissionQueue::new()))
}

/// 创建测试应用状态（内存存储 + 模拟链）
pub fn create_test_app_state(chain: &MockChain) -> Arc<AppState> {
    Arc::new(
        AppState::new(
            Arc::new(test_config()),
            Arc::new(chain.clone()),
            Storage::memory(),
        )
        .unwrap(),
    )
}

/// 用应用密钥加密私钥，得到请求体中的 `pk`
pub fn encrypted_pk(state: &AppState, key: &str) -> String {
    encrypt_private_key(key, &state.encryption_key).unwrap()
}

pub fn bearer_token(email: &str) -> String {
    format!(
        "Bearer {}",
        generate_token(email, TEST_JWT_SECRET, 3600).unwrap()
    )
}
