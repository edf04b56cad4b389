//! HTLC 合约操作服务
//!
//! 创建锁、提取、退款三个写操作共用同一提交流程：
//! 解析链 → 计算派生值 → 读取 nonce / gas price → ABI 编码 → 构建交易 → 签名 → 提交并等待回执。
//! 回执原样返回，不根据回执字段推断成功与否。

use std::{str::FromStr, sync::Arc};

use ethers::{
    abi::{Event, RawLog, Token},
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, Filter, Log, TransactionReceipt,
        TransactionRequest, H256, U256,
    },
    utils::{keccak256, parse_ether},
};
use zeroize::Zeroizing;

use super::{
    chain_client::{ChainClientAdapter, ChainContext},
    submission_queue::SubmissionQueue,
};
use crate::{
    domain::{
        BlockRange, ChainConfig, EventLookup, HtlcError, LockEvent, LockRecord, LockRequest,
        RefundRequest, WithdrawRequest,
    },
    infrastructure::log_redact::redact_address,
};

/// newContract gas 上限
pub const CREATE_LOCK_GAS_LIMIT: u64 = 1_000_000;
/// withdraw gas 上限
pub const WITHDRAW_GAS_LIMIT: u64 = 150_000;
/// refund gas 上限
pub const REFUND_GAS_LIMIT: u64 = 1_000_000;
/// getContract 只读调用 gas 上限
pub const GET_LOCK_GAS_LIMIT: u64 = 1_000_000;

pub const LOCK_CREATED_EVENT: &str = "LogHTLCNew";

/// 待签名的合约调用
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub data: Bytes,
    pub gas_limit: u64,
    /// 仅 newContract 携带金额
    pub value: Option<U256>,
}

pub struct HtlcService {
    chains: Arc<ChainClientAdapter>,
    queue: Arc<SubmissionQueue>,
}

impl HtlcService {
    pub fn new(chains: Arc<ChainClientAdapter>, queue: Arc<SubmissionQueue>) -> Self {
        Self { chains, queue }
    }

    pub fn chains(&self) -> &ChainClientAdapter {
        &self.chains
    }

    /// 创建哈希时间锁
    pub async fn create_lock(&self, req: LockRequest) -> Result<TransactionReceipt, HtlcError> {
        let ctx = self.chains.resolve(&req.chain_id)?;
        let wallet = signing_wallet(&req.signing_key, &req.sender, &ctx.chain)?;

        let receiver = parse_address("to", &req.receiver)?;
        let hashlock = hash_passphrase(&req.passphrase)?;
        let value = parse_coin_amount(&req.amount)?;

        let data = ctx.contract.encode(
            "newContract",
            (receiver, hashlock, U256::from(req.timelock)),
        )?;

        tracing::info!(
            chain_id = %ctx.chain.chain_id,
            sender = %redact_address(&req.sender),
            receiver = %redact_address(&req.receiver),
            amount = %req.amount,
            timelock = req.timelock,
            "Creating HTLC lock"
        );

        self.submit(
            &ctx,
            &wallet,
            ContractCall {
                data,
                gas_limit: CREATE_LOCK_GAS_LIMIT,
                value: Some(value),
            },
        )
        .await
    }

    /// 揭示原像提取锁定资金
    pub async fn withdraw(&self, req: WithdrawRequest) -> Result<TransactionReceipt, HtlcError> {
        let ctx = self.chains.resolve(&req.chain_id)?;
        let wallet = signing_wallet(&req.signing_key, &req.sender, &ctx.chain)?;

        let contract_id = parse_bytes32("contractID", &req.contract_id)?;
        let preimage = parse_bytes32("secret", &req.secret)?;

        let data = ctx.contract.encode("withdraw", (contract_id, preimage))?;

        tracing::info!(
            chain_id = %ctx.chain.chain_id,
            contract_id = ?contract_id,
            sender = %redact_address(&req.sender),
            "Withdrawing HTLC lock"
        );

        self.submit(
            &ctx,
            &wallet,
            ContractCall {
                data,
                gas_limit: WITHDRAW_GAS_LIMIT,
                value: None,
            },
        )
        .await
    }

    /// 超时后退款
    pub async fn refund(&self, req: RefundRequest) -> Result<TransactionReceipt, HtlcError> {
        let ctx = self.chains.resolve(&req.chain_id)?;
        let wallet = signing_wallet(&req.signing_key, &req.sender, &ctx.chain)?;

        let contract_id = parse_bytes32("contractID", &req.contract_id)?;
        let data = ctx.contract.encode("refund", contract_id)?;

        tracing::info!(
            chain_id = %ctx.chain.chain_id,
            contract_id = ?contract_id,
            sender = %redact_address(&req.sender),
            "Refunding HTLC lock"
        );

        self.submit(
            &ctx,
            &wallet,
            ContractCall {
                data,
                gas_limit: REFUND_GAS_LIMIT,
                value: None,
            },
        )
        .await
    }

    /// 查询区间内最近一条 `LogHTLCNew` 事件
    ///
    /// 多条时按区块顺序取最后一条，不按 contractId 过滤。
    pub async fn query_lock_events(
        &self,
        chain_id: &str,
        range: BlockRange,
    ) -> Result<EventLookup, HtlcError> {
        let ctx = self.chains.resolve(chain_id)?;
        let event = ctx.contract.abi().event(LOCK_CREATED_EVENT)?.clone();

        let filter = Filter::new()
            .address(ctx.contract_address())
            .topic0(event.signature())
            .from_block(range.from)
            .to_block(range.to);

        let logs = ctx.rpc.logs(&filter).await?;

        tracing::debug!(
            chain_id = %ctx.chain.chain_id,
            matched = logs.len(),
            from = ?range.from,
            to = ?range.to,
            "Queried lock events"
        );

        latest_lock_event(&event, logs)
    }

    /// 读取链上锁记录（只读调用）
    pub async fn get_lock(
        &self,
        chain_id: &str,
        contract_id: &str,
        from: &str,
    ) -> Result<LockRecord, HtlcError> {
        let ctx = self.chains.resolve(chain_id)?;
        let contract_id = parse_bytes32("contract_address", contract_id)?;
        let from = parse_address("from", from)?;

        let data = ctx.contract.encode("getContract", contract_id)?;
        let tx: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(ctx.contract_address())
            .gas(GET_LOCK_GAS_LIMIT)
            .data(data)
            .into();

        let output = ctx.rpc.call(&tx).await?;

        let (sender, receiver, amount, hashlock, timelock, withdrawn, refunded, preimage): (
            Address,
            Address,
            U256,
            H256,
            U256,
            bool,
            bool,
            H256,
        ) = ctx.contract.decode_output("getContract", output)?;

        Ok(LockRecord {
            contract_id,
            sender,
            receiver,
            amount,
            hashlock,
            timelock,
            withdrawn,
            refunded,
            preimage,
        })
    }

    async fn submit(
        &self,
        ctx: &ChainContext,
        wallet: &LocalWallet,
        call: ContractCall,
    ) -> Result<TransactionReceipt, HtlcError> {
        let sender = wallet.address();
        let _slot = self.queue.acquire(&ctx.chain.chain_id, sender).await;

        let nonce = ctx.rpc.transaction_count(sender).await?;
        let gas_price = ctx.rpc.gas_price().await?;

        let tx = build_envelope(&ctx.chain, sender, &call, nonce, gas_price);
        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| HtlcError::generic(format!("Failed to sign transaction: {}", e)))?;
        let raw = tx.rlp_signed(&signature);

        tracing::debug!(
            chain_id = %ctx.chain.chain_id,
            nonce = %nonce,
            gas_price = %gas_price,
            gas_limit = call.gas_limit,
            "Submitting signed transaction"
        );

        let receipt = ctx.rpc.send_raw_transaction(raw).await?;

        tracing::info!(
            chain_id = %ctx.chain.chain_id,
            tx_hash = ?receipt.transaction_hash,
            block_number = ?receipt.block_number,
            "Transaction mined"
        );

        Ok(receipt)
    }
}

/// 构建 legacy 交易信封
pub fn build_envelope(
    chain: &ChainConfig,
    from: Address,
    call: &ContractCall,
    nonce: U256,
    gas_price: U256,
) -> TypedTransaction {
    let mut tx = TransactionRequest::new()
        .from(from)
        .to(chain.contract_address)
        .gas(call.gas_limit)
        .gas_price(gas_price)
        .data(call.data.clone())
        .nonce(nonce)
        .chain_id(chain.numeric_chain_id);

    if let Some(value) = call.value {
        tx = tx.value(value);
    }

    tx.into()
}

/// 口令的 keccak-256；`0x` 前缀的合法 hex 按原始字节计算
///
/// 空口令和裸 `0x` 没有可揭示的原像，直接拒绝。
pub fn hash_passphrase(passphrase: &str) -> Result<H256, HtlcError> {
    if passphrase.trim().is_empty() || passphrase == "0x" {
        return Err(HtlcError::invalid("pass must not be empty"));
    }

    let decoded = passphrase
        .strip_prefix("0x")
        .and_then(|h| hex::decode(h).ok())
        .map(Zeroizing::new);

    Ok(match decoded {
        Some(bytes) => H256::from(keccak256(bytes.as_slice())),
        None => H256::from(keccak256(passphrase.as_bytes())),
    })
}

/// 整币金额转最小单位（1 = 10^18）
pub fn parse_coin_amount(amount: &str) -> Result<U256, HtlcError> {
    let value = parse_ether(amount.trim())
        .map_err(|e| HtlcError::invalid(format!("invalid coin amount '{}': {}", amount, e)))?;
    if value.is_zero() {
        return Err(HtlcError::invalid("coin amount must be greater than zero"));
    }
    Ok(value)
}

fn parse_address(field: &str, value: &str) -> Result<Address, HtlcError> {
    Address::from_str(value.trim())
        .map_err(|_| HtlcError::invalid(format!("{} is not a valid address", field)))
}

fn parse_bytes32(field: &str, value: &str) -> Result<H256, HtlcError> {
    let hex_part = value.trim().trim_start_matches("0x");
    let bytes = hex::decode(hex_part)
        .map_err(|_| HtlcError::invalid(format!("{} must be 0x-prefixed bytes32 hex", field)))?;
    if bytes.len() != 32 {
        return Err(HtlcError::invalid(format!("{} must be 32 bytes", field)));
    }
    Ok(H256::from_slice(&bytes))
}

/// 解析签名私钥，并确认与声明的发送地址一致
fn signing_wallet(
    signing_key: &str,
    sender: &str,
    chain: &ChainConfig,
) -> Result<LocalWallet, HtlcError> {
    let key = signing_key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    let wallet = LocalWallet::from_str(key)
        .map_err(|_| HtlcError::invalid("private key is not a valid secp256k1 key"))?
        .with_chain_id(chain.numeric_chain_id);

    let sender = parse_address("from", sender)?;
    if wallet.address() != sender {
        return Err(HtlcError::invalid(
            "from address does not match the signing key",
        ));
    }
    Ok(wallet)
}

/// 取区块顺序上最后一条日志并解码
fn latest_lock_event(event: &Event, logs: Vec<Log>) -> Result<EventLookup, HtlcError> {
    let Some(log) = logs
        .into_iter()
        .max_by_key(|l| (l.block_number, l.log_index))
    else {
        return Ok(EventLookup::not_found());
    };

    Ok(EventLookup::Found(decode_lock_event(event, &log)?))
}

/// 解码 `LogHTLCNew`
pub fn decode_lock_event(event: &Event, log: &Log) -> Result<LockEvent, HtlcError> {
    let parsed = event.parse_log(RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    })?;

    let param = |name: &str| -> Result<Token, HtlcError> {
        parsed
            .params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.clone())
            .ok_or_else(|| HtlcError::generic(format!("{} missing field {}", LOCK_CREATED_EVENT, name)))
    };

    Ok(LockEvent {
        contract_id: token_to_h256(param("contractId")?)?,
        sender: token_to_address(param("sender")?)?,
        receiver: token_to_address(param("receiver")?)?,
        amount: token_to_uint(param("amount")?)?,
        hashlock: token_to_h256(param("hashlock")?)?,
        timelock: token_to_uint(param("timelock")?)?,
        block_number: log.block_number.map(|n| n.as_u64()),
        transaction_hash: log.transaction_hash,
        log_index: log.log_index.map(|i| i.as_u64()),
    })
}

fn token_to_h256(token: Token) -> Result<H256, HtlcError> {
    match token {
        Token::FixedBytes(bytes) if bytes.len() == 32 => Ok(H256::from_slice(&bytes)),
        other => Err(HtlcError::generic(format!("expected bytes32, got {:?}", other))),
    }
}

fn token_to_address(token: Token) -> Result<Address, HtlcError> {
    token
        .into_address()
        .ok_or_else(|| HtlcError::generic("expected address"))
}

fn token_to_uint(token: Token) -> Result<U256, HtlcError> {
    token
        .into_uint()
        .ok_or_else(|| HtlcError::generic("expected uint256"))
}
