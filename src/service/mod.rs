pub mod chain_client;
pub mod htlc;
pub mod network_registry;
pub mod submission_queue;
pub mod transaction_history;

pub use chain_client::{ChainClientAdapter, ChainContext, ChainRpc, HttpRpcConnector, RpcConnector};
pub use htlc::HtlcService;
pub use network_registry::NetworkRegistry;
pub use submission_queue::SubmissionQueue;
pub use transaction_history::TransactionHistory;
