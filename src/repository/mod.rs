pub mod network;
pub mod transaction_record;

pub use network::{
    MemoryNetworkRepository, NameTaken, NetworkEntry, NetworkFilter, NetworkRepository,
    NewNetworkEntry, PgNetworkRepository,
};
pub use transaction_record::{
    MemoryTransactionRecordRepository, NewTransactionRecord, PgTransactionRecordRepository,
    TransactionRecord, TransactionRecordRepository,
};
