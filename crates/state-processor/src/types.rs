use alloy_consensus::{Eip658Value, Header};
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{
    logs_bloom, Address, BlockHash, BlockNumber, Bloom, Log, Sealed, TxHash, B256,
};
use serde::{Deserialize, Serialize};

/// A type-erased error raised by an external collaborator (VM, consensus engine).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A block as received by the state processor.
///
/// The block is immutable for the whole processing run. Its header is sealed so the block hash
/// is computed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<T> {
    /// The sealed block header.
    pub header: Sealed<Header>,
    /// The ordered transactions of the block.
    pub transactions: Vec<T>,
    /// The uncle (ommer) headers referenced by the block.
    pub ommers: Vec<Header>,
    /// The withdrawals carried by the block, if the block has a withdrawals section.
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl<T> Block<T> {
    /// Creates a block, hashing the header.
    pub fn new(header: Header, transactions: Vec<T>) -> Self {
        let hash = header.hash_slow();
        Self::new_sealed(Sealed::new_unchecked(header, hash), transactions)
    }

    /// Creates a block from an already sealed header.
    pub const fn new_sealed(header: Sealed<Header>, transactions: Vec<T>) -> Self {
        Self { header, transactions, ommers: Vec::new(), withdrawals: None }
    }

    /// Sets the ommers of the block.
    pub fn with_ommers(mut self, ommers: Vec<Header>) -> Self {
        self.ommers = ommers;
        self
    }

    /// Sets the withdrawals of the block.
    pub fn with_withdrawals(mut self, withdrawals: Vec<Withdrawal>) -> Self {
        self.withdrawals = Some(withdrawals);
        self
    }

    /// The block hash.
    pub fn hash(&self) -> BlockHash {
        self.header.seal()
    }

    /// The block number.
    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    /// The block timestamp.
    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    /// The hash of the parent block.
    pub fn parent_hash(&self) -> B256 {
        self.header.parent_hash
    }

    /// The block gas limit.
    pub fn gas_limit(&self) -> u64 {
        self.header.gas_limit
    }

    /// The withdrawals of the block, empty if the block carries none.
    pub fn withdrawals(&self) -> &[Withdrawal] {
        self.withdrawals.as_deref().unwrap_or_default()
    }
}

/// Post-execution status of a transaction.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "camelCase")]
pub enum ReceiptStatus {
    /// The execution reverted or halted. The transaction is still valid and billable.
    #[default]
    #[display("failed")]
    Failed,
    /// The execution succeeded.
    #[display("successful")]
    Successful,
}

impl ReceiptStatus {
    /// Returns `true` for [`ReceiptStatus::Successful`].
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Successful)
    }
}

impl From<bool> for ReceiptStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Successful
        } else {
            Self::Failed
        }
    }
}

/// The verifiable record of one transaction's execution outcome.
///
/// Receipts are produced once per ordinary transaction in transaction order. The
/// `logs_bloom` field is filled asynchronously by the
/// [`AsyncReceiptBloomGenerator`](crate::AsyncReceiptBloomGenerator) and is only final once the
/// generator has been closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// EIP-2718 type of the transaction.
    #[serde(rename = "type")]
    pub tx_type: u8,
    /// Intermediate state root, only recorded before Byzantium.
    pub post_state: Option<B256>,
    /// Execution status.
    pub status: ReceiptStatus,
    /// Gas used by this and every preceding ordinary transaction of the block.
    pub cumulative_gas_used: u64,
    /// Gas used by this transaction.
    pub gas_used: u64,
    /// Logs emitted during execution, in emission order.
    pub logs: Vec<Log>,
    /// Bloom filter over `logs`.
    pub logs_bloom: Bloom,
    /// Hash of the transaction.
    pub tx_hash: TxHash,
    /// Address of the created contract, if the transaction was a contract creation.
    pub contract_address: Option<Address>,
    /// Hash of the block containing the transaction.
    pub block_hash: BlockHash,
    /// Number of the block containing the transaction.
    pub block_number: BlockNumber,
    /// Index of the transaction within the block, system transactions included.
    pub transaction_index: u64,
}

impl Receipt {
    /// Returns `true` if the transaction executed successfully.
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Computes the bloom filter over the receipt logs.
    pub fn compute_bloom(&self) -> Bloom {
        logs_bloom(&self.logs)
    }

    /// Computes and stores the bloom filter over the receipt logs.
    pub fn fill_bloom(&mut self) {
        self.logs_bloom = self.compute_bloom();
    }

    /// The consensus encoding of the receipt outcome: the intermediate state root for
    /// pre-Byzantium receipts, the EIP-658 status flag afterwards.
    pub fn status_or_post_state(&self) -> Eip658Value {
        match self.post_state {
            Some(root) => Eip658Value::PostState(root),
            None => Eip658Value::Eip658(self.is_success()),
        }
    }
}

/// Concatenates the logs of `receipts` in receipt order.
pub fn flatten_logs(receipts: &[Receipt]) -> Vec<Log> {
    receipts.iter().flat_map(|receipt| receipt.logs.iter().cloned()).collect()
}

/// The result of processing a whole block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockExecutionOutput {
    /// Receipts of the ordinary transactions, plus any appended by the consensus engine.
    pub receipts: Vec<Receipt>,
    /// Logs of all receipts, concatenated in receipt order.
    pub logs: Vec<Log>,
    /// Total gas used by the block.
    pub gas_used: u64,
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256, Bytes, LogData};

    use super::*;

    fn log(byte: u8) -> Log {
        Log {
            address: Address::repeat_byte(byte),
            data: LogData::new_unchecked(vec![B256::repeat_byte(byte)], Bytes::new()),
        }
    }

    #[test]
    fn test_bloom_covers_log_address_and_topics() {
        let mut receipt = Receipt { logs: vec![log(0x11)], ..Default::default() };
        assert_eq!(receipt.logs_bloom, Bloom::ZERO);
        receipt.fill_bloom();
        assert!(receipt.logs_bloom.contains_input(alloy_primitives::BloomInput::Raw(
            Address::repeat_byte(0x11).as_slice()
        )));
        assert!(receipt.logs_bloom.contains_input(alloy_primitives::BloomInput::Raw(
            B256::repeat_byte(0x11).as_slice()
        )));
    }

    #[test]
    fn test_status_or_post_state() {
        let root = b256!("0x00000000000000000000000000000000000000000000000000000000deadbeef");
        let legacy = Receipt { post_state: Some(root), ..Default::default() };
        assert_eq!(legacy.status_or_post_state(), Eip658Value::PostState(root));

        let modern = Receipt { status: ReceiptStatus::Successful, ..Default::default() };
        assert_eq!(modern.status_or_post_state(), Eip658Value::Eip658(true));
    }

    #[test]
    fn test_flatten_logs_preserves_order() {
        let receipts = vec![
            Receipt { logs: vec![log(1), log(2)], ..Default::default() },
            Receipt::default(),
            Receipt { logs: vec![log(3)], ..Default::default() },
        ];
        let logs = flatten_logs(&receipts);
        let addresses: Vec<_> = logs.iter().map(|log| log.address).collect();
        assert_eq!(
            addresses,
            vec![Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3)]
        );
    }

    #[test]
    fn test_receipt_json_shape() {
        let receipt = Receipt {
            tx_type: 2,
            status: ReceiptStatus::Successful,
            contract_address: Some(address!("0x1000000000000000000000000000000000000001")),
            ..Default::default()
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["type"], 2);
        assert_eq!(json["status"], "successful");
        assert!(json.get("cumulativeGasUsed").is_some());
        let back: Receipt = serde_json::from_value(json).unwrap();
        assert_eq!(back, receipt);
    }
}
