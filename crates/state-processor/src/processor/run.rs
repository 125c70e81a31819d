use alloy_primitives::Log;

use crate::{
    AsyncReceiptBloomGenerator, Block, ExecutionAdapter, GasPool, Receipt, Signer,
};

/// The session of one block processing run.
///
/// Created by [`StateProcessor::prepare`](crate::StateProcessor::prepare), advanced one
/// transaction at a time by [`StateProcessor::process_tx`](crate::StateProcessor::process_tx)
/// and consumed by [`StateProcessor::commit`](crate::StateProcessor::commit). Receipts held by
/// the run are not final until it is committed: their bloom filters are still being computed.
#[derive(Debug)]
pub struct ExecutionRun<'a, T, V> {
    pub(crate) block: &'a Block<T>,
    pub(crate) gas_pool: GasPool,
    pub(crate) adapter: ExecutionAdapter<V>,
    pub(crate) signer: Signer,
    pub(crate) bloom: AsyncReceiptBloomGenerator,
    pub(crate) system_transactions: Vec<T>,
    pub(crate) transactions: Vec<T>,
    pub(crate) receipts: Vec<Receipt>,
    pub(crate) used_gas: u64,
    pub(crate) next_index: usize,
    pub(crate) aborted: bool,
}

impl<'a, T, V> ExecutionRun<'a, T, V> {
    /// The block being processed.
    pub const fn block(&self) -> &'a Block<T> {
        self.block
    }

    /// The gas left in the block.
    pub const fn gas_pool(&self) -> &GasPool {
        &self.gas_pool
    }

    /// The signer bound to the block's protocol version.
    pub const fn signer(&self) -> &Signer {
        &self.signer
    }

    /// The execution adapter. Callers may use it to inspect or re-point the VM between
    /// transactions.
    pub fn adapter_mut(&mut self) -> &mut ExecutionAdapter<V> {
        &mut self.adapter
    }

    /// The ordinary transactions applied so far.
    pub fn transactions(&self) -> &[T] {
        &self.transactions
    }

    /// The system transactions deferred to finalization so far.
    pub fn system_transactions(&self) -> &[T] {
        &self.system_transactions
    }

    /// The receipts produced so far. Their bloom filters are not final before commit.
    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Gas used by the ordinary transactions applied so far.
    pub const fn used_gas(&self) -> u64 {
        self.used_gas
    }

    /// Index of the next transaction to process.
    pub const fn next_index(&self) -> usize {
        self.next_index
    }

    /// Returns `true` once every transaction of the block has been processed.
    pub fn is_finished(&self) -> bool {
        self.next_index == self.block.transactions.len()
    }

    /// Returns `true` if the run was aborted by an error.
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Aborts the run, draining the bloom workers.
    pub(crate) fn abort(&mut self) {
        self.aborted = true;
        self.bloom.close();
    }
}

/// The outcome of one [`StateProcessor::process_tx`](crate::StateProcessor::process_tx) call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStep {
    /// The transaction is a system transaction and was deferred to finalization.
    System {
        /// Index of the transaction in the block.
        index: usize,
    },
    /// The transaction was applied.
    Ordinary {
        /// Index of the transaction in the block.
        index: usize,
        /// The receipt of the transaction. Its bloom is not computed yet.
        receipt: Receipt,
    },
}

impl TxStep {
    /// Index of the processed transaction.
    pub const fn index(&self) -> usize {
        match self {
            Self::System { index } | Self::Ordinary { index, .. } => *index,
        }
    }

    /// Index of the next transaction to process.
    pub const fn next_index(&self) -> usize {
        self.index() + 1
    }

    /// Returns `true` if the transaction was deferred as a system transaction.
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    /// The receipt of an ordinary transaction.
    pub const fn receipt(&self) -> Option<&Receipt> {
        match self {
            Self::System { .. } => None,
            Self::Ordinary { receipt, .. } => Some(receipt),
        }
    }

    /// The logs emitted by the transaction.
    pub fn logs(&self) -> &[Log] {
        self.receipt().map(|receipt| receipt.logs.as_slice()).unwrap_or_default()
    }

    /// Gas used by the transaction, zero for system transactions.
    pub fn gas_used(&self) -> u64 {
        self.receipt().map_or(0, |receipt| receipt.gas_used)
    }
}
