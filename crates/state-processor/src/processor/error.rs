use alloy_primitives::{Log, TxHash, B256};

use crate::{BoxError, InvalidTransactionError, TransactionError};

/// Error aborting the processing of a block.
///
/// Every variant except [`BlockExecutionError::EndOfBlock`] and
/// [`BlockExecutionError::UnexpectedTxIndex`] invalidates the block: no partial receipt set is
/// valid and the caller must discard every state mutation made during the run. Transaction
/// related variants carry the index and hash of the offending transaction.
#[derive(Debug, thiserror::Error)]
pub enum BlockExecutionError {
    /// The parent block is unknown, so fork-timing context cannot be determined.
    #[error("could not get parent block {parent_hash}")]
    MissingParent {
        /// Hash of the missing parent.
        parent_hash: B256,
    },
    /// The consensus engine failed to classify a transaction.
    #[error("could not classify tx {index} [{hash}]: {source}")]
    SystemTxClassification {
        /// Index of the transaction in the block.
        index: usize,
        /// Hash of the transaction.
        hash: TxHash,
        /// The engine error.
        #[source]
        source: BoxError,
    },
    /// A transaction could not be turned into a message.
    #[error("invalid tx {index} [{hash}]: {source}")]
    InvalidTransaction {
        /// Index of the transaction in the block.
        index: usize,
        /// Hash of the transaction.
        hash: TxHash,
        /// Why the transaction is invalid.
        #[source]
        source: InvalidTransactionError,
    },
    /// A transaction could not be applied.
    #[error("could not apply tx {index} [{hash}]: {source}")]
    ApplyTransaction {
        /// Index of the transaction in the block.
        index: usize,
        /// Hash of the transaction.
        hash: TxHash,
        /// Why the transaction could not be applied.
        #[source]
        source: TransactionError,
    },
    /// The block carries withdrawals before they are enabled.
    #[error("withdrawals before shanghai")]
    WithdrawalsBeforeShanghai,
    /// The consensus engine failed to finalize the block.
    ///
    /// `logs` holds the logs of the receipts as left by the engine. They are diagnostic output
    /// only and must not be treated as the block's logs.
    #[error("could not finalize block: {source}")]
    Finalize {
        /// The engine error.
        #[source]
        source: BoxError,
        /// Best-effort flattened logs at the time of failure.
        logs: Vec<Log>,
        /// Gas used at the time of failure.
        used_gas: u64,
    },
    /// Every transaction of the block has been processed.
    #[error("end of block: {tx_count} transactions processed")]
    EndOfBlock {
        /// Number of transactions in the block.
        tx_count: usize,
    },
    /// A transaction was requested out of order.
    #[error("unexpected tx index: expected={expected}, got={got}")]
    UnexpectedTxIndex {
        /// The next index of the run.
        expected: usize,
        /// The requested index.
        got: usize,
    },
    /// The run was aborted by an earlier error and cannot be used anymore.
    #[error("execution run aborted by an earlier error")]
    RunAborted,
}

impl BlockExecutionError {
    /// Returns `true` for the [`BlockExecutionError::EndOfBlock`] sentinel.
    pub const fn is_end_of_block(&self) -> bool {
        matches!(self, Self::EndOfBlock { .. })
    }

    /// Returns `true` if a transaction exceeded the gas left in the block.
    pub const fn is_gas_limit_exceeded(&self) -> bool {
        match self {
            Self::ApplyTransaction { source, .. } => source.is_gas_limit_exceeded(),
            _ => false,
        }
    }

    /// Index of the offending transaction, if the error is tied to one.
    pub const fn tx_index(&self) -> Option<usize> {
        match self {
            Self::SystemTxClassification { index, .. } |
            Self::InvalidTransaction { index, .. } |
            Self::ApplyTransaction { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Hash of the offending transaction, if the error is tied to one.
    pub const fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::SystemTxClassification { hash, .. } |
            Self::InvalidTransaction { hash, .. } |
            Self::ApplyTransaction { hash, .. } => Some(*hash),
            _ => None,
        }
    }
}
