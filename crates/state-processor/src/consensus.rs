//! Collaborator contracts of the consensus engine and the chain.

use alloy_consensus::Header;
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{BlockHash, Sealed};
use auto_impl::auto_impl;

use crate::{BoxError, ChainConfig, Receipt};

/// Read access to the chain the processed block extends.
#[auto_impl(&, Box, Arc)]
pub trait ChainReader {
    /// The chain configuration.
    fn config(&self) -> &ChainConfig;

    /// Looks up a header by block hash.
    fn header_by_hash(&self, hash: BlockHash) -> Option<Header>;
}

/// Optional consensus capability: classifying transactions as system transactions.
///
/// Proof-of-staked-authority engines defer some transactions (validator set updates, system
/// rewards) to block finalization. Such transactions are not billed against the block gas pool
/// and receive no ordinary receipt.
pub trait SystemTxClassifier<T> {
    /// Returns `true` if `tx` is a system transaction of the block with `header`.
    fn is_system_transaction(&self, tx: &T, header: &Header) -> Result<bool, BoxError>;
}

/// Everything the consensus engine sees when finalizing a block.
///
/// The sequences are passed by mutable reference: the engine may execute the deferred system
/// transactions, append their receipts, and account their gas.
pub struct FinalizeContext<'a, T> {
    /// The chain the block extends.
    pub chain: &'a dyn ChainReader,
    /// The sealed header of the block.
    pub header: &'a Sealed<Header>,
    /// The ordinary transactions, in block order.
    pub transactions: &'a mut Vec<T>,
    /// The uncle headers of the block.
    pub ommers: &'a [Header],
    /// The block withdrawals, if any.
    pub withdrawals: Option<&'a [Withdrawal]>,
    /// The receipts of the ordinary transactions.
    pub receipts: &'a mut Vec<Receipt>,
    /// The system transactions, in block order.
    pub system_transactions: &'a mut Vec<T>,
    /// Gas used by the block so far.
    pub used_gas: &'a mut u64,
}

impl<T> core::fmt::Debug for FinalizeContext<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FinalizeContext")
            .field("header", &self.header.seal())
            .field("transactions", &self.transactions.len())
            .field("receipts", &self.receipts.len())
            .field("system_transactions", &self.system_transactions.len())
            .field("used_gas", &self.used_gas)
            .finish_non_exhaustive()
    }
}

/// The consensus engine the state processor hands blocks to once every ordinary transaction
/// has been applied.
pub trait ConsensusEngine<T, S: ?Sized> {
    /// The system-transaction capability, `None` if the engine has no notion of system
    /// transactions, in which case every transaction is ordinary.
    fn system_tx_classifier(&self) -> Option<&dyn SystemTxClassifier<T>> {
        None
    }

    /// Finalizes the block: block rewards, system-contract calls for deferred system
    /// transactions, and any other engine-specific state mutation.
    fn finalize(&self, ctx: FinalizeContext<'_, T>, state: &mut S) -> Result<(), BoxError>;
}
