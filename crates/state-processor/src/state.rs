use alloy_primitives::{Address, BlockHash, BlockNumber, Bytes, Log, TxHash, B256, U256};
use auto_impl::auto_impl;

/// The mutable account/state store a block is applied to.
///
/// The store is shared by the state processor, the VM and the consensus engine, and is only
/// ever accessed sequentially by one processing run. The processor never rolls it back: if a run
/// aborts, the caller discards every mutation through the store's own transactional semantics.
#[auto_impl(&mut, Box)]
pub trait StateStore {
    /// Scopes subsequent log emission to the transaction `tx_hash` at block position `index`.
    fn set_tx_context(&mut self, tx_hash: TxHash, index: usize);

    /// The block position set by the last [`StateStore::set_tx_context`] call.
    fn tx_index(&self) -> usize;

    /// Returns the logs emitted by `tx_hash` since its context was set.
    fn logs(&self, tx_hash: TxHash, block_number: BlockNumber, block_hash: BlockHash) -> Vec<Log>;

    /// Marks every pending mutation final without computing a state root.
    fn finalise(&mut self, delete_empty_objects: bool);

    /// Marks every pending mutation final and computes the resulting state root.
    fn intermediate_root(&mut self, delete_empty_objects: bool) -> B256;

    /// Signals that one processing run owns exclusive sequential access to the store for the
    /// rest of the block.
    fn mark_full_processed(&mut self);

    /// The balance of `address`.
    fn balance(&self, address: Address) -> U256;

    /// Adds `amount` to the balance of `address`, creating the account if needed.
    fn add_balance(&mut self, address: Address, amount: U256);

    /// Overwrites the balance of `address`.
    fn set_balance(&mut self, address: Address, balance: U256);

    /// Replaces the code of `address`.
    fn set_code(&mut self, address: Address, code: Bytes);
}
