use alloy_primitives::{
    keccak256, map::HashMap, Address, BlockHash, BlockNumber, Bytes, Log, TxHash, B256, U256,
};

use crate::StateStore;

/// An in-memory [`StateStore`] for testing purposes.
///
/// Accounts only carry a balance and code. The state root is a hash of every account, sorted by
/// address, so it is deterministic and changes with any account mutation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryState {
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    logs: HashMap<TxHash, Vec<Log>>,
    tx_hash: TxHash,
    tx_index: usize,
    finalise_calls: usize,
    root_calls: usize,
    full_processed: bool,
}

impl MemoryState {
    /// Sets the balance of an account.
    pub fn with_balance(mut self, address: Address, balance: U256) -> Self {
        self.set_balance(address, balance);
        self
    }

    /// Sets the code of an account.
    pub fn with_code(mut self, address: Address, code: Bytes) -> Self {
        self.set_code(address, code);
        self
    }

    /// The code of `address`, if any.
    pub fn code(&self, address: Address) -> Option<&Bytes> {
        self.code.get(&address)
    }

    /// Appends a log to the buffer of the current transaction.
    pub fn emit(&mut self, log: Log) {
        self.logs.entry(self.tx_hash).or_default().push(log);
    }

    /// Subtracts `amount` from the balance of `address`, saturating at zero.
    pub fn sub_balance(&mut self, address: Address, amount: U256) {
        let balance = self.balance(address).saturating_sub(amount);
        self.set_balance(address, balance);
    }

    /// The transaction hash set by the last [`StateStore::set_tx_context`] call.
    pub const fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    /// Number of [`StateStore::finalise`] calls.
    pub const fn finalise_calls(&self) -> usize {
        self.finalise_calls
    }

    /// Number of [`StateStore::intermediate_root`] calls.
    pub const fn root_calls(&self) -> usize {
        self.root_calls
    }

    /// Returns `true` once a processing run took ownership of the store.
    pub const fn is_full_processed(&self) -> bool {
        self.full_processed
    }

    /// The state root over every account.
    pub fn root(&self) -> B256 {
        let mut accounts: Vec<_> = self.balances.keys().chain(self.code.keys()).collect();
        accounts.sort_unstable();
        accounts.dedup();

        let mut buf = Vec::with_capacity(accounts.len() * 84);
        for address in accounts {
            buf.extend_from_slice(address.as_slice());
            buf.extend_from_slice(&self.balance(*address).to_be_bytes::<32>());
            let code = self.code(*address).map_or(&[][..], |code| code.as_ref());
            buf.extend_from_slice(keccak256(code).as_slice());
        }
        keccak256(buf)
    }
}

impl StateStore for MemoryState {
    fn set_tx_context(&mut self, tx_hash: TxHash, index: usize) {
        self.tx_hash = tx_hash;
        self.tx_index = index;
    }

    fn tx_index(&self) -> usize {
        self.tx_index
    }

    fn logs(
        &self,
        tx_hash: TxHash,
        _block_number: BlockNumber,
        _block_hash: BlockHash,
    ) -> Vec<Log> {
        self.logs.get(&tx_hash).cloned().unwrap_or_default()
    }

    fn finalise(&mut self, delete_empty_objects: bool) {
        self.finalise_calls += 1;
        if delete_empty_objects {
            self.balances.retain(|address, balance| {
                !balance.is_zero() || self.code.contains_key(address)
            });
        }
    }

    fn intermediate_root(&mut self, delete_empty_objects: bool) -> B256 {
        self.root_calls += 1;
        self.finalise(delete_empty_objects);
        self.root()
    }

    fn mark_full_processed(&mut self) {
        self.full_processed = true;
    }

    fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        let balance = self.balances.entry(address).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        self.balances.insert(address, balance);
    }

    fn set_code(&mut self, address: Address, code: Bytes) {
        self.code.insert(address, code);
    }
}
