use std::sync::Mutex;

use alloy_consensus::Header;
use alloy_primitives::{map::HashSet, Address, BlockHash, TxHash, U256};

use crate::{
    BoxError, ConsensusEngine, FinalizeContext, Receipt, ReceiptStatus, SignedTransaction,
    StateStore, SystemTxClassifier,
};

/// Error returned by a [`TestEngine`] configured to fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TestEngineError(pub String);

/// What a [`TestEngine`] observed when finalizing a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeRecord {
    /// Hash of the finalized block.
    pub block_hash: BlockHash,
    /// Hashes of the ordinary transactions handed to the engine.
    pub transactions: Vec<TxHash>,
    /// Hashes of the system transactions handed to the engine.
    pub system_transactions: Vec<TxHash>,
    /// Number of receipts handed to the engine.
    pub receipts: usize,
    /// Gas used handed to the engine.
    pub used_gas: u64,
    /// Number of ommers.
    pub ommers: usize,
    /// Number of withdrawals, `None` without a withdrawals section.
    pub withdrawals: Option<usize>,
}

/// A [`ConsensusEngine`] for testing purposes.
///
/// When system contracts are configured, transactions calling them are classified as system
/// transactions. Finalization executes them, appending a successful receipt using
/// `system_tx_gas` each, then credits the block reward to the beneficiary.
#[derive(Debug, Default)]
pub struct TestEngine {
    system_contracts: Option<HashSet<Address>>,
    system_tx_gas: u64,
    block_reward: U256,
    classify_error: Option<String>,
    finalize_error: Option<String>,
    finalized: Mutex<Vec<FinalizeRecord>>,
}

impl TestEngine {
    /// Classifies calls to `address` as system transactions.
    pub fn with_system_contract(mut self, address: Address) -> Self {
        self.system_contracts.get_or_insert_with(HashSet::default).insert(address);
        self
    }

    /// Gas accounted for every executed system transaction.
    pub const fn with_system_tx_gas(mut self, gas: u64) -> Self {
        self.system_tx_gas = gas;
        self
    }

    /// Credits `reward` to the block beneficiary on finalization.
    pub const fn with_block_reward(mut self, reward: U256) -> Self {
        self.block_reward = reward;
        self
    }

    /// Fails every classification with `reason`.
    pub fn with_classify_error(mut self, reason: impl Into<String>) -> Self {
        self.classify_error = Some(reason.into());
        self
    }

    /// Fails finalization with `reason`, after mutating the block.
    pub fn with_finalize_error(mut self, reason: impl Into<String>) -> Self {
        self.finalize_error = Some(reason.into());
        self
    }

    /// The blocks finalized so far.
    pub fn finalized(&self) -> Vec<FinalizeRecord> {
        self.finalized.lock().map(|records| records.clone()).unwrap_or_default()
    }
}

impl<T: SignedTransaction> SystemTxClassifier<T> for TestEngine {
    fn is_system_transaction(&self, tx: &T, _header: &Header) -> Result<bool, BoxError> {
        if let Some(reason) = &self.classify_error {
            return Err(TestEngineError(reason.clone()).into());
        }
        let contracts = self.system_contracts.as_ref();
        Ok(tx.to().is_some_and(|to| contracts.is_some_and(|contracts| contracts.contains(&to))))
    }
}

impl<T, S> ConsensusEngine<T, S> for TestEngine
where
    T: SignedTransaction,
    S: StateStore + ?Sized,
{
    fn system_tx_classifier(&self) -> Option<&dyn SystemTxClassifier<T>> {
        self.system_contracts.as_ref().map(|_| self as &dyn SystemTxClassifier<T>)
    }

    fn finalize(&self, ctx: FinalizeContext<'_, T>, state: &mut S) -> Result<(), BoxError> {
        if let Ok(mut records) = self.finalized.lock() {
            records.push(FinalizeRecord {
                block_hash: ctx.header.seal(),
                transactions: ctx.transactions.iter().map(T::tx_hash).collect(),
                system_transactions: ctx.system_transactions.iter().map(T::tx_hash).collect(),
                receipts: ctx.receipts.len(),
                used_gas: *ctx.used_gas,
                ommers: ctx.ommers.len(),
                withdrawals: ctx.withdrawals.map(<[_]>::len),
            });
        }

        for tx in core::mem::take(ctx.system_transactions) {
            *ctx.used_gas += self.system_tx_gas;
            ctx.receipts.push(Receipt {
                tx_type: tx.ty(),
                status: ReceiptStatus::Successful,
                cumulative_gas_used: *ctx.used_gas,
                gas_used: self.system_tx_gas,
                tx_hash: tx.tx_hash(),
                block_hash: ctx.header.seal(),
                block_number: ctx.header.number,
                transaction_index: ctx.transactions.len() as u64,
                ..Default::default()
            });
            ctx.transactions.push(tx);
        }
        state.add_balance(ctx.header.beneficiary, self.block_reward);

        match &self.finalize_error {
            Some(reason) => Err(TestEngineError(reason.clone()).into()),
            None => Ok(()),
        }
    }
}
