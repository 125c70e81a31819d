//! Block-level orchestration.
//!
//! # Algorithm
//!
//! Processing a block runs strictly sequentially over its transactions:
//!
//! 1. **Setup** ([`StateProcessor::prepare`]): apply the DAO fork balance migration at its fork
//!    block, resolve the parent header, install built-in system-contract upgrades transitioning
//!    at this block, build the block execution context, the signer and the execution adapter,
//!    and start the bloom workers.
//! 2. **Per transaction** ([`StateProcessor::process_tx`]): defer system transactions to the
//!    consensus engine if it has that capability; otherwise decode the transaction into a
//!    [`Message`], scope the state store's log buffer to it, and apply it. Any failure aborts the
//!    whole block.
//! 3. **Close-out and finalize** ([`StateProcessor::commit`]): wait for the bloom workers,
//!    reject withdrawals before Shanghai, and let the consensus engine finalize the block.
//!
//! [`StateProcessor::process`] runs the three phases back to back. Driving the phases manually
//! yields the same receipts, logs and gas used, while letting the caller interleave other work
//! (tracing, speculative re-execution) between transactions.
//!
//! # Errors
//!
//! Every error returned here invalidates the block. Reverted transactions are not errors: they
//! are billed and receive a failed receipt. The processor never rolls back the state store; the
//! caller discards the mutations of an aborted run.

mod apply;
mod error;
mod run;

pub use error::*;
pub use run::*;

use alloy_consensus::Header;
use alloy_primitives::{Address, Sealed};
use tracing::{debug, trace, warn};

use crate::{
    apply_dao_hard_fork,
    constants::{LOG_TARGET, SYSTEM_TX_CAPACITY},
    flatten_logs, upgrade_system_contracts,
    AsyncReceiptBloomGenerator, Block, BlockContext, BlockExecutionOutput, ChainConfig,
    ChainReader, ConsensusEngine, ExecutionAdapter, FinalizeContext, GasPool, Message, Receipt,
    ReceiptProcessor, SignedTransaction, Signer, StateStore, VmFactory,
};

/// Applies blocks to a state store.
///
/// # Generic Parameters
///
/// - `C`: the chain the processed blocks extend, implementing [`ChainReader`]
/// - `E`: the consensus engine, implementing [`ConsensusEngine`]
/// - `F`: the VM factory, implementing [`VmFactory`]
#[derive(Debug, Clone)]
pub struct StateProcessor<C, E, F> {
    chain: C,
    engine: E,
    vm_factory: F,
}

impl<C, E, F> StateProcessor<C, E, F> {
    /// Creates a new state processor.
    pub const fn new(chain: C, engine: E, vm_factory: F) -> Self {
        Self { chain, engine, vm_factory }
    }

    /// The chain the processed blocks extend.
    pub const fn chain(&self) -> &C {
        &self.chain
    }

    /// The consensus engine.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// The VM factory.
    pub const fn vm_factory(&self) -> &F {
        &self.vm_factory
    }
}

impl<C: ChainReader, E, F> StateProcessor<C, E, F> {
    /// The chain configuration.
    pub fn config(&self) -> &ChainConfig {
        self.chain.config()
    }

    /// Processes a whole block: [`Self::prepare`], [`Self::process_tx`] for every transaction
    /// in order, then [`Self::commit`].
    ///
    /// Returns the receipts, the flattened logs and the gas used by the block.
    pub fn process<T, S>(
        &self,
        block: &Block<T>,
        state: &mut S,
        vm_config: F::Config,
    ) -> Result<BlockExecutionOutput, BlockExecutionError>
    where
        T: SignedTransaction + Clone,
        S: StateStore + ?Sized,
        E: ConsensusEngine<T, S>,
        F: VmFactory<S>,
    {
        let mut run = self.prepare(block, state, vm_config)?;
        for index in 0..block.transactions.len() {
            self.process_tx(&mut run, state, index)?;
        }
        self.commit(run, state)
    }

    /// Sets up the processing run of `block`.
    ///
    /// Fails with [`BlockExecutionError::MissingParent`] if the parent header is unknown. The
    /// DAO fork migration runs before the parent lookup, so the state may already be mutated in
    /// that case.
    pub fn prepare<'a, T, S>(
        &self,
        block: &'a Block<T>,
        state: &mut S,
        vm_config: F::Config,
    ) -> Result<ExecutionRun<'a, T, F::Vm>, BlockExecutionError>
    where
        S: StateStore + ?Sized,
        F: VmFactory<S>,
    {
        let config = self.chain.config();
        let number = block.number();
        let timestamp = block.timestamp();

        if config.is_dao_fork_block(number) {
            debug!(target: LOG_TARGET, number, "Applying DAO hard fork");
            apply_dao_hard_fork(state, &config.dao);
        }

        let parent_hash = block.parent_hash();
        let Some(parent) = self.chain.header_by_hash(parent_hash) else {
            warn!(target: LOG_TARGET, number, %parent_hash, "Parent block not found");
            return Err(BlockExecutionError::MissingParent { parent_hash });
        };
        upgrade_system_contracts(config, number, parent.timestamp, timestamp, state);

        let block_ctx = BlockContext::new(&block.header, config, None);
        let vm = self.vm_factory.create_vm(&block_ctx, vm_config);
        let tx_count = block.transactions.len();
        state.mark_full_processed();

        debug!(
            target: LOG_TARGET,
            number,
            hash = %block.hash(),
            tx_count,
            gas_limit = block.gas_limit(),
            "Processing block"
        );

        Ok(ExecutionRun {
            block,
            gas_pool: GasPool::new(block.gas_limit()),
            adapter: ExecutionAdapter::new(vm, block_ctx),
            signer: Signer::new(config, number, timestamp),
            bloom: AsyncReceiptBloomGenerator::new(tx_count),
            system_transactions: Vec::with_capacity(SYSTEM_TX_CAPACITY),
            transactions: Vec::with_capacity(tx_count),
            receipts: Vec::with_capacity(tx_count),
            used_gas: 0,
            next_index: 0,
            aborted: false,
        })
    }

    /// Processes the transaction at `index`, which must be the run's next index.
    ///
    /// Returns [`BlockExecutionError::EndOfBlock`] once `index` reaches the transaction count.
    /// Any other error aborts the run: the bloom workers are drained and every later call
    /// fails with [`BlockExecutionError::RunAborted`].
    pub fn process_tx<T, S>(
        &self,
        run: &mut ExecutionRun<'_, T, F::Vm>,
        state: &mut S,
        index: usize,
    ) -> Result<TxStep, BlockExecutionError>
    where
        T: SignedTransaction + Clone,
        S: StateStore + ?Sized,
        E: ConsensusEngine<T, S>,
        F: VmFactory<S>,
    {
        if run.aborted {
            return Err(BlockExecutionError::RunAborted);
        }
        let tx_count = run.block.transactions.len();
        if index == tx_count {
            return Err(BlockExecutionError::EndOfBlock { tx_count });
        }
        if index != run.next_index {
            return Err(BlockExecutionError::UnexpectedTxIndex {
                expected: run.next_index,
                got: index,
            });
        }

        match self.step(run, state, index) {
            Ok(step) => {
                run.next_index = step.next_index();
                Ok(step)
            }
            Err(err) => {
                warn!(target: LOG_TARGET, number = run.block.number(), %err, "Aborting block");
                run.abort();
                Err(err)
            }
        }
    }

    /// Closes the run: waits for the bloom workers, rejects withdrawals before Shanghai and
    /// finalizes the block with the consensus engine.
    ///
    /// On finalize failure, the error carries the logs of the receipts as left by the engine,
    /// for diagnostics only.
    ///
    /// The run is not required to be complete. Committing before [`Self::process_tx`] returned
    /// the end-of-block sentinel finalizes only the processed prefix, so the output then holds
    /// fewer receipts than the block has transactions. Callers wanting whole-block semantics
    /// must drive the run until [`BlockExecutionError::is_end_of_block`].
    pub fn commit<T, S>(
        &self,
        mut run: ExecutionRun<'_, T, F::Vm>,
        state: &mut S,
    ) -> Result<BlockExecutionOutput, BlockExecutionError>
    where
        S: StateStore + ?Sized,
        E: ConsensusEngine<T, S>,
        F: VmFactory<S>,
    {
        let blooms = run.bloom.close();
        if run.aborted {
            return Err(BlockExecutionError::RunAborted);
        }
        blooms.apply_to(&mut run.receipts);

        let ExecutionRun {
            block,
            mut transactions,
            mut receipts,
            mut system_transactions,
            mut used_gas,
            ..
        } = run;
        let number = block.number();

        if !block.withdrawals().is_empty() && !self.config().is_shanghai(number, block.timestamp())
        {
            warn!(target: LOG_TARGET, number, "Withdrawals before shanghai");
            return Err(BlockExecutionError::WithdrawalsBeforeShanghai);
        }

        let finalized = self.engine.finalize(
            FinalizeContext {
                chain: &self.chain,
                header: &block.header,
                transactions: &mut transactions,
                ommers: &block.ommers,
                withdrawals: block.withdrawals.as_deref(),
                receipts: &mut receipts,
                system_transactions: &mut system_transactions,
                used_gas: &mut used_gas,
            },
            state,
        );

        let logs = flatten_logs(&receipts);
        if let Err(source) = finalized {
            warn!(target: LOG_TARGET, number, %source, "Consensus engine failed to finalize block");
            return Err(BlockExecutionError::Finalize { source, logs, used_gas });
        }

        debug!(
            target: LOG_TARGET,
            number,
            receipts = receipts.len(),
            system_txs = system_transactions.len(),
            gas_used = used_gas,
            "Processed block"
        );
        Ok(BlockExecutionOutput { receipts, logs, gas_used: used_gas })
    }

    /// Applies a single transaction outside of block processing, as block builders do.
    ///
    /// `author` overrides the header beneficiary as fee recipient. The caller owns the gas pool
    /// and the running `used_gas` total and is expected to have scoped the state store to the
    /// transaction with [`StateStore::set_tx_context`]. The returned receipt has its bloom
    /// computed.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_transaction<T, S>(
        &self,
        header: &Sealed<Header>,
        author: Option<Address>,
        tx: &T,
        state: &mut S,
        gas_pool: &mut GasPool,
        used_gas: &mut u64,
        vm_config: F::Config,
    ) -> Result<Receipt, BlockExecutionError>
    where
        T: SignedTransaction,
        S: StateStore + ?Sized,
        F: VmFactory<S>,
    {
        let config = self.chain.config();
        let index = state.tx_index();
        let hash = tx.tx_hash();

        let signer = Signer::new(config, header.number, header.timestamp);
        let message = Message::from_transaction(tx, &signer, header.base_fee_per_gas)
            .map_err(|source| BlockExecutionError::InvalidTransaction { index, hash, source })?;

        let block_ctx = BlockContext::new(header, config, author);
        let mut adapter =
            ExecutionAdapter::new(self.vm_factory.create_vm(&block_ctx, vm_config), block_ctx);

        let mut receipt = apply::apply_transaction(
            &message,
            config,
            gas_pool,
            state,
            header.number,
            header.seal(),
            tx,
            used_gas,
            &mut adapter,
            &mut [],
        )
        .map_err(|source| BlockExecutionError::ApplyTransaction { index, hash, source })?;
        receipt.fill_bloom();
        Ok(receipt)
    }

    /// Runs one iteration of the transaction loop.
    fn step<T, S>(
        &self,
        run: &mut ExecutionRun<'_, T, F::Vm>,
        state: &mut S,
        index: usize,
    ) -> Result<TxStep, BlockExecutionError>
    where
        T: SignedTransaction + Clone,
        S: StateStore + ?Sized,
        E: ConsensusEngine<T, S>,
        F: VmFactory<S>,
    {
        let block = run.block;
        let tx = &block.transactions[index];
        let hash = tx.tx_hash();

        if let Some(classifier) = self.engine.system_tx_classifier() {
            let is_system = classifier.is_system_transaction(tx, &block.header).map_err(
                |source| BlockExecutionError::SystemTxClassification { index, hash, source },
            )?;
            if is_system {
                trace!(target: LOG_TARGET, index, %hash, "Deferring system transaction");
                run.system_transactions.push(tx.clone());
                return Ok(TxStep::System { index });
            }
        }

        let message = Message::from_transaction(tx, &run.signer, block.header.base_fee_per_gas)
            .map_err(|source| BlockExecutionError::InvalidTransaction { index, hash, source })?;
        state.set_tx_context(hash, index);

        let bloom: &mut dyn ReceiptProcessor = &mut run.bloom;
        let receipt = apply::apply_transaction(
            &message,
            self.chain.config(),
            &mut run.gas_pool,
            state,
            block.number(),
            block.hash(),
            tx,
            &mut run.used_gas,
            &mut run.adapter,
            &mut [bloom],
        )
        .map_err(|source| BlockExecutionError::ApplyTransaction { index, hash, source })?;

        trace!(
            target: LOG_TARGET,
            index,
            %hash,
            gas_used = receipt.gas_used,
            status = %receipt.status,
            "Applied transaction"
        );
        run.transactions.push(tx.clone());
        run.receipts.push(receipt.clone());
        Ok(TxStep::Ordinary { index, receipt })
    }
}
